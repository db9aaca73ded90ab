//! Host listing (`GET /api/v1/hosts`), offset paginated
//!
//! The cursor is the decimal `start` offset of the next window.

use std::sync::atomic::{AtomicU64, Ordering};

use ddexport_core::{Cursor, Page, PageSource, TransportError};
use serde::Deserialize;
use serde_json::Value;

use crate::client::DatadogClient;

pub const HOSTS_PATH: &str = "/api/v1/hosts";
/// Largest `count` the endpoint accepts
pub const MAX_HOSTS_PER_PAGE: u32 = 1000;

pub struct HostSource {
    client: DatadogClient,
    count: u32,
    filter: Option<String>,
    /// `total_matching` from the last good response, 0 while unknown
    known_total: AtomicU64,
}

impl HostSource {
    pub fn new(client: DatadogClient, count: u32, filter: Option<String>) -> Self {
        Self {
            client,
            count: count.clamp(1, MAX_HOSTS_PER_PAGE),
            filter: filter.filter(|f| !f.is_empty()),
            known_total: AtomicU64::new(0),
        }
    }

    pub fn count(&self) -> u32 {
        self.count
    }
}

impl PageSource for HostSource {
    fn name(&self) -> &str {
        "hosts"
    }

    async fn list_page(&self, cursor: Option<&Cursor>) -> Page {
        let start = match cursor.map(|c| c.as_str().parse::<u64>()) {
            None => 0,
            Some(Ok(start)) => start,
            Some(Err(_)) => {
                return Page::failed(
                    TransportError::Decode(format!("invalid host offset {cursor:?}")),
                    None,
                );
            }
        };

        let mut query = vec![
            ("count", self.count.to_string()),
            ("start", start.to_string()),
        ];
        if let Some(filter) = &self.filter {
            query.push(("filter", filter.clone()));
        }

        let result = self
            .client
            .get(HOSTS_PATH, &query)
            .await
            .and_then(|body| parse_hosts_page(&body, start, self.count));

        match result {
            Ok((page, total)) => {
                if let Some(total) = total {
                    self.known_total.store(total, Ordering::Relaxed);
                }
                page
            }
            Err(e) => {
                let known_total = self.known_total.load(Ordering::Relaxed);
                Page::failed(e, skip_failed_window(start, self.count, known_total))
            }
        }
    }
}

/// Where to resume after the window at `start` failed: past it, as long as
/// an earlier response showed more hosts beyond it.
fn skip_failed_window(start: u64, count: u32, known_total: u64) -> Option<Cursor> {
    let next = start + u64::from(count);
    (next < known_total).then(|| Cursor::new(next.to_string()))
}

#[derive(Deserialize)]
struct HostListResponse {
    #[serde(default)]
    host_list: Vec<Value>,
    total_returned: Option<u64>,
    total_matching: Option<u64>,
}

/// Decode one hosts response for the window at `start`.
///
/// Returns the page and the reported `total_matching`. There is a next
/// window only when this one came back full and the total extends past it.
pub fn parse_hosts_page(
    body: &str,
    start: u64,
    count: u32,
) -> Result<(Page, Option<u64>), TransportError> {
    let resp: HostListResponse = serde_json::from_str(body)?;
    let returned = resp
        .total_returned
        .unwrap_or(resp.host_list.len() as u64);
    let next_start = start + returned;
    let more = returned > 0
        && returned >= u64::from(count)
        && resp.total_matching.map_or(true, |total| next_start < total);
    let next = more.then(|| Cursor::new(next_start.to_string()));
    Ok((Page::ok(resp.host_list, next), resp.total_matching))
}
