//! Container listing (`GET /api/v2/containers`), cursor paginated

use ddexport_core::{Cursor, Page, PageSource, TransportError};
use serde::Deserialize;
use serde_json::Value;

use crate::client::DatadogClient;

pub const CONTAINERS_PATH: &str = "/api/v2/containers";
pub const DEFAULT_PAGE_SIZE: u32 = 1000;
/// Largest page the endpoint accepts
pub const MAX_PAGE_SIZE: u32 = 10_000;
pub const DEFAULT_GROUPING_KEY: &str = "image_name";

/// Whether the remote groups containers by a tag before listing them
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Grouping {
    Ungrouped,
    Grouped { key: String },
}

impl Grouping {
    fn group_by(&self) -> Option<&str> {
        match self {
            Self::Ungrouped => None,
            Self::Grouped { key } => Some(key),
        }
    }
}

pub struct ContainerSource {
    client: DatadogClient,
    page_size: u32,
    grouping: Grouping,
}

impl ContainerSource {
    pub fn new(client: DatadogClient, page_size: u32, grouping: Grouping) -> Self {
        Self {
            client,
            page_size: page_size.clamp(1, MAX_PAGE_SIZE),
            grouping,
        }
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    fn query(&self, cursor: Option<&Cursor>) -> Vec<(&'static str, String)> {
        let mut query = vec![("page[size]", self.page_size.to_string())];
        if let Some(cursor) = cursor {
            query.push(("page[cursor]", cursor.to_string()));
        }
        if let Some(key) = self.grouping.group_by() {
            query.push(("group_by", key.to_string()));
        }
        query
    }
}

impl PageSource for ContainerSource {
    fn name(&self) -> &str {
        "containers"
    }

    async fn list_page(&self, cursor: Option<&Cursor>) -> Page {
        let result = self
            .client
            .get(CONTAINERS_PATH, &self.query(cursor))
            .await
            .and_then(|body| parse_containers_page(&body));

        match result {
            Ok(mut page) => {
                // a short page is the last one even if a cursor came back
                if page.records.len() < self.page_size as usize {
                    page.next_cursor = None;
                }
                page
            }
            // without a response there is no cursor to continue from
            Err(e) => Page::failed(e, None),
        }
    }
}

#[derive(Deserialize)]
struct ContainersResponse {
    #[serde(default)]
    data: Vec<Value>,
    meta: Option<ResponseMeta>,
}

#[derive(Deserialize)]
struct ResponseMeta {
    pagination: Option<Pagination>,
}

#[derive(Deserialize)]
struct Pagination {
    next_cursor: Option<String>,
}

/// Decode one containers response into records and the next cursor.
pub fn parse_containers_page(body: &str) -> Result<Page, TransportError> {
    let resp: ContainersResponse = serde_json::from_str(body)?;
    let next = resp
        .meta
        .and_then(|m| m.pagination)
        .and_then(|p| p.next_cursor)
        .filter(|c| !c.is_empty())
        .map(Cursor::new);
    Ok(Page::ok(resp.data, next))
}
