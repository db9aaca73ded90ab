//! Cursor-driven pagination over a remote listing endpoint

use std::fmt;
use std::future::Future;

use serde_json::Value;

use crate::error::TransportError;

/// One exported entity, exactly as the remote API returned it.
pub type Record = Value;

/// Opaque continuation token for the next page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cursor(String);

impl Cursor {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Result of one remote listing call.
///
/// A failed call is still a page: `error` is set, `records` is usually
/// empty, and `next_cursor` is set when the source knows where the
/// following page begins regardless.
#[derive(Debug, Default)]
pub struct Page {
    pub records: Vec<Record>,
    pub next_cursor: Option<Cursor>,
    pub error: Option<TransportError>,
}

impl Page {
    pub fn ok(records: Vec<Record>, next_cursor: Option<Cursor>) -> Self {
        Self {
            records,
            next_cursor,
            error: None,
        }
    }

    pub fn failed(error: TransportError, next_cursor: Option<Cursor>) -> Self {
        Self {
            records: Vec::new(),
            next_cursor,
            error: Some(error),
        }
    }
}

/// A remote listing operation: `list_page(cursor) -> (records, next, error)`.
///
/// The source owns its query (page size, filters). `None` asks for the
/// first page.
pub trait PageSource {
    /// Short name used in log lines
    fn name(&self) -> &str;

    fn list_page(&self, cursor: Option<&Cursor>) -> impl Future<Output = Page> + Send;
}

#[derive(Debug)]
enum State {
    Start,
    Next(Cursor),
    Done,
}

/// Walks a [`PageSource`] from the first page until it reports no next cursor.
///
/// Once `next_page` returns `None` the paginator stays exhausted; it cannot
/// be rewound. Dropping an in-flight `next_page` future (cancellation) also
/// exhausts it.
pub struct Paginator<S> {
    source: S,
    state: State,
    pages: u64,
    failed_pages: u64,
}

impl<S: PageSource> Paginator<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            state: State::Start,
            pages: 0,
            failed_pages: 0,
        }
    }

    /// Fetch the next page, or `None` once the remote is exhausted.
    pub async fn next_page(&mut self) -> Option<Page> {
        let cursor = match std::mem::replace(&mut self.state, State::Done) {
            State::Done => return None,
            State::Start => None,
            State::Next(cursor) => Some(cursor),
        };

        let page = self.source.list_page(cursor.as_ref()).await;
        self.pages += 1;
        if page.error.is_some() {
            self.failed_pages += 1;
        }

        self.state = match &page.next_cursor {
            None => State::Done,
            Some(next) if cursor.as_ref() == Some(next) => {
                log::warn!(
                    "{}: remote returned cursor {next} again, stopping pagination",
                    self.source.name()
                );
                State::Done
            }
            Some(next) => State::Next(next.clone()),
        };
        Some(page)
    }

    pub fn is_done(&self) -> bool {
        matches!(self.state, State::Done)
    }

    /// Pages fetched so far, failed ones included
    pub fn pages(&self) -> u64 {
        self.pages
    }

    pub fn failed_pages(&self) -> u64 {
        self.failed_pages
    }

    pub fn source(&self) -> &S {
        &self.source
    }
}
