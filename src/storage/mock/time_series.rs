//! Mock TimeSeriesStore implementation for testing.

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::storage::{QueryPage, QueryRequest, Result, Row, StoreError, TimeSeriesStore};

const TOKEN_PREFIX: &str = "page-";

/// When the mock should fail instead of answering.
#[derive(Clone)]
enum Failure {
    Always(StoreError),
    OnCall(usize, StoreError),
}

/// Mock analytics store that replays scripted pages.
///
/// Pages are scripted per route: the first route whose needle occurs in the
/// query string answers it. Page `n` is reached with the token `page-n`,
/// which the mock hands out on page `n - 1`.
#[derive(Default)]
pub struct MockTimeSeriesStore {
    routes: RwLock<Vec<(String, Vec<Vec<Row>>)>>,
    requests: RwLock<Vec<QueryRequest>>,
    failure: RwLock<Option<Failure>>,
}

impl MockTimeSeriesStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer every query with `pages`.
    pub fn with_pages(pages: Vec<Vec<Row>>) -> Self {
        Self::new().with_route("", pages)
    }

    /// Answer queries containing `needle` with `pages`.
    pub fn with_route(mut self, needle: &str, pages: Vec<Vec<Row>>) -> Self {
        self.routes.get_mut().push((needle.to_string(), pages));
        self
    }

    /// Fail every call with `error`.
    pub async fn fail_with(&self, error: StoreError) {
        *self.failure.write().await = Some(Failure::Always(error));
    }

    /// Fail only the `call`-th request (zero based) with `error`.
    pub async fn fail_on_call(&self, call: usize, error: StoreError) {
        *self.failure.write().await = Some(Failure::OnCall(call, error));
    }

    /// Every request received so far, in order.
    pub async fn requests(&self) -> Vec<QueryRequest> {
        self.requests.read().await.clone()
    }
}

fn page_index(token: Option<&str>) -> Result<usize> {
    match token {
        None => Ok(0),
        Some(token) => token
            .strip_prefix(TOKEN_PREFIX)
            .and_then(|n| n.parse().ok())
            .ok_or_else(|| StoreError::InvalidQuery(format!("unknown next token: {token}"))),
    }
}

#[async_trait]
impl TimeSeriesStore for MockTimeSeriesStore {
    async fn query(&self, request: &QueryRequest) -> Result<QueryPage> {
        let call = {
            let mut requests = self.requests.write().await;
            requests.push(request.clone());
            requests.len() - 1
        };

        match self.failure.read().await.clone() {
            Some(Failure::Always(error)) => return Err(error),
            Some(Failure::OnCall(n, error)) if n == call => return Err(error),
            _ => {}
        }

        let routes = self.routes.read().await;
        let pages = routes
            .iter()
            .find(|(needle, _)| request.query_string.contains(needle.as_str()))
            .map(|(_, pages)| pages.as_slice())
            .unwrap_or_default();

        let index = page_index(request.next_token.as_deref())?;
        if pages.is_empty() && index == 0 {
            return Ok(QueryPage::default());
        }
        let rows = pages
            .get(index)
            .cloned()
            .ok_or_else(|| StoreError::InvalidQuery(format!("expired next token: page {index}")))?;

        let next_token = (index + 1 < pages.len()).then(|| format!("{TOKEN_PREFIX}{}", index + 1));

        Ok(QueryPage { rows, next_token })
    }
}
