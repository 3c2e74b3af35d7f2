//! Mock page fetcher for testing.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use crate::artwork::{FetchError, PageFetcher};

#[derive(Debug, Clone)]
enum Response {
    Page(String),
    Status(u16),
}

#[derive(Debug, Default)]
struct Inner {
    responses: HashMap<String, Response>,
    fetched: Vec<String>,
    delay: Option<Duration>,
}

/// Mock implementation of the PageFetcher trait.
///
/// Serves configured pages, simulates HTTP failures and delays, and records
/// every requested URL. Unknown URLs answer 404.
///
/// # Example
///
/// ```rust,ignore
/// use posterboard_core::testing::{fixtures, MockFetcher};
///
/// let fetcher = MockFetcher::new();
/// fetcher.add_page("https://www.linkomanija.net/details.php?id=1", &fixtures::detail_page("/p/1.jpg"));
/// fetcher.add_failure("https://www.linkomanija.net/details.php?id=2", 503);
///
/// // ... run a resolution ...
///
/// assert_eq!(fetcher.fetch_count(), 1);
/// ```
#[derive(Debug, Clone, Default)]
pub struct MockFetcher {
    inner: Arc<Mutex<Inner>>,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    fn inner(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Serve `html` for `url`.
    pub fn add_page(&self, url: &str, html: &str) {
        self.inner()
            .responses
            .insert(url.to_string(), Response::Page(html.to_string()));
    }

    /// Answer `url` with a non-success status.
    pub fn add_failure(&self, url: &str, status: u16) {
        self.inner()
            .responses
            .insert(url.to_string(), Response::Status(status));
    }

    /// Delay every response. Combine with a paused tokio clock.
    pub fn set_delay(&self, delay: Duration) {
        self.inner().delay = Some(delay);
    }

    /// Number of fetches performed.
    pub fn fetch_count(&self) -> usize {
        self.inner().fetched.len()
    }

    /// URLs fetched, in request order.
    pub fn fetched_urls(&self) -> Vec<String> {
        self.inner().fetched.clone()
    }
}

#[async_trait]
impl PageFetcher for MockFetcher {
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        let (response, delay) = {
            let mut inner = self.inner();
            inner.fetched.push(url.to_string());
            (inner.responses.get(url).cloned(), inner.delay)
        };

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        match response {
            Some(Response::Page(html)) => Ok(html),
            Some(Response::Status(status)) => Err(FetchError::Status {
                url: url.to_string(),
                status,
            }),
            None => Err(FetchError::Status {
                url: url.to_string(),
                status: 404,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_fetcher_serves_and_records() {
        let fetcher = MockFetcher::new();
        fetcher.add_page("http://x/1", "<p>one</p>");
        fetcher.add_failure("http://x/2", 500);

        assert_eq!(fetcher.fetch("http://x/1").await.unwrap(), "<p>one</p>");
        assert!(matches!(
            fetcher.fetch("http://x/2").await,
            Err(FetchError::Status { status: 500, .. })
        ));
        assert!(matches!(
            fetcher.fetch("http://x/3").await,
            Err(FetchError::Status { status: 404, .. })
        ));
        assert_eq!(
            fetcher.fetched_urls(),
            vec!["http://x/1", "http://x/2", "http://x/3"]
        );
    }
}
