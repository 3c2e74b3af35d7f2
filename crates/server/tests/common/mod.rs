//! Common test utilities for E2E testing with mocks.
//!
//! This module provides a test fixture that creates an in-process server
//! with a mock page fetcher and a SQLite store in a temporary directory,
//! enabling E2E testing without network access.

#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{HeaderMap, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use posterboard_core::{
    testing::MockFetcher, AugmentConfig, Config, DatabaseConfig, DisplayMode, FeatureState,
    KvStore, PageFetcher, SiteId, SqliteKvStore,
};

/// Re-export fixtures for test convenience
pub use posterboard_core::testing::fixtures;

/// Knobs for [`TestFixture::with_config`].
#[derive(Debug, Clone)]
pub struct TestConfig {
    pub display: DisplayMode,
    /// Sites whose flag is stored as disabled before the server starts.
    pub disabled_sites: Vec<SiteId>,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            display: DisplayMode::Annotate,
            disabled_sites: Vec::new(),
        }
    }
}

/// Test fixture for E2E testing with mock dependencies.
///
/// # Example
///
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_view() {
///     let fixture = TestFixture::new().await;
///     fixture.fetcher.add_page(fixtures::LINKOMANIJA_BROWSE_URL, &listing);
///
///     let response = fixture.get("/api/v1/view?url=...").await;
///     assert_eq!(response.status, 200);
/// }
/// ```
pub struct TestFixture {
    /// The Axum router for testing
    pub router: Router,
    /// Mock fetcher - serves listing and detail pages
    pub fetcher: MockFetcher,
    /// The store behind the server
    pub store: Arc<SqliteKvStore>,
    /// Feature flags as seen by the server
    pub features: Arc<FeatureState>,
    /// Temporary directory for the test database
    pub temp_dir: TempDir,
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    /// Parsed JSON body, `Value::Null` when the body is not JSON
    pub body: Value,
    /// Raw body text
    pub text: String,
}

impl TestFixture {
    /// Create a new test fixture with default mocks.
    pub async fn new() -> Self {
        Self::with_config(TestConfig::default()).await
    }

    /// Create a test fixture with custom configuration.
    pub async fn with_config(test_config: TestConfig) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let db_path = temp_dir.path().join("test.db");

        let config = Config {
            database: DatabaseConfig { path: db_path.clone() },
            augment: AugmentConfig {
                debounce_ms: 20,
                display: test_config.display,
                settle_timeout_ms: 5_000,
                ..Default::default()
            },
            ..Default::default()
        };

        let store = Arc::new(SqliteKvStore::new(&db_path).expect("Failed to create store"));
        for site in &test_config.disabled_sites {
            store
                .set_one(&site.flag_key(), Value::Bool(false))
                .expect("Failed to store flag");
        }

        let features =
            Arc::new(FeatureState::load(store.as_ref()).expect("Failed to load features"));
        features.watch(store.subscribe());

        let fetcher = MockFetcher::new();

        let state = Arc::new(posterboard_server::state::AppState::new(
            config,
            Arc::clone(&store) as Arc<dyn KvStore>,
            Arc::clone(&features),
            Arc::new(fetcher.clone()) as Arc<dyn PageFetcher>,
        ));

        let router = posterboard_server::api::create_router(state);

        Self {
            router,
            fetcher,
            store,
            features,
            temp_dir,
        }
    }

    /// Send a GET request to the test server.
    pub async fn get(&self, path: &str) -> TestResponse {
        self.request("GET", path, None).await
    }

    /// Send a PUT request with JSON body.
    pub async fn put(&self, path: &str, body: Value) -> TestResponse {
        self.request("PUT", path, Some(body)).await
    }

    /// Send a DELETE request.
    pub async fn delete(&self, path: &str) -> TestResponse {
        self.request("DELETE", path, None).await
    }

    /// Send a POST request with an HTML body.
    pub async fn post_html(&self, path: &str, html: &str) -> TestResponse {
        self.request_raw("POST", path, html, "text/html").await
    }

    /// Send a request with raw string body and custom content type.
    async fn request_raw(
        &self,
        method: &str,
        path: &str,
        body: &str,
        content_type: &str,
    ) -> TestResponse {
        let request = Request::builder()
            .method(method)
            .uri(path)
            .header("Content-Type", content_type)
            .body(Body::from(body.to_string()))
            .unwrap();

        self.send(request).await
    }

    /// Send a request to the test server.
    async fn request(&self, method: &str, path: &str, body: Option<Value>) -> TestResponse {
        let request_builder = Request::builder().method(method).uri(path);

        let request = if let Some(json_body) = body {
            request_builder
                .header("Content-Type", "application/json")
                .body(Body::from(serde_json::to_string(&json_body).unwrap()))
                .unwrap()
        } else {
            request_builder.body(Body::empty()).unwrap()
        };

        self.send(request).await
    }

    async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let headers = response.headers().clone();
        let body_bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();

        let text = String::from_utf8_lossy(&body_bytes).into_owned();
        let body: Value = if body_bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body_bytes).unwrap_or(Value::Null)
        };

        TestResponse {
            status,
            headers,
            body,
            text,
        }
    }
}

/// Percent-encode a URL for use as a query parameter.
pub fn query_param(value: &str) -> String {
    urlencoding::encode(value).into_owned()
}
