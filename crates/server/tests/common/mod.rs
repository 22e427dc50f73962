//! Common test utilities for router testing with mocks.
//!
//! Builds an in-process router over a real pipeline whose transfers and
//! persistence are mocked, so every endpoint can be exercised without a
//! network or a database file.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{HeaderMap, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

use sofa_core::{
    testing::{MockGetter, MockNotifier, MockRepository},
    Config, Dispatcher, DownloadEngine, EngineConfig, MediaRepository, Pipeline, PollStage,
};
use sofa_server::state::AppState;

/// Re-export fixtures for test convenience
pub use sofa_core::testing::fixtures;

/// Test fixture for router testing with mock dependencies.
///
/// # Example
///
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_health() {
///     let fixture = TestFixture::new().await;
///     let response = fixture.get("/api/v1/health").await;
///     assert_eq!(response.status, 200);
/// }
/// ```
pub struct TestFixture {
    /// The Axum router for testing
    pub router: Router,
    /// Mock getter - control transfers
    pub getter: Arc<MockGetter>,
    /// Mock repository - inspect and seed persisted records
    pub repository: Arc<MockRepository>,
    pub pipeline: Arc<Pipeline>,
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

impl TestFixture {
    /// Create a fixture whose transfers stay in flight until released.
    pub async fn new() -> Self {
        Self::with_repository(MockRepository::new()).await
    }

    /// Create a fixture over a pre-seeded repository.
    ///
    /// Downloads left in progress in `repository` are recovered, and so
    /// become in flight, as soon as the pipeline starts.
    pub async fn with_repository(repository: MockRepository) -> Self {
        let getter = Arc::new(MockGetter::holding());
        let repository = Arc::new(repository);

        let engine = Arc::new(DownloadEngine::new(
            EngineConfig {
                max_concurrent_downloads: 2,
                poll_interval_ms: 5,
                ..Default::default()
            },
            Arc::clone(&repository) as Arc<dyn MediaRepository>,
            getter.clone(),
            Arc::new(MockNotifier::new()),
        ));

        let pipeline = Arc::new(Pipeline::new(
            Dispatcher::new(),
            Arc::clone(&repository) as Arc<dyn MediaRepository>,
            PollStage::new(vec![]),
            engine,
        ));
        pipeline.start().await.expect("Failed to start pipeline");

        let state = Arc::new(AppState::new(
            Config::default(),
            Arc::clone(&repository) as Arc<dyn MediaRepository>,
            Arc::clone(&pipeline),
        ));

        Self {
            router: sofa_server::api::create_router(state),
            getter,
            repository,
            pipeline,
        }
    }

    /// Send a GET request to the test server.
    pub async fn get(&self, path: &str) -> TestResponse {
        self.request("GET", path).await
    }

    /// Send a POST request without a body.
    pub async fn post(&self, path: &str) -> TestResponse {
        self.request("POST", path).await
    }

    /// Send a DELETE request.
    pub async fn delete(&self, path: &str) -> TestResponse {
        self.request("DELETE", path).await
    }

    /// Send a GET request and return the raw body text.
    pub async fn get_text(&self, path: &str) -> (StatusCode, String) {
        let request = Request::builder()
            .method("GET")
            .uri(path)
            .body(Body::empty())
            .unwrap();
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();
        (status, String::from_utf8_lossy(&bytes).to_string())
    }

    async fn request(&self, method: &str, path: &str) -> TestResponse {
        let request = Request::builder()
            .method(method)
            .uri(path)
            .body(Body::empty())
            .unwrap();

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

        let body: Value = if body_bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body_bytes).unwrap_or(Value::Null)
        };

        TestResponse {
            status,
            headers,
            body,
        }
    }
}
