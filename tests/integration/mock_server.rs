//! Mock HTTP server setup for integration tests

use fait_api::ApiService;
use mockito::{Matcher, Mock, Server, ServerGuard};
use std::time::Duration;

/// Test fixture that manages a mock server
pub struct MockServerFixture {
    pub server: ServerGuard,
    pub base_url: String,
}

impl MockServerFixture {
    pub async fn new() -> Self {
        let server = Server::new_async().await;
        let base_url = server.url();
        Self { server, base_url }
    }

    /// Facade whose HTTP transport points at the mock server
    pub fn api(&self) -> ApiService {
        ApiService::builder()
            .base_url(&self.base_url)
            .timeout(Duration::from_secs(5))
            .build()
            .expect("service builds")
    }

    /// Facade whose query store is a PostgREST endpoint on the mock server
    pub fn store_api(&self, key: &str) -> ApiService {
        ApiService::builder()
            .base_url(&self.base_url)
            .store_url(format!("{}/rest/v1", self.base_url))
            .store_key(key)
            .build()
            .expect("service builds")
    }

    /// Create a mock for a JSON response
    pub async fn mock_json(&mut self, method: &str, path: &str, status: usize, body: &str) -> Mock {
        self.server
            .mock(method, path)
            .match_query(Matcher::Any)
            .with_status(status)
            .with_header("content-type", "application/json")
            .with_body(body)
            .create_async()
            .await
    }
}
