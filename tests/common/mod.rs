//! Common test utilities for E2E tests

use festboard::{AppState, config};
use std::net::SocketAddr;
use tempfile::TempDir;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// Test server instance
pub struct TestServer {
    pub addr: String,
    pub socket_addr: SocketAddr,
    pub state: AppState,
    pub server: JoinHandle<()>,
    pub _temp_dir: TempDir,
    pub client: reqwest::Client,
}

impl TestServer {
    /// Create a new test server instance
    pub async fn new() -> Self {
        // Create temporary directory for test database
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("test.db");

        // Create test configuration
        let config = config::AppConfig {
            server: config::ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 0, // Let OS assign port
            },
            database: config::DatabaseConfig {
                path: db_path.clone(),
            },
            local_store: config::LocalStoreConfig {
                path: Some(temp_dir.path().join("fallback.json")),
                quota_bytes: 5 * 1024 * 1024,
            },
            monitor: config::MonitorConfig {
                interval_seconds: 30,
                probe_timeout_seconds: 2,
            },
            logging: config::LoggingConfig {
                level: "info".to_string(),
                format: "pretty".to_string(),
            },
        };

        // Initialize app state
        let state = AppState::new(config).await.unwrap();

        // Create HTTP client
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .unwrap();

        // Bind to random port
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let socket_addr = listener.local_addr().unwrap();
        let addr = format!("http://{}", socket_addr);

        // Build router
        let app = festboard::build_router(state.clone());

        // Spawn server in background
        let server = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        // Wait a bit for server to start
        tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;

        Self {
            addr,
            socket_addr,
            state,
            server,
            _temp_dir: temp_dir,
            client,
        }
    }

    /// Get base URL for API requests
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.addr, path)
    }

    /// Create a post through the API, returning its JSON representation
    pub async fn create_post(
        &self,
        title: Option<&str>,
        content: &str,
        images: &[&str],
    ) -> serde_json::Value {
        let response = self
            .client
            .post(self.url("/api/posts"))
            .json(&serde_json::json!({
                "title": title,
                "content": content,
                "images": images,
            }))
            .send()
            .await
            .unwrap();

        assert_eq!(response.status(), 201);
        let body: serde_json::Value = response.json().await.unwrap();
        assert_eq!(body["success"], true);
        body["data"].clone()
    }
}
