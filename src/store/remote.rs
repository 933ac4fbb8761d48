//! Remote store: HTTP client against the persistence engine
//!
//! Translates the capability contract into API calls and unwraps the
//! `{success,data}` envelope. Also owns the bounded-time health probe
//! the storage-mode manager relies on.

use async_trait::async_trait;
use reqwest::{Method, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::time::Duration;

use super::{PostStore, SaveRequest, StorageInfo, StorageKind};
use crate::data::{Post, PostFilter, Stats};
use crate::error::{AppError, Result};

/// Response envelope produced by the API
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    success: bool,
    data: Option<T>,
    error: Option<String>,
}

/// Health probe body
#[derive(Debug, Deserialize)]
struct HealthBody {
    success: bool,
}

pub struct RemoteStore {
    base_url: String,
    client: reqwest::Client,
    probe_timeout: Duration,
}

impl RemoteStore {
    /// Create a client for the API at `base_url` (no trailing slash)
    ///
    /// `timeout` bounds every request; `probe_timeout` bounds the
    /// health probe separately (typically shorter).
    pub fn new(base_url: &str, timeout: Duration, probe_timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("Festboard/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
            probe_timeout,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api{}", self.base_url, path)
    }

    /// Bounded-time health check
    ///
    /// Timeout, connection failure, non-2xx status, malformed body and
    /// `success != true` all count uniformly as "remote unavailable".
    pub async fn probe(&self) -> bool {
        let response = self
            .client
            .get(self.url("/health"))
            .timeout(self.probe_timeout)
            .send()
            .await;

        match response {
            Ok(response) if response.status().is_success() => response
                .json::<HealthBody>()
                .await
                .map(|body| body.success)
                .unwrap_or(false),
            Ok(response) => {
                tracing::debug!(status = %response.status(), "Health probe rejected");
                false
            }
            Err(error) => {
                tracing::debug!(%error, "Health probe failed");
                false
            }
        }
    }

    /// Send a request and unwrap the success envelope
    async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<&serde_json::Value>,
    ) -> Result<T> {
        let mut request = self.client.request(method, self.url(path));
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        let status = response.status();

        if status == StatusCode::NOT_FOUND {
            return Err(AppError::NotFound);
        }

        let envelope: Envelope<T> = response
            .json()
            .await
            .map_err(|error| AppError::Remote(format!("malformed response: {error}")))?;

        if !status.is_success() || !envelope.success {
            return Err(AppError::Remote(
                envelope
                    .error
                    .unwrap_or_else(|| format!("request failed with status {status}")),
            ));
        }

        envelope
            .data
            .ok_or_else(|| AppError::Remote("response envelope had no data".to_string()))
    }

    /// Variant for endpoints that answer with a message instead of data
    async fn request_ack(
        &self,
        method: Method,
        path: &str,
        body: Option<&serde_json::Value>,
    ) -> Result<()> {
        let mut request = self.client.request(method, self.url(path));
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        let status = response.status();

        if status == StatusCode::NOT_FOUND {
            return Err(AppError::NotFound);
        }

        let envelope: Envelope<serde_json::Value> = response
            .json()
            .await
            .map_err(|error| AppError::Remote(format!("malformed response: {error}")))?;

        if !status.is_success() || !envelope.success {
            return Err(AppError::Remote(
                envelope
                    .error
                    .unwrap_or_else(|| format!("request failed with status {status}")),
            ));
        }

        Ok(())
    }

    fn save_body(title: &Option<String>, content: &str, images: &[String]) -> serde_json::Value {
        serde_json::json!({
            "title": title,
            "content": content,
            "images": images,
        })
    }
}

#[async_trait]
impl PostStore for RemoteStore {
    async fn get_posts(&self) -> Result<Vec<Post>> {
        self.request(Method::GET, "/posts", None).await
    }

    async fn save_post(&self, request: SaveRequest) -> Result<Post> {
        match request {
            SaveRequest::Create {
                title,
                content,
                images,
            } => {
                let body = Self::save_body(&title, &content, &images);
                self.request(Method::POST, "/posts", Some(&body)).await
            }
            SaveRequest::Update {
                id,
                title,
                content,
                images,
            } => {
                let body = Self::save_body(&title, &content, &images);
                self.request(Method::PUT, &format!("/posts/{id}"), Some(&body))
                    .await
            }
        }
    }

    async fn delete_post(&self, id: &str) -> Result<bool> {
        match self
            .request_ack(Method::DELETE, &format!("/posts/{id}"), None)
            .await
        {
            Ok(()) => Ok(true),
            Err(AppError::NotFound) => Ok(false),
            Err(error) => Err(error),
        }
    }

    async fn get_post_by_id(&self, id: &str) -> Result<Option<Post>> {
        match self.request(Method::GET, &format!("/posts/{id}"), None).await {
            Ok(post) => Ok(Some(post)),
            Err(AppError::NotFound) => Ok(None),
            Err(error) => Err(error),
        }
    }

    async fn search_posts(&self, query: &str) -> Result<Vec<Post>> {
        let path = format!("/posts?search={}", urlencoding::encode(query));
        self.request(Method::GET, &path, None).await
    }

    async fn get_posts_by_filter(&self, filter: PostFilter) -> Result<Vec<Post>> {
        let path = match filter {
            PostFilter::All => "/posts".to_string(),
            other => format!("/posts?filter={}", other.as_str()),
        };
        self.request(Method::GET, &path, None).await
    }

    async fn get_stats(&self) -> Result<Stats> {
        self.request(Method::GET, "/stats", None).await
    }

    async fn get_settings(&self) -> Result<serde_json::Map<String, serde_json::Value>> {
        self.request(Method::GET, "/settings", None).await
    }

    async fn save_setting(&self, key: &str, value: &serde_json::Value) -> Result<()> {
        let body = serde_json::json!({ "value": value });
        self.request_ack(Method::PUT, &format!("/settings/{key}"), Some(&body))
            .await
    }

    async fn export_data(&self) -> Result<String> {
        let response = self.client.get(self.url("/export")).send().await?;
        if !response.status().is_success() {
            return Err(AppError::Remote(format!(
                "export failed with status {}",
                response.status()
            )));
        }

        Ok(response.text().await?)
    }

    async fn import_data(&self, payload: &str) -> Result<()> {
        let data: serde_json::Value = serde_json::from_str(payload)
            .map_err(|error| AppError::Validation(format!("invalid import payload: {error}")))?;

        let body = serde_json::json!({ "data": data });
        self.request_ack(Method::POST, "/import", Some(&body)).await
    }

    async fn clear_all_data(&self) -> Result<()> {
        self.request_ack(Method::DELETE, "/clear", None).await
    }

    async fn storage_info(&self) -> Result<StorageInfo> {
        // Database storage is unbounded; report the approximate size
        // of the post set, mirroring what the local store measures.
        match self.get_posts().await {
            Ok(posts) => {
                let used = serde_json::to_string(&posts).map(|s| s.len() as u64).unwrap_or(0);
                Ok(StorageInfo {
                    available: true,
                    kind: StorageKind::Database,
                    used_bytes: used,
                    quota_bytes: None,
                    remaining_bytes: None,
                })
            }
            Err(_) => Ok(StorageInfo {
                available: false,
                kind: StorageKind::Database,
                used_bytes: 0,
                quota_bytes: None,
                remaining_bytes: None,
            }),
        }
    }
}
