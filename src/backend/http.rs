//! REST document endpoint [`Connection`].
//!
//! Parameters: `base_url` (required), `api_key` (optional, sent as a bearer
//! token). A chunk is one `POST {base_url}/collections/{c}/batch`; the probe
//! is `GET {base_url}/collections/{c}?limit=1`.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde_json::json;

use super::Connection;
use crate::error::BackendError;
use crate::models::{BackendConfig, Row};

pub struct HttpConnection {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl HttpConnection {
    pub fn open(config: &BackendConfig) -> Result<Self, BackendError> {
        let base_url = config
            .param("base_url")
            .filter(|u| !u.is_empty())
            .ok_or_else(|| {
                BackendError::InvalidParams(format!("backend '{}' needs a 'base_url'", config.id))
            })?;

        Ok(Self {
            client: Client::builder().build()?,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: config
                .param("api_key")
                .filter(|k| !k.is_empty())
                .map(str::to_string),
        })
    }

    fn collection_url(&self, collection: &str) -> String {
        format!("{}/collections/{}", self.base_url, collection)
    }

    fn authorize(&self, req: RequestBuilder) -> RequestBuilder {
        match &self.api_key {
            Some(key) => req.bearer_auth(key),
            None => req,
        }
    }

    async fn send(&self, req: RequestBuilder) -> Result<(), BackendError> {
        let resp = self.authorize(req).send().await.map_err(classify)?;
        let status = resp.status();
        if status.is_success() {
            return Ok(());
        }
        let body = resp.text().await.unwrap_or_default();
        if status == StatusCode::SERVICE_UNAVAILABLE {
            return Err(BackendError::Offline(body));
        }
        Err(BackendError::Write(format!("HTTP {}: {}", status, body)))
    }
}

fn classify(err: reqwest::Error) -> BackendError {
    if err.is_connect() || err.is_timeout() {
        BackendError::Unreachable(err.to_string())
    } else {
        BackendError::Http(err)
    }
}

#[async_trait]
impl Connection for HttpConnection {
    async fn enable_persistence(&self) -> Result<(), BackendError> {
        Err(BackendError::PersistenceUnsupported)
    }

    async fn write_batch(&self, collection: &str, docs: &[Row]) -> Result<(), BackendError> {
        let url = format!("{}/batch", self.collection_url(collection));
        self.send(self.client.post(url).json(&json!({ "documents": docs })))
            .await
    }

    async fn probe(&self, collection: &str) -> Result<(), BackendError> {
        let url = self.collection_url(collection);
        self.send(self.client.get(url).query(&[("limit", "1")])).await
    }
}
