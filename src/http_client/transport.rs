//! Transport seam between the resilient client and the network.
//!
//! The retry/breaker/cache stack only cares about status, validator and body,
//! so the actual wire call sits behind a small trait that tests replace with
//! a mock.

use crate::shared::errors::{EngineError, EngineResult};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
}

#[derive(Debug, Clone)]
pub struct TransportRequest {
    pub method: HttpMethod,
    pub url: String,
    /// JSON body for POST requests.
    pub body: Option<Value>,
    /// Validator to send as If-None-Match, when a cache entry carries one.
    pub validator: Option<String>,
}

impl TransportRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: HttpMethod::Get,
            url: url.into(),
            body: None,
            validator: None,
        }
    }

    pub fn post(url: impl Into<String>, body: Value) -> Self {
        Self {
            method: HttpMethod::Post,
            url: url.into(),
            body: Some(body),
            validator: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub status: u16,
    /// ETag from the response, stored as the next validator.
    pub validator: Option<String>,
    pub body: String,
}

impl TransportResponse {
    pub fn is_not_modified(&self) -> bool {
        self.status == 304
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// One wire attempt. Network-level failures come back as
    /// `EngineError::Transport`; any HTTP status is a successful transport
    /// result and is classified by the caller.
    async fn execute(&self, request: TransportRequest) -> EngineResult<TransportResponse>;
}

pub struct ReqwestTransport {
    client: Client,
    user_agent: String,
}

impl ReqwestTransport {
    pub fn new() -> EngineResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| EngineError::Config(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            user_agent: "overscore/0.1".to_string(),
        })
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn execute(&self, request: TransportRequest) -> EngineResult<TransportResponse> {
        let mut builder = match request.method {
            HttpMethod::Get => self.client.get(&request.url),
            HttpMethod::Post => self.client.post(&request.url),
        };
        builder = builder
            .header("User-Agent", &self.user_agent)
            .header("Accept", "application/json, text/html;q=0.5");
        if let Some(validator) = &request.validator {
            builder = builder.header("If-None-Match", validator);
        }
        if let Some(body) = &request.body {
            builder = builder
                .header("Content-Type", "application/json")
                .json(body);
        }

        let response = builder.send().await.map_err(EngineError::from)?;
        let status = response.status().as_u16();
        let validator = response
            .headers()
            .get("etag")
            .and_then(|h| h.to_str().ok())
            .map(|s| s.to_string());
        let body = response.text().await.map_err(EngineError::from)?;

        Ok(TransportResponse {
            status,
            validator,
            body,
        })
    }
}
