//! `fetch_json` / `fetch_text`: cache + limiter + breaker + retry in one
//! primitive.
//!
//! Flow per call: read the cache entry for the key and serve it outright
//! while it is younger than its TTL — a cache hit makes no network request
//! at all, which is what keeps repeat renders inside provider rate limits.
//! Only an entry at or past its TTL goes to the network, carrying its
//! validator: the attempt loop is scheduled on the origin's limiter, every
//! attempt is guarded by the circuit breaker, transport failures back off
//! and retry. Response bodies are parsed outside the attempt loop so a
//! malformed body is never retried.

use super::circuit_breaker::CircuitBreaker;
use super::host_limiter::HostLimiterRegistry;
use super::retry_policy::RetryPolicy;
use super::transport::{HttpTransport, TransportRequest, TransportResponse};
use crate::cache::{CacheStore, CachedEntry};
use crate::config::EngineConfig;
use crate::shared::errors::{EngineError, EngineResult};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::debug;

#[derive(Debug, Clone, PartialEq)]
pub struct FetchOutcome<T> {
    pub data: T,
    /// True when the payload came out of the cache, either via a validator
    /// revalidation or as a degraded fallback after exhausted retries.
    pub from_cache: bool,
}

/// What the attempt loop produced before body parsing.
enum CallResult {
    Fresh(TransportResponse),
    /// Backend replied 304; the cached payload is still current.
    Unchanged,
}

pub struct ResilientClient {
    transport: Arc<dyn HttpTransport>,
    store: Arc<dyn CacheStore>,
    limiters: HostLimiterRegistry,
    breaker: CircuitBreaker,
    retry: RetryPolicy,
}

impl ResilientClient {
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        store: Arc<dyn CacheStore>,
        config: &EngineConfig,
    ) -> Self {
        Self {
            transport,
            store,
            limiters: HostLimiterRegistry::new(
                config.rate_limits.clone(),
                config.default_rate_limit,
            ),
            breaker: CircuitBreaker::default(),
            retry: RetryPolicy::from_config(config.retry),
        }
    }

    pub async fn fetch_json(&self, url: &str, ttl: Duration) -> EngineResult<FetchOutcome<Value>> {
        let request = TransportRequest::get(url);
        self.fetch_value(url.to_string(), request, ttl).await
    }

    pub async fn post_json(
        &self,
        url: &str,
        body: Value,
        ttl: Duration,
    ) -> EngineResult<FetchOutcome<Value>> {
        // POST responses vary by body, so the body is part of the key.
        let key = format!("{}|{}", url, body);
        let request = TransportRequest::post(url, body);
        self.fetch_value(key, request, ttl).await
    }

    /// Same pipeline for quasi-structured text endpoints; the payload is
    /// cached as a JSON string.
    pub async fn fetch_text(&self, url: &str, ttl: Duration) -> EngineResult<FetchOutcome<String>> {
        let cached = self.read_cache(url);
        if let Some(entry) = &cached {
            if entry.is_fresh(ttl) {
                return Ok(FetchOutcome {
                    data: entry.payload.as_str().unwrap_or_default().to_string(),
                    from_cache: true,
                });
            }
        }
        let mut request = TransportRequest::get(url);
        request.validator = cached.as_ref().and_then(|e| e.validator.clone());

        match self.call_with_resilience(request).await {
            Ok(CallResult::Unchanged) => {
                let entry = cached.ok_or_else(|| {
                    EngineError::Transport("304 with no cached entry".to_string())
                })?;
                Ok(FetchOutcome {
                    data: entry.payload.as_str().unwrap_or_default().to_string(),
                    from_cache: true,
                })
            }
            Ok(CallResult::Fresh(response)) => {
                let entry = CachedEntry::new(Value::String(response.body.clone()), response.validator);
                self.write_cache(url, entry);
                Ok(FetchOutcome {
                    data: response.body,
                    from_cache: false,
                })
            }
            Err(err) => Err(err),
        }
    }

    async fn fetch_value(
        &self,
        key: String,
        mut request: TransportRequest,
        ttl: Duration,
    ) -> EngineResult<FetchOutcome<Value>> {
        let cached = self.read_cache(&key);
        if let Some(entry) = &cached {
            if entry.is_fresh(ttl) {
                return Ok(FetchOutcome {
                    data: entry.payload.clone(),
                    from_cache: true,
                });
            }
        }
        request.validator = cached.as_ref().and_then(|e| e.validator.clone());

        match self.call_with_resilience(request).await {
            Ok(CallResult::Unchanged) => {
                // Staleness keeps counting from the original fetch; the
                // entry's timestamp is deliberately not refreshed here.
                let entry = cached.ok_or_else(|| {
                    EngineError::Transport("304 with no cached entry".to_string())
                })?;
                Ok(FetchOutcome {
                    data: entry.payload,
                    from_cache: true,
                })
            }
            Ok(CallResult::Fresh(response)) => {
                let data: Value = serde_json::from_str(&response.body)
                    .map_err(|e| EngineError::Parse(format!("{}: {}", key, e)))?;
                let entry = CachedEntry::new(data.clone(), response.validator);
                self.write_cache(&key, entry);
                Ok(FetchOutcome {
                    data,
                    from_cache: false,
                })
            }
            // Past its TTL the entry is not trusted even when the network
            // is down; the failure propagates.
            Err(err) => Err(err),
        }
    }

    /// Limiter-scheduled attempt loop. The breaker is consulted before every
    /// attempt; an open circuit propagates immediately since retrying into it
    /// adds nothing.
    async fn call_with_resilience(&self, request: TransportRequest) -> EngineResult<CallResult> {
        let origin = origin_of(&request.url)?;
        let limiter = self.limiters.for_origin(&origin);

        limiter
            .run(|| async {
                let mut attempt = 1u32;
                loop {
                    if !self.breaker.can_call(&origin) {
                        return Err(EngineError::CircuitOpen(origin.clone()));
                    }

                    let outcome = match self.transport.execute(request.clone()).await {
                        Ok(response) => self.classify(&origin, response),
                        Err(err) => {
                            self.breaker.record_failure(&origin);
                            Err(err)
                        }
                    };

                    match outcome {
                        Ok(result) => return Ok(result),
                        Err(err) if err.is_retryable() && attempt < self.retry.max_attempts => {
                            let delay = self.retry.delay_after(attempt);
                            log::warn!(
                                "request to {} failed (attempt {}/{}): {}; retrying in {:?}",
                                origin,
                                attempt,
                                self.retry.max_attempts,
                                err,
                                delay
                            );
                            sleep(delay).await;
                            attempt += 1;
                        }
                        Err(err) => return Err(err),
                    }
                }
            })
            .await
    }

    /// Map an HTTP status onto the error model and the breaker. Server-side
    /// trouble (5xx, 429, 408) counts as a breaker failure; any other answer
    /// proves the origin alive.
    fn classify(&self, origin: &str, response: TransportResponse) -> EngineResult<CallResult> {
        if response.is_not_modified() {
            self.breaker.record_success(origin);
            return Ok(CallResult::Unchanged);
        }
        if response.is_success() {
            self.breaker.record_success(origin);
            return Ok(CallResult::Fresh(response));
        }
        match response.status {
            404 | 410 => {
                self.breaker.record_success(origin);
                Err(EngineError::NotFound(format!("HTTP {}", response.status)))
            }
            401 | 403 => {
                self.breaker.record_success(origin);
                Err(EngineError::Config(format!(
                    "{} rejected credentials (HTTP {})",
                    origin, response.status
                )))
            }
            status if status >= 500 || status == 429 || status == 408 => {
                self.breaker.record_failure(origin);
                Err(EngineError::Transport(format!("HTTP {}", status)))
            }
            status => {
                self.breaker.record_success(origin);
                Err(EngineError::Parse(format!("unexpected HTTP {}", status)))
            }
        }
    }

    fn read_cache(&self, key: &str) -> Option<CachedEntry> {
        match self.store.get(key) {
            Ok(entry) => entry,
            Err(e) => {
                debug!("cache read failed for {}: {}", key, e);
                None
            }
        }
    }

    fn write_cache(&self, key: &str, entry: CachedEntry) {
        if let Err(e) = self.store.put(key, entry) {
            debug!("cache write failed for {}: {}", key, e);
        }
    }

}

fn origin_of(url: &str) -> EngineResult<String> {
    let parsed = reqwest::Url::parse(url)
        .map_err(|e| EngineError::Config(format!("invalid url {}: {}", url, e)))?;
    parsed
        .host_str()
        .map(|h| h.to_string())
        .ok_or_else(|| EngineError::Config(format!("url has no host: {}", url)))
}
