use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug, Clone, Serialize)]
#[serde(tag = "type", content = "message")]
pub enum EngineError {
    /// Network-level failure (connect, timeout, 5xx). Retryable.
    #[error("Transport error: {0}")]
    Transport(String),

    /// Fast-fail while an origin's circuit is open. Not a real attempt,
    /// never retried.
    #[error("Circuit open for origin: {0}")]
    CircuitOpen(String),

    /// Malformed response body. Never retried.
    #[error("Parse error: {0}")]
    Parse(String),

    /// The backend answered cleanly but has no data for this item. A normal
    /// outcome, not a transport failure; adapters map it to an empty result.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Provider misconfiguration (missing credential etc). Disables the
    /// provider at startup rather than surfacing per call.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Durable cache store failure.
    #[error("Cache error: {0}")]
    Cache(String),
}

impl EngineError {
    /// Transport errors are the only kind worth a retry. Circuit-open
    /// short-circuits propagate immediately and parse errors would just
    /// waste a rate-limit slot.
    pub fn is_retryable(&self) -> bool {
        matches!(self, EngineError::Transport(_))
    }
}

impl From<reqwest::Error> for EngineError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            EngineError::Transport("request timeout".to_string())
        } else if err.is_connect() {
            EngineError::Transport(format!("connection failed: {}", err))
        } else if let Some(status) = err.status() {
            if status.is_server_error() || status.as_u16() == 429 {
                EngineError::Transport(format!("HTTP {}", status))
            } else {
                EngineError::Transport(format!("HTTP {}: {}", status, err))
            }
        } else {
            EngineError::Transport(err.to_string())
        }
    }
}

impl From<serde_json::Error> for EngineError {
    fn from(err: serde_json::Error) -> Self {
        EngineError::Parse(err.to_string())
    }
}

impl From<rusqlite::Error> for EngineError {
    fn from(err: rusqlite::Error) -> Self {
        EngineError::Cache(err.to_string())
    }
}

pub type EngineResult<T> = Result<T, EngineError>;
