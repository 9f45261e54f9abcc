//! Agent error types.

use oidc_probe_storage::StorageError;
use thiserror::Error;

pub type AgentResult<T> = Result<T, AgentError>;

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("discovery failed: {0}")]
    Discovery(String),

    #[error("token endpoint error: {0}")]
    TokenEndpoint(String),

    #[error("invalid token response: {0}")]
    InvalidTokenResponse(String),

    #[error("authorization callback error: {0}")]
    Callback(String),

    #[error("state parameter mismatch")]
    StateMismatch,

    #[error("login timed out")]
    Timeout,

    #[error("no user session")]
    NotAuthenticated,

    #[error("session has no refresh token")]
    NoRefreshToken,

    #[error("URL parsing error: {0}")]
    Url(#[from] url::ParseError),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
