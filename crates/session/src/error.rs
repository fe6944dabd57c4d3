//! Session error model.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Result type used across the session layer.
pub type SessionResult<T> = Result<T, AuthError>;

/// Failure reported by the identity provider (callback parse or silent check).
///
/// The provider's payload is kept verbatim in `payload`; `code` and
/// `description` are lifted out of it for matching and display.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
#[error("identity provider error `{code}`: {}", .description.as_deref().unwrap_or("no description"))]
pub struct ProviderError {
    pub code: String,
    pub description: Option<String>,
    pub payload: Value,
}

impl ProviderError {
    /// No active provider session; an interactive login is needed.
    pub const LOGIN_REQUIRED: &'static str = "login_required";
    /// The callback fragment was empty or malformed.
    pub const INVALID_HASH: &'static str = "invalid_hash";
    /// The identity token could not be decoded.
    pub const INVALID_TOKEN: &'static str = "invalid_token";
    /// The callback `state` did not match the pending transaction.
    pub const INVALID_STATE: &'static str = "invalid_state";
    /// The identity token was already expired when it arrived.
    pub const EXPIRED_TOKEN: &'static str = "expired_token";

    pub fn new(code: impl Into<String>, description: impl Into<String>) -> Self {
        let code = code.into();
        let description = description.into();
        let payload = serde_json::json!({
            "error": code,
            "error_description": description,
        });
        Self {
            code,
            description: Some(description),
            payload,
        }
    }

    /// Build from a raw provider payload, keeping it untouched.
    ///
    /// Recognizes both `error`/`error_description` and `code`/`description`
    /// field spellings; a payload without either is classified as `unknown`.
    pub fn from_payload(payload: Value) -> Self {
        let field = |names: &[&str]| {
            names
                .iter()
                .find_map(|n| payload.get(*n).and_then(Value::as_str))
                .map(str::to_owned)
        };

        let code = field(&["error", "code"]).unwrap_or_else(|| "unknown".to_string());
        let description = field(&["error_description", "errorDescription", "description"]);

        Self {
            code,
            description,
            payload,
        }
    }

    pub fn is_login_required(&self) -> bool {
        self.code == Self::LOGIN_REQUIRED
    }
}

/// Persistent flag store failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("storage io error: {0}")]
    Io(String),

    #[error("storage serialization error: {0}")]
    Serialization(String),
}

/// Error surfaced by [`crate::AuthController`] operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AuthError {
    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Store(#[from] StoreError),

    /// The waiter was cancelled before a qualifying transition occurred.
    #[error("token wait was cancelled")]
    WaitCancelled,

    #[error("session controller has been disposed")]
    Disposed,
}

impl AuthError {
    pub fn provider(&self) -> Option<&ProviderError> {
        match self {
            AuthError::Provider(e) => Some(e),
            _ => None,
        }
    }
}

/// Configuration failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("missing required configuration value `{0}`")]
    Missing(&'static str),

    #[error("invalid configuration value `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}
