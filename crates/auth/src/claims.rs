use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Decoded identity-token payload (transport-agnostic).
///
/// Only `sub` and `exp` are required; the profile fields are optional and
/// any claim not modelled here is preserved in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdTokenClaims {
    /// Subject / provider-side user identifier.
    pub sub: String,

    /// Expiry, seconds since the Unix epoch.
    pub exp: i64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nickname: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub picture: Option<String>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl IdTokenClaims {
    pub fn new(sub: impl Into<String>, exp: i64) -> Self {
        Self {
            sub: sub.into(),
            exp,
            name: None,
            nickname: None,
            email: None,
            picture: None,
            extra: Map::new(),
        }
    }

    /// Absolute expiry instant: `exp * 1000` milliseconds since the epoch.
    ///
    /// Returns `None` when the value is outside chrono's representable range.
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.exp
            .checked_mul(1000)
            .and_then(DateTime::<Utc>::from_timestamp_millis)
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_nickname(mut self, nickname: impl Into<String>) -> Self {
        self.nickname = Some(nickname.into());
        self
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn with_picture(mut self, picture: impl Into<String>) -> Self {
        self.picture = Some(picture.into());
        self
    }
}
