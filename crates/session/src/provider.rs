//! Identity provider contract.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use authwire_auth::IdTokenClaims;

use crate::error::ProviderError;

/// Tokens and decoded claims returned by a successful authentication.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResult {
    pub id_token: String,
    pub access_token: String,
    pub id_token_payload: IdTokenClaims,
    /// Access token lifetime in seconds, when the provider reports it.
    #[serde(default)]
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub state: Option<String>,
    /// Application state passed to `authorize`, echoed back by the provider.
    #[serde(default)]
    pub app_state: Option<Value>,
}

impl AuthResult {
    pub fn new(
        id_token: impl Into<String>,
        access_token: impl Into<String>,
        claims: IdTokenClaims,
    ) -> Self {
        Self {
            id_token: id_token.into(),
            access_token: access_token.into(),
            id_token_payload: claims,
            expires_in: None,
            state: None,
            app_state: None,
        }
    }
}

/// Overrides for a silent session check; `None` fields use configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CheckSessionOptions {
    pub audience: Option<String>,
    pub scope: Option<String>,
}

/// Redirect-based identity provider client.
///
/// `authorize` and `logout` hand control to the provider and return
/// nothing; the outcome of `authorize` arrives later through
/// `parse_callback` on the callback route.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    fn authorize(&self, app_state: Option<&Value>);

    async fn parse_callback(&self) -> Result<AuthResult, ProviderError>;

    /// Non-interactive renewal relying on an existing provider session.
    async fn check_session(&self, options: &CheckSessionOptions) -> Result<AuthResult, ProviderError>;

    fn logout(&self, return_to: &str);
}
