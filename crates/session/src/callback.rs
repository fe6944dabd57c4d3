//! Provider URL construction and callback-fragment parsing.

use std::collections::BTreeMap;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde_json::Value;
use uuid::Uuid;

use authwire_auth::IdTokenClaims;

use crate::config::AuthConfig;
use crate::error::ProviderError;
use crate::provider::AuthResult;

/// Per-request parameters of an authorize redirect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizeParams {
    pub state: String,
    pub nonce: String,
    /// `Some("none")` for a silent check.
    pub prompt: Option<String>,
}

impl AuthorizeParams {
    pub fn generate() -> Self {
        Self {
            state: Uuid::now_v7().simple().to_string(),
            nonce: Uuid::now_v7().simple().to_string(),
            prompt: None,
        }
    }

    pub fn silent(mut self) -> Self {
        self.prompt = Some("none".to_string());
        self
    }
}

fn query(pairs: &[(&str, &str)]) -> String {
    pairs
        .iter()
        .map(|(k, v)| format!("{k}={}", urlencoding::encode(v)))
        .collect::<Vec<_>>()
        .join("&")
}

/// `<base>/authorize?...` for an interactive or silent login.
pub fn authorize_url(config: &AuthConfig, params: &AuthorizeParams) -> String {
    let mut pairs = vec![
        ("client_id", config.client_id.as_str()),
        ("response_type", config.response_type.as_str()),
        ("redirect_uri", config.redirect_uri.as_str()),
        ("scope", config.scope.as_str()),
        ("state", params.state.as_str()),
        ("nonce", params.nonce.as_str()),
    ];
    if let Some(audience) = &config.audience {
        pairs.push(("audience", audience.as_str()));
    }
    if let Some(prompt) = &params.prompt {
        pairs.push(("prompt", prompt.as_str()));
    }

    format!("{}/authorize?{}", config.base_url(), query(&pairs))
}

/// `<base>/v2/logout?...` returning the browser to `return_to`.
pub fn logout_url(config: &AuthConfig, return_to: &str) -> String {
    format!(
        "{}/v2/logout?{}",
        config.base_url(),
        query(&[("returnTo", return_to), ("client_id", config.client_id.as_str())])
    )
}

fn parse_params(fragment: &str) -> Result<BTreeMap<String, String>, ProviderError> {
    let trimmed = fragment.trim_start_matches('#');
    if trimmed.is_empty() {
        return Err(ProviderError::new(
            ProviderError::INVALID_HASH,
            "callback fragment is empty",
        ));
    }

    let mut params = BTreeMap::new();
    for pair in trimmed.split('&').filter(|p| !p.is_empty()) {
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        let decode = |raw: &str| {
            let raw = raw.replace('+', " ");
            urlencoding::decode(&raw).map(|v| v.into_owned()).map_err(|e| {
                ProviderError::new(
                    ProviderError::INVALID_HASH,
                    format!("callback fragment is not valid utf-8: {e}"),
                )
            })
        };
        params.insert(decode(key)?, decode(value)?);
    }
    Ok(params)
}

/// Decode the (unverified) payload segment of a compact JWT.
///
/// Signature verification belongs to whoever consumes the access token.
pub fn decode_id_token_claims(id_token: &str) -> Result<IdTokenClaims, ProviderError> {
    let invalid = |reason: String| ProviderError::new(ProviderError::INVALID_TOKEN, reason);

    let segments: Vec<&str> = id_token.split('.').collect();
    let [_, payload, _] = segments.as_slice() else {
        return Err(invalid(format!(
            "id token has {} segments, expected 3",
            segments.len()
        )));
    };

    let bytes = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .map_err(|e| invalid(format!("id token payload is not base64url: {e}")))?;

    serde_json::from_slice(&bytes).map_err(|e| invalid(format!("id token payload is not valid claims: {e}")))
}

/// Parse a `#access_token=..&id_token=..` or `#error=..` callback fragment.
pub fn parse_callback_fragment(fragment: &str) -> Result<AuthResult, ProviderError> {
    let params = parse_params(fragment)?;

    if params.contains_key("error") {
        let payload = Value::Object(
            params
                .into_iter()
                .map(|(k, v)| (k, Value::String(v)))
                .collect(),
        );
        return Err(ProviderError::from_payload(payload));
    }

    let required = |key: &str| {
        params.get(key).cloned().ok_or_else(|| {
            ProviderError::new(
                ProviderError::INVALID_HASH,
                format!("callback fragment is missing `{key}`"),
            )
        })
    };

    let access_token = required("access_token")?;
    let id_token = required("id_token")?;
    let claims = decode_id_token_claims(&id_token)?;

    let mut result = AuthResult::new(id_token, access_token, claims);
    result.expires_in = params.get("expires_in").and_then(|v| v.parse().ok());
    result.state = params.get("state").cloned();
    Ok(result)
}
