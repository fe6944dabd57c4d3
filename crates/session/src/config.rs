//! Identity provider and storage-key configuration.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

const DEFAULT_APP_ORIGIN: &str = "http://localhost:8080";

fn default_response_type() -> String {
    "token id_token".to_string()
}

fn default_scope() -> String {
    "openid profile email".to_string()
}

fn default_flag_key() -> String {
    "loggedIn".to_string()
}

fn default_return_to_key() -> String {
    "returnTo".to_string()
}

fn default_callback_route() -> String {
    "callback".to_string()
}

/// Session manager configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Provider tenant domain, e.g. `example.eu.auth0.com`.
    pub domain: String,
    pub client_id: String,
    #[serde(default)]
    pub audience: Option<String>,
    /// Where the provider redirects after interactive login.
    pub redirect_uri: String,
    #[serde(default = "default_response_type")]
    pub response_type: String,
    #[serde(default = "default_scope")]
    pub scope: String,
    /// Where the provider redirects after logout.
    pub logout_return_to: String,
    /// Durable key for the "a session was established" flag.
    #[serde(default = "default_flag_key")]
    pub flag_key: String,
    /// Durable key for the path to return to after login.
    #[serde(default = "default_return_to_key")]
    pub return_to_key: String,
    /// Route name exempt from the on-load renewal attempt.
    #[serde(default = "default_callback_route")]
    pub callback_route: String,
}

impl AuthConfig {
    /// Configuration with defaults derived from the application origin.
    pub fn new(
        domain: impl Into<String>,
        client_id: impl Into<String>,
        app_origin: impl AsRef<str>,
    ) -> Self {
        let origin = app_origin.as_ref().trim_end_matches('/');
        Self {
            domain: domain.into(),
            client_id: client_id.into(),
            audience: None,
            redirect_uri: format!("{origin}/{}", default_callback_route()),
            response_type: default_response_type(),
            scope: default_scope(),
            logout_return_to: origin.to_string(),
            flag_key: default_flag_key(),
            return_to_key: default_return_to_key(),
            callback_route: default_callback_route(),
        }
    }

    /// Load from the process environment.
    ///
    /// Required: `AUTH_DOMAIN`, `AUTH_CLIENT_ID`.
    /// Optional: `AUTH_AUDIENCE`, `AUTH_APP_ORIGIN`, `AUTH_BASE_URL`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary key lookup (used by `from_env`).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let value = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let domain = value("AUTH_DOMAIN").ok_or(ConfigError::Missing("AUTH_DOMAIN"))?;
        let client_id = value("AUTH_CLIENT_ID").ok_or(ConfigError::Missing("AUTH_CLIENT_ID"))?;

        let origin = value("AUTH_APP_ORIGIN").unwrap_or_else(|| {
            tracing::warn!("AUTH_APP_ORIGIN not set; using {DEFAULT_APP_ORIGIN}");
            DEFAULT_APP_ORIGIN.to_string()
        });

        let mut config = Self::new(domain, client_id, &origin);
        config.audience = value("AUTH_AUDIENCE");
        if let Some(base_url) = value("AUTH_BASE_URL") {
            config.logout_return_to = base_url;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.domain.trim().is_empty() {
            return Err(ConfigError::Missing("domain"));
        }
        if self.client_id.trim().is_empty() {
            return Err(ConfigError::Missing("client_id"));
        }
        if self.domain.contains(char::is_whitespace) {
            return Err(ConfigError::Invalid {
                key: "domain",
                reason: "must not contain whitespace".to_string(),
            });
        }
        if self.callback_route.is_empty() {
            return Err(ConfigError::Invalid {
                key: "callback_route",
                reason: "must not be empty".to_string(),
            });
        }
        Ok(())
    }

    /// Provider base URL; a bare domain is served over https.
    pub fn base_url(&self) -> String {
        let domain = self.domain.trim_end_matches('/');
        if domain.starts_with("http://") || domain.starts_with("https://") {
            domain.to_string()
        } else {
            format!("https://{domain}")
        }
    }

    pub fn with_audience(mut self, audience: impl Into<String>) -> Self {
        self.audience = Some(audience.into());
        self
    }

    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = scope.into();
        self
    }

    pub fn with_logout_return_to(mut self, url: impl Into<String>) -> Self {
        self.logout_return_to = url.into();
        self
    }

    pub fn with_flag_key(mut self, key: impl Into<String>) -> Self {
        self.flag_key = key.into();
        self
    }

    pub fn with_return_to_key(mut self, key: impl Into<String>) -> Self {
        self.return_to_key = key.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_follow_the_app_origin() {
        let config = AuthConfig::new("tenant.auth0.com", "client", "https://app.example.com/");
        assert_eq!(config.redirect_uri, "https://app.example.com/callback");
        assert_eq!(config.logout_return_to, "https://app.example.com");
        assert_eq!(config.flag_key, "loggedIn");
        assert_eq!(config.return_to_key, "returnTo");
        assert_eq!(config.base_url(), "https://tenant.auth0.com");
    }

    #[test]
    fn env_lookup_requires_domain_and_client() {
        let err = AuthConfig::from_lookup(lookup(&[("AUTH_CLIENT_ID", "client")])).unwrap_err();
        assert_eq!(err, ConfigError::Missing("AUTH_DOMAIN"));

        let err = AuthConfig::from_lookup(lookup(&[("AUTH_DOMAIN", "tenant.auth0.com")])).unwrap_err();
        assert_eq!(err, ConfigError::Missing("AUTH_CLIENT_ID"));
    }

    #[test]
    fn env_lookup_reads_optional_values() {
        let config = AuthConfig::from_lookup(lookup(&[
            ("AUTH_DOMAIN", "tenant.auth0.com"),
            ("AUTH_CLIENT_ID", "client"),
            ("AUTH_AUDIENCE", "https://api.example.com"),
            ("AUTH_APP_ORIGIN", "https://app.example.com"),
            ("AUTH_BASE_URL", "https://www.example.com"),
        ]))
        .unwrap();

        assert_eq!(config.audience.as_deref(), Some("https://api.example.com"));
        assert_eq!(config.redirect_uri, "https://app.example.com/callback");
        assert_eq!(config.logout_return_to, "https://www.example.com");
    }

    #[test]
    fn serde_fills_defaults() {
        let config: AuthConfig = serde_json::from_value(serde_json::json!({
            "domain": "http://localhost:9000",
            "client_id": "client",
            "redirect_uri": "http://localhost:8080/callback",
            "logout_return_to": "http://localhost:8080"
        }))
        .unwrap();

        assert_eq!(config.scope, "openid profile email");
        assert_eq!(config.callback_route, "callback");
        assert_eq!(config.base_url(), "http://localhost:9000");
    }
}
