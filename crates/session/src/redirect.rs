//! [`IdentityProvider`] driving the provider through browser redirects.

use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use serde_json::Value;

use crate::callback::{AuthorizeParams, authorize_url, logout_url, parse_callback_fragment};
use crate::config::AuthConfig;
use crate::error::ProviderError;
use crate::provider::{AuthResult, CheckSessionOptions, IdentityProvider};

/// Host-side navigation primitives.
#[async_trait]
pub trait Navigator: Send + Sync {
    /// Leave the application for `url`.
    fn redirect(&self, url: &str);

    /// Fragment of the current URL (including the leading `#`, if any).
    fn fragment(&self) -> String;

    /// Load `url` out of sight (e.g. a hidden frame) and return the
    /// fragment the provider redirected it to.
    async fn silent_authorize(&self, url: &str) -> Result<String, ProviderError>;
}

#[derive(Debug, Clone)]
struct Transaction {
    state: String,
    app_state: Option<Value>,
}

/// Redirect-based provider client.
///
/// Remembers the `state` of the last interactive authorize request and
/// rejects callbacks carrying a different one.
pub struct RedirectIdentityProvider<N> {
    config: AuthConfig,
    navigator: N,
    transaction: Mutex<Option<Transaction>>,
}

impl<N: Navigator> RedirectIdentityProvider<N> {
    pub fn new(config: AuthConfig, navigator: N) -> Self {
        Self {
            config,
            navigator,
            transaction: Mutex::new(None),
        }
    }

    pub fn navigator(&self) -> &N {
        &self.navigator
    }

    fn check_state(expected: &str, result: &AuthResult) -> Result<(), ProviderError> {
        match result.state.as_deref() {
            Some(state) if state == expected => Ok(()),
            other => Err(ProviderError::new(
                ProviderError::INVALID_STATE,
                format!("callback state {other:?} does not match the pending request"),
            )),
        }
    }
}

#[async_trait]
impl<N: Navigator> IdentityProvider for RedirectIdentityProvider<N> {
    fn authorize(&self, app_state: Option<&Value>) {
        let params = AuthorizeParams::generate();
        *self.transaction.lock().unwrap_or_else(PoisonError::into_inner) = Some(Transaction {
            state: params.state.clone(),
            app_state: app_state.cloned(),
        });

        self.navigator.redirect(&authorize_url(&self.config, &params));
    }

    async fn parse_callback(&self) -> Result<AuthResult, ProviderError> {
        let mut result = parse_callback_fragment(&self.navigator.fragment())?;

        let transaction = self
            .transaction
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        if let Some(transaction) = transaction {
            Self::check_state(&transaction.state, &result)?;
            result.app_state = transaction.app_state;
        }

        Ok(result)
    }

    async fn check_session(&self, options: &CheckSessionOptions) -> Result<AuthResult, ProviderError> {
        let mut config = self.config.clone();
        if let Some(audience) = &options.audience {
            config.audience = Some(audience.clone());
        }
        if let Some(scope) = &options.scope {
            config.scope = scope.clone();
        }

        let params = AuthorizeParams::generate().silent();
        let fragment = self
            .navigator
            .silent_authorize(&authorize_url(&config, &params))
            .await?;

        let result = parse_callback_fragment(&fragment)?;
        Self::check_state(&params.state, &result)?;
        Ok(result)
    }

    fn logout(&self, return_to: &str) {
        self.navigator.redirect(&logout_url(&self.config, return_to));
    }
}
