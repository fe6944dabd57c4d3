//! Shared fixtures for controller tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value;
use tokio::sync::Notify;

use authwire_auth::IdTokenClaims;
use authwire_observability::{LogConfig, LogFormat};
use authwire_session::{
    AuthConfig, AuthController, AuthResult, AuthStatus, CheckSessionOptions, IdentityProvider,
    InMemoryFlagStore, ManualClock, PersistentFlagStore, ProviderError, StaticLocation,
};

pub const APP_ORIGIN: &str = "https://app.example.com";

pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap()
}

pub fn config() -> AuthConfig {
    AuthConfig::new("tenant.auth0.com", "client-123", APP_ORIGIN)
}

pub fn auth_result(access_token: &str, exp: i64) -> AuthResult {
    let claims = IdTokenClaims::new("auth0|abc", exp)
        .with_name("Alice Smith")
        .with_email("alice@example.com");
    AuthResult::new(format!("id-{access_token}"), access_token, claims)
}

pub fn login_required() -> ProviderError {
    ProviderError::new(ProviderError::LOGIN_REQUIRED, "Login required")
}

/// Provider double answering from scripted queues.
///
/// An empty check queue answers `login_required`.
#[derive(Default)]
pub struct ScriptedProvider {
    authorize_calls: AtomicUsize,
    check_calls: AtomicUsize,
    app_states: Mutex<Vec<Option<Value>>>,
    logouts: Mutex<Vec<String>>,
    callbacks: Mutex<VecDeque<Result<AuthResult, ProviderError>>>,
    checks: Mutex<VecDeque<Result<AuthResult, ProviderError>>>,
    gate: Mutex<Option<Arc<Notify>>>,
}

impl ScriptedProvider {
    pub fn authorize_calls(&self) -> usize {
        self.authorize_calls.load(Ordering::SeqCst)
    }

    pub fn check_calls(&self) -> usize {
        self.check_calls.load(Ordering::SeqCst)
    }

    pub fn app_states(&self) -> Vec<Option<Value>> {
        self.app_states.lock().unwrap().clone()
    }

    pub fn logouts(&self) -> Vec<String> {
        self.logouts.lock().unwrap().clone()
    }

    pub fn push_callback(&self, result: Result<AuthResult, ProviderError>) {
        self.callbacks.lock().unwrap().push_back(result);
    }

    pub fn push_check(&self, result: Result<AuthResult, ProviderError>) {
        self.checks.lock().unwrap().push_back(result);
    }

    /// Hold every subsequent session check until the returned gate is notified.
    pub fn gate_checks(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.gate.lock().unwrap() = Some(gate.clone());
        gate
    }
}

#[async_trait]
impl IdentityProvider for ScriptedProvider {
    fn authorize(&self, app_state: Option<&Value>) {
        self.authorize_calls.fetch_add(1, Ordering::SeqCst);
        self.app_states.lock().unwrap().push(app_state.cloned());
    }

    async fn parse_callback(&self) -> Result<AuthResult, ProviderError> {
        self.callbacks
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(ProviderError::new(ProviderError::INVALID_HASH, "no callback")))
    }

    async fn check_session(&self, _options: &CheckSessionOptions) -> Result<AuthResult, ProviderError> {
        self.check_calls.fetch_add(1, Ordering::SeqCst);

        let gate = self.gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }

        self.checks
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(login_required()))
    }

    fn logout(&self, return_to: &str) {
        self.logouts.lock().unwrap().push(return_to.to_string());
    }
}

pub struct Fixture {
    pub controller: AuthController,
    pub provider: Arc<ScriptedProvider>,
    pub store: Arc<InMemoryFlagStore>,
    pub clock: ManualClock,
    pub location: Arc<StaticLocation>,
}

impl Fixture {
    /// Mark a session as previously established, as after a reload.
    pub fn remember_previous_session(&self) {
        self.store.set_flag("loggedIn", true).unwrap();
    }
}

pub fn init_logging() {
    authwire_observability::init_with(
        &LogConfig::default()
            .with_format(LogFormat::Plain)
            .with_filter("authwire_session=debug"),
    );
}

pub fn fixture() -> Fixture {
    init_logging();

    let provider = Arc::new(ScriptedProvider::default());
    let store = Arc::new(InMemoryFlagStore::new());
    let clock = ManualClock::new(t0());
    let location = Arc::new(StaticLocation::new("/"));

    let controller = AuthController::builder(config(), provider.clone(), store.clone())
        .clock(Arc::new(clock.clone()))
        .location(location.clone())
        .build();

    Fixture {
        controller,
        provider,
        store,
        clock,
        location,
    }
}

pub async fn wait_for_status(controller: &AuthController, status: AuthStatus) {
    for _ in 0..100 {
        if controller.status() == status {
            return;
        }
        tokio::task::yield_now().await;
    }
    panic!("status never became {status}");
}

pub async fn settle() {
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
}
