//! Session state machine.
//!
//! `AuthController` owns the [`SessionState`] and is the only thing that
//! mutates it. Every status commit happens under one lock and, before the
//! lock is released, bumps the transition counter, publishes the transition
//! and settles pending `get_token` waiters. Provider round-trips happen with
//! the lock released.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use serde_json::Value;
use tracing::{debug, info, warn};

use authwire_auth::{Permission, RoleAuthorizationEvaluator, UserAccount};

use crate::bus::{Subscription, Transition, TransitionBus};
use crate::clock::{Clock, SystemClock};
use crate::config::AuthConfig;
use crate::error::{AuthError, ProviderError, SessionResult};
use crate::location::{Location, StaticLocation};
use crate::provider::{AuthResult, CheckSessionOptions, IdentityProvider};
use crate::renewal::RenewalTimer;
use crate::state::{AuthStatus, SessionSnapshot, SessionState, TokenSet};
use crate::store::PersistentFlagStore;
use crate::waiters::{SharedRegistry, TokenOutcome, TokenWaiter, WaiterRegistry};

/// What the on-load hook did for a route.
#[derive(Debug, Clone, PartialEq)]
pub enum RouteBootstrap {
    /// The callback route; the callback handler takes over.
    Skipped,
    /// A previous session existed but is not live; a renewal ran.
    Renewed(TokenOutcome),
    /// No renewal was needed or possible; waiters were released.
    MarkedAttempted,
}

struct Inner {
    state: SessionState,
    seq: u64,
    renewal: RenewalTimer,
    disposed: bool,
}

struct Shared {
    config: AuthConfig,
    provider: Arc<dyn IdentityProvider>,
    store: Arc<dyn PersistentFlagStore>,
    location: Arc<dyn Location>,
    clock: Arc<dyn Clock>,
    evaluator: RoleAuthorizationEvaluator,
    inner: Mutex<Inner>,
    waiters: SharedRegistry,
    bus: TransitionBus,
}

/// Builder for [`AuthController`].
pub struct AuthControllerBuilder {
    config: AuthConfig,
    provider: Arc<dyn IdentityProvider>,
    store: Arc<dyn PersistentFlagStore>,
    location: Arc<dyn Location>,
    clock: Arc<dyn Clock>,
    evaluator: RoleAuthorizationEvaluator,
}

impl AuthControllerBuilder {
    pub fn location(mut self, location: Arc<dyn Location>) -> Self {
        self.location = location;
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn evaluator(mut self, evaluator: RoleAuthorizationEvaluator) -> Self {
        self.evaluator = evaluator;
        self
    }

    pub fn build(self) -> AuthController {
        AuthController {
            shared: Arc::new(Shared {
                config: self.config,
                provider: self.provider,
                store: self.store,
                location: self.location,
                clock: self.clock,
                evaluator: self.evaluator,
                inner: Mutex::new(Inner {
                    state: SessionState::new(),
                    seq: 0,
                    renewal: RenewalTimer::default(),
                    disposed: false,
                }),
                waiters: Arc::new(Mutex::new(WaiterRegistry::default())),
                bus: TransitionBus::new(),
            }),
        }
    }
}

/// Client-side authentication session manager.
///
/// Cheap to clone; clones share one session.
#[derive(Clone)]
pub struct AuthController {
    shared: Arc<Shared>,
}

impl core::fmt::Debug for AuthController {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AuthController")
            .field("domain", &self.shared.config.domain)
            .field("client_id", &self.shared.config.client_id)
            .finish_non_exhaustive()
    }
}

enum RenewStep {
    Done(Option<String>),
    Login,
    Check,
}

impl AuthController {
    pub fn builder(
        config: AuthConfig,
        provider: Arc<dyn IdentityProvider>,
        store: Arc<dyn PersistentFlagStore>,
    ) -> AuthControllerBuilder {
        AuthControllerBuilder {
            config,
            provider,
            store,
            location: Arc::new(StaticLocation::default()),
            clock: Arc::new(SystemClock),
            evaluator: RoleAuthorizationEvaluator::default(),
        }
    }

    pub fn config(&self) -> &AuthConfig {
        &self.shared.config
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.shared
            .inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Commit + notification
    // ─────────────────────────────────────────────────────────────────────

    fn commit_status(&self, inner: &mut Inner, status: AuthStatus) {
        let from = inner.state.set_status(status);
        self.after_commit(inner, from);
    }

    fn commit_error(&self, inner: &mut Inner, error: ProviderError) {
        let from = inner.state.set_error(error);
        self.after_commit(inner, from);
    }

    fn after_commit(&self, inner: &mut Inner, from: AuthStatus) {
        inner.seq += 1;
        let transition = Transition {
            seq: inner.seq,
            from,
            to: inner.state.status,
        };
        debug!(seq = transition.seq, from = %from, to = %transition.to, "auth status committed");

        self.shared.bus.publish(transition);

        if let Some(outcome) = settled_outcome(&inner.state) {
            let delivered = self
                .shared
                .waiters
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .resolve_all(&outcome);
            if delivered > 0 {
                debug!(delivered, status = %transition.to, "token waiters settled");
            }
        }
    }

    fn record_error(&self, error: ProviderError) {
        let mut inner = self.lock();
        self.commit_error(&mut inner, error);
    }

    // ─────────────────────────────────────────────────────────────────────
    // Derived predicates
    // ─────────────────────────────────────────────────────────────────────

    /// Durable flag: a session was established and not logged out.
    ///
    /// A store fault reads as `false`.
    pub fn has_authenticated(&self) -> bool {
        self.shared
            .store
            .get_flag(&self.shared.config.flag_key)
            .unwrap_or_else(|e| {
                warn!(error = %e, "failed to read session flag");
                false
            })
    }

    /// Durable flag set and live tokens held.
    pub fn is_authenticated(&self) -> bool {
        let now = self.shared.clock.now();
        let has_authenticated = self.has_authenticated();
        self.lock().state.is_authenticated(has_authenticated, now)
    }

    pub fn can(&self, permission: &Permission) -> bool {
        let roles = self.lock().state.roles();
        self.shared.evaluator.can(&roles, permission)
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let has_authenticated = self.has_authenticated();
        let inner = self.lock();
        SessionSnapshot {
            state: inner.state.clone(),
            has_authenticated,
            seq: inner.seq,
            taken_at: self.shared.clock.now(),
        }
    }

    pub fn status(&self) -> AuthStatus {
        self.lock().state.status
    }

    pub fn access_token(&self) -> Option<String> {
        self.lock().state.access_token.clone()
    }

    pub fn expiry(&self) -> Option<chrono::DateTime<chrono::Utc>> {
        self.lock().state.expiry
    }

    pub fn error(&self) -> Option<ProviderError> {
        self.lock().state.error.clone()
    }

    pub fn profile(&self) -> Option<authwire_auth::IdTokenClaims> {
        self.lock().state.profile.clone()
    }

    pub fn user(&self) -> Option<UserAccount> {
        self.lock().state.user.clone()
    }

    pub fn user_id(&self) -> i64 {
        self.lock().state.user_id()
    }

    pub fn auth_id(&self) -> String {
        self.lock().state.auth_id().to_string()
    }

    /// When the armed renewal fires, if one is armed.
    pub fn renewal_at(&self) -> Option<chrono::DateTime<chrono::Utc>> {
        self.lock().renewal.fires_at()
    }

    pub fn subscribe(&self) -> Subscription {
        self.shared.bus.subscribe()
    }

    pub fn pending_waiters(&self) -> usize {
        self.shared
            .waiters
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    // ─────────────────────────────────────────────────────────────────────
    // Transitions
    // ─────────────────────────────────────────────────────────────────────

    /// Persist the current path so the callback route can return to it.
    pub fn remember_return_to(&self) -> SessionResult<()> {
        let path = self.shared.location.pathname();
        self.shared
            .store
            .set_path(&self.shared.config.return_to_key, &path)?;
        debug!(path = %path, "remembered return-to path");
        Ok(())
    }

    /// Path remembered by the last login attempt.
    pub fn return_to(&self) -> SessionResult<Option<String>> {
        Ok(self.shared.store.get_path(&self.shared.config.return_to_key)?)
    }

    /// Start an interactive login. No-op while already authorizing.
    pub fn login(&self, app_state: Option<Value>) {
        {
            let mut inner = self.lock();
            if inner.state.status == AuthStatus::Authorizing {
                debug!("login already in progress");
                return;
            }
            if let Err(e) = self.remember_return_to() {
                warn!(error = %e, "failed to remember return-to path");
            }
            self.commit_status(&mut inner, AuthStatus::Authorizing);
        }

        info!("redirecting to identity provider for login");
        self.shared.provider.authorize(app_state.as_ref());
    }

    /// Forget the session locally and at the provider.
    pub fn logout(&self) {
        {
            let mut inner = self.lock();
            if let Err(e) = self.shared.store.remove_flag(&self.shared.config.flag_key) {
                warn!(error = %e, "failed to clear session flag");
            }
            inner.state.clear_auth();
            if inner.renewal.cancel() {
                debug!("cancelled pending token renewal");
            }
            inner.state.renewal_at = None;
            self.commit_status(&mut inner, AuthStatus::Logout);
        }

        info!("logged out");
        self.shared
            .provider
            .logout(&self.shared.config.logout_return_to);
    }

    /// Complete an interactive login on the callback route.
    pub async fn handle_authentication(&self) -> SessionResult<()> {
        match self.shared.provider.parse_callback().await {
            Ok(result) => self.local_login(result),
            Err(error) => {
                warn!(code = %error.code, "authentication callback failed");
                self.record_error(error.clone());
                Err(error.into())
            }
        }
    }

    /// Adopt a provider result as the current session.
    ///
    /// Claims that are already expired are recorded as an `expired_token`
    /// error instead.
    pub fn local_login(&self, result: AuthResult) -> SessionResult<()> {
        let now = self.shared.clock.now();
        let claims = result.id_token_payload;

        let Some(expiry) = claims.expires_at().filter(|expiry| *expiry > now) else {
            let error = ProviderError::new(
                ProviderError::EXPIRED_TOKEN,
                format!("identity token expired (exp={})", claims.exp),
            );
            warn!(sub = %claims.sub, exp = claims.exp, "rejecting expired identity token");
            self.record_error(error.clone());
            return Err(error.into());
        };

        if let Err(e) = self.shared.store.set_flag(&self.shared.config.flag_key, true) {
            warn!(error = %e, "failed to persist session flag");
        }

        let sub = claims.sub.clone();
        let mut inner = self.lock();
        inner.state.set_auth(TokenSet {
            id_token: result.id_token,
            access_token: result.access_token,
            expiry,
            profile: claims,
        });
        self.commit_status(&mut inner, AuthStatus::Authenticated);
        self.schedule_renewal_locked(&mut inner);
        drop(inner);

        info!(sub = %sub, expiry = %expiry, "session established");
        Ok(())
    }

    /// Obtain a valid access token, renewing silently when needed.
    ///
    /// Resolves `Ok(None)` when a check is already in flight (and this call
    /// is not `required`) or when an interactive login was started instead.
    pub async fn renew_tokens(&self, required: bool) -> SessionResult<Option<String>> {
        let step = {
            let has_authenticated = self.has_authenticated();
            let now = self.shared.clock.now();
            let mut inner = self.lock();

            if inner.disposed {
                return Err(AuthError::Disposed);
            }

            if inner.state.status == AuthStatus::Checking && !required {
                debug!("session check already in flight");
                RenewStep::Done(None)
            } else if inner.state.is_authenticated(has_authenticated, now) {
                RenewStep::Done(inner.state.access_token.clone())
            } else if !has_authenticated && required {
                RenewStep::Login
            } else {
                self.commit_status(&mut inner, AuthStatus::Checking);
                RenewStep::Check
            }
        };

        match step {
            RenewStep::Done(token) => Ok(token),
            RenewStep::Login => {
                self.login(None);
                Ok(None)
            }
            RenewStep::Check => self.check_session(required).await,
        }
    }

    async fn check_session(&self, required: bool) -> SessionResult<Option<String>> {
        debug!(required, "checking provider session");

        match self
            .shared
            .provider
            .check_session(&CheckSessionOptions::default())
            .await
        {
            Ok(result) => {
                self.local_login(result)?;
                Ok(self.access_token())
            }
            Err(error) => {
                warn!(code = %error.code, required, "silent session check failed");
                self.record_error(error.clone());
                if error.is_login_required() && required {
                    info!("provider session missing; starting interactive login");
                    self.login(None);
                }
                Err(error.into())
            }
        }
    }

    /// Remember where the user is, then renew with login as the fallback.
    pub async fn require_login(&self) -> SessionResult<Option<String>> {
        if let Err(e) = self.remember_return_to() {
            warn!(error = %e, "failed to remember return-to path");
        }
        self.renew_tokens(true).await
    }

    /// Mark that no renewal will happen, releasing waiters with no token.
    /// No-op once authenticated.
    pub fn renewal_attempted(&self) {
        let mut inner = self.lock();
        if inner.state.status == AuthStatus::Authenticated {
            return;
        }
        self.commit_status(&mut inner, AuthStatus::RenewalAttempted);
    }

    /// Cache the account record produced by profile sync.
    pub fn cache_user(&self, user: UserAccount) {
        debug!(user_id = ?user.id, "caching user account");
        self.lock().state.set_user(Some(user));
    }

    /// Arm the renewal timer for the current expiry.
    ///
    /// Returns `true` if a renewal was armed; nothing is armed when the
    /// expiry is not in the future.
    pub fn schedule_renewal(&self) -> bool {
        let mut inner = self.lock();
        self.schedule_renewal_locked(&mut inner)
    }

    fn schedule_renewal_locked(&self, inner: &mut Inner) -> bool {
        if inner.disposed {
            return false;
        }
        let Some(expiry) = inner.state.expiry else {
            return false;
        };
        let Ok(delay) = (expiry - self.shared.clock.now()).to_std() else {
            return false;
        };
        if delay.is_zero() {
            return false;
        }

        let generation = inner.renewal.next_generation();
        let weak: Weak<Shared> = Arc::downgrade(&self.shared);
        let armed = inner.renewal.arm(expiry, delay, async move {
            let Some(shared) = weak.upgrade() else {
                return;
            };
            let controller = AuthController { shared };
            {
                let mut inner = controller.lock();
                if inner.renewal.fired(generation) {
                    inner.state.renewal_at = None;
                }
            }

            debug!("renewal timer fired");
            loop {
                match controller.renew_tokens(false).await {
                    // Clock still reads the tokens as live: wait out the rest.
                    Ok(Some(_)) if controller.renewal_at().is_none() => {
                        if controller.schedule_renewal() {
                            debug!("renewal fired before expiry; re-armed");
                            break;
                        }
                    }
                    Ok(_) => break,
                    Err(e) => {
                        warn!(error = %e, "scheduled token renewal failed");
                        break;
                    }
                }
            }
        });

        inner.state.renewal_at = armed.then_some(expiry);
        if armed {
            debug!(fires_at = %expiry, "token renewal scheduled");
        }
        armed
    }

    /// Consumer-facing token accessor.
    ///
    /// Settles immediately when the status already settles waiters;
    /// otherwise registers a waiter resolved by the next such transition.
    pub fn get_token(&self) -> TokenWaiter {
        let inner = self.lock();
        if inner.disposed {
            return TokenWaiter::ready(Err(AuthError::Disposed));
        }
        match settled_outcome(&inner.state) {
            Some(outcome) => TokenWaiter::ready(outcome),
            None => TokenWaiter::register(&self.shared.waiters),
        }
    }

    /// On-load hook for the route named `route_name`.
    pub async fn on_route_load(&self, route_name: &str) -> RouteBootstrap {
        if route_name == self.shared.config.callback_route {
            return RouteBootstrap::Skipped;
        }

        if self.has_authenticated() && !self.is_authenticated() {
            RouteBootstrap::Renewed(self.renew_tokens(false).await)
        } else {
            self.renewal_attempted();
            RouteBootstrap::MarkedAttempted
        }
    }

    /// Shut the session down: disarm renewal and reject pending waiters.
    pub fn dispose(&self) {
        let mut inner = self.lock();
        if inner.disposed {
            return;
        }
        inner.disposed = true;
        inner.renewal.cancel();
        inner.state.renewal_at = None;

        let rejected = self
            .shared
            .waiters
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .resolve_all(&Err(AuthError::Disposed));
        info!(rejected, "session controller disposed");
    }
}

/// Outcome for waiters under `state`, or `None` if they must keep waiting.
fn settled_outcome(state: &SessionState) -> Option<TokenOutcome> {
    match state.status {
        AuthStatus::Authenticated => Some(Ok(state.access_token.clone())),
        AuthStatus::RenewalAttempted => Some(Ok(None)),
        AuthStatus::Error => state
            .error
            .clone()
            .map(|error| Err(AuthError::Provider(error))),
        _ => None,
    }
}
