//! Session record, status enum and the predicates derived from them.
//!
//! Mutations here are the only way the record changes; they never notify
//! anyone. Committing a status (and notifying waiters and subscribers) is
//! the controller's job.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use authwire_auth::{IdTokenClaims, Permission, Role, RoleAuthorizationEvaluator, UserAccount};

use crate::error::ProviderError;

/// Session lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AuthStatus {
    #[default]
    Initialization,
    Authorizing,
    Checking,
    Authenticated,
    RenewalAttempted,
    Logout,
    Error,
}

impl AuthStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthStatus::Initialization => "initialization",
            AuthStatus::Authorizing => "authorizing",
            AuthStatus::Checking => "checking",
            AuthStatus::Authenticated => "authenticated",
            AuthStatus::RenewalAttempted => "renewalAttempted",
            AuthStatus::Logout => "logout",
            AuthStatus::Error => "error",
        }
    }

    /// Statuses that settle a pending `get_token` waiter.
    pub fn settles_waiters(&self) -> bool {
        matches!(
            self,
            AuthStatus::Authenticated | AuthStatus::Error | AuthStatus::RenewalAttempted
        )
    }
}

impl core::fmt::Display for AuthStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Token fields written together by a successful login.
#[derive(Debug, Clone, PartialEq)]
pub struct TokenSet {
    pub id_token: String,
    pub access_token: String,
    pub expiry: DateTime<Utc>,
    pub profile: IdTokenClaims,
}

/// Mutable session record.
///
/// # Invariants
/// - `status == Authenticated` implies all token fields are set and
///   `expiry` was in the future when the status was committed.
/// - `error` is `Some` exactly when `status == Error`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionState {
    pub id_token: Option<String>,
    pub access_token: Option<String>,
    pub expiry: Option<DateTime<Utc>>,
    /// Decoded identity-token claims; `None` when logged out.
    pub profile: Option<IdTokenClaims>,
    /// Account record cached by profile sync.
    pub user: Option<UserAccount>,
    pub status: AuthStatus,
    pub error: Option<ProviderError>,
    /// When the armed renewal timer fires, if one is armed.
    pub renewal_at: Option<DateTime<Utc>>,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear token fields. Never touches `status`.
    pub fn clear_auth(&mut self) {
        self.id_token = None;
        self.access_token = None;
        self.expiry = None;
        self.profile = None;
    }

    pub fn set_auth(&mut self, tokens: TokenSet) {
        self.id_token = Some(tokens.id_token);
        self.access_token = Some(tokens.access_token);
        self.expiry = Some(tokens.expiry);
        self.profile = Some(tokens.profile);
    }

    /// Set `status`, clearing any error unless the new status is `Error`.
    /// Returns the previous status.
    pub fn set_status(&mut self, status: AuthStatus) -> AuthStatus {
        let previous = std::mem::replace(&mut self.status, status);
        if status != AuthStatus::Error {
            self.error = None;
        }
        previous
    }

    /// Record a provider error and enter `Error`. Returns the previous status.
    pub fn set_error(&mut self, error: ProviderError) -> AuthStatus {
        self.error = Some(error);
        std::mem::replace(&mut self.status, AuthStatus::Error)
    }

    pub fn set_user(&mut self, user: Option<UserAccount>) {
        self.user = user;
    }

    /// All token fields present and `now` strictly before `expiry`.
    pub fn has_live_tokens(&self, now: DateTime<Utc>) -> bool {
        self.id_token.is_some()
            && self.access_token.is_some()
            && self.expiry.is_some_and(|expiry| now < expiry)
    }

    /// `has_authenticated` (durable flag) and live tokens.
    pub fn is_authenticated(&self, has_authenticated: bool, now: DateTime<Utc>) -> bool {
        has_authenticated && self.has_live_tokens(now)
    }

    /// Role names of the cached account, empty without one.
    pub fn roles(&self) -> Vec<Role> {
        self.user
            .as_ref()
            .map(UserAccount::role_names)
            .unwrap_or_default()
    }

    /// Cached account id, `0` when none is cached or it was never persisted.
    pub fn user_id(&self) -> i64 {
        self.user.as_ref().and_then(|u| u.id).unwrap_or(0)
    }

    /// Subject of the current claims, empty when logged out.
    pub fn auth_id(&self) -> &str {
        self.profile.as_ref().map_or("", |p| p.sub.as_str())
    }
}

/// Immutable view of the session at one point in the transition sequence.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSnapshot {
    pub state: SessionState,
    /// Durable flag as read when the snapshot was taken.
    pub has_authenticated: bool,
    /// Number of committed transitions before this snapshot.
    pub seq: u64,
    pub taken_at: DateTime<Utc>,
}

impl SessionSnapshot {
    pub fn status(&self) -> AuthStatus {
        self.state.status
    }

    pub fn is_authenticated(&self) -> bool {
        self.state.is_authenticated(self.has_authenticated, self.taken_at)
    }

    pub fn roles(&self) -> Vec<Role> {
        self.state.roles()
    }

    pub fn can(&self, evaluator: &RoleAuthorizationEvaluator, permission: &Permission) -> bool {
        evaluator.can(&self.roles(), permission)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeDelta, TimeZone};
    use proptest::prelude::*;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
    }

    fn tokens(expiry: DateTime<Utc>) -> TokenSet {
        TokenSet {
            id_token: "id".to_string(),
            access_token: "at".to_string(),
            expiry,
            profile: IdTokenClaims::new("auth0|abc", expiry.timestamp()),
        }
    }

    #[test]
    fn clearing_tokens_keeps_status() {
        let mut state = SessionState::new();
        state.set_auth(tokens(t0()));
        state.set_status(AuthStatus::Authenticated);

        state.clear_auth();

        assert_eq!(state.status, AuthStatus::Authenticated);
        assert!(state.id_token.is_none() && state.access_token.is_none() && state.expiry.is_none());
        assert_eq!(state.auth_id(), "");
    }

    #[test]
    fn non_error_status_clears_error() {
        let mut state = SessionState::new();
        let previous = state.set_error(ProviderError::new("login_required", "Login required"));
        assert_eq!(previous, AuthStatus::Initialization);
        assert_eq!(state.status, AuthStatus::Error);
        assert!(state.error.is_some());

        state.set_status(AuthStatus::Error);
        assert!(state.error.is_some());

        state.set_status(AuthStatus::Checking);
        assert!(state.error.is_none());
    }

    #[test]
    fn roles_and_user_id_come_from_cached_account() {
        let mut state = SessionState::new();
        assert!(state.roles().is_empty());
        assert_eq!(state.user_id(), 0);

        state.set_user(Some(
            UserAccount {
                id: Some(9),
                ..Default::default()
            }
            .with_roles(["admin"]),
        ));

        assert_eq!(state.roles(), vec![Role::ADMIN]);
        assert_eq!(state.user_id(), 9);
    }

    #[test]
    fn status_serializes_in_camel_case() {
        assert_eq!(
            serde_json::to_value(AuthStatus::RenewalAttempted).unwrap(),
            "renewalAttempted"
        );
        assert_eq!(AuthStatus::RenewalAttempted.to_string(), "renewalAttempted");
    }

    proptest! {
        #[test]
        fn is_authenticated_matches_its_definition(
            has_flag in any::<bool>(),
            has_id in any::<bool>(),
            has_access in any::<bool>(),
            expiry_offset in proptest::option::of(-10_000i64..10_000),
            now_offset in -10_000i64..10_000,
        ) {
            let state = SessionState {
                id_token: has_id.then(|| "id".to_string()),
                access_token: has_access.then(|| "at".to_string()),
                expiry: expiry_offset.map(|ms| t0() + TimeDelta::milliseconds(ms)),
                ..Default::default()
            };
            let now = t0() + TimeDelta::milliseconds(now_offset);

            let expected = has_flag
                && has_id
                && has_access
                && expiry_offset.is_some_and(|ms| now_offset < ms);

            prop_assert_eq!(state.is_authenticated(has_flag, now), expected);
        }
    }
}
