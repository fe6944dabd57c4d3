//! Cached account record and the profile-sync contract.
//!
//! The profile-sync collaborator looks the authenticated subject up in the
//! application database, creates or refreshes the record from the token
//! claims, and feeds the result back to the session as a [`UserAccount`].
//! This module only models that contract; it performs no IO.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{IdTokenClaims, Role};

/// Role entry as returned by the account lookup (`roles { name }`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountRole {
    pub name: Role,
}

/// Application-side account record cached on the session.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct UserAccount {
    /// Database id; `None` for a record that was never persisted.
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub auth_id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub nickname: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub picture: Option<String>,
    #[serde(default)]
    pub roles: Vec<AccountRole>,
}

impl UserAccount {
    pub fn role_names(&self) -> Vec<Role> {
        self.roles.iter().map(|r| r.name.clone()).collect()
    }

    pub fn with_roles<I, R>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = R>,
        R: Into<Role>,
    {
        self.roles = roles
            .into_iter()
            .map(|name| AccountRole { name: name.into() })
            .collect();
        self
    }
}

/// Fields written to the account store on every successful login.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileUpsert {
    pub name: Option<String>,
    pub nickname: Option<String>,
    pub email: Option<String>,
    pub picture: Option<String>,
    pub auth_id: String,
    /// `YYYY-MM-DD HH:MM:SS`, UTC.
    pub last_login: String,
}

impl ProfileUpsert {
    pub fn from_claims(claims: &IdTokenClaims, now: DateTime<Utc>) -> Self {
        Self {
            name: claims.name.clone(),
            nickname: claims.nickname.clone(),
            email: claims.email.clone(),
            picture: claims.picture.clone(),
            auth_id: claims.sub.clone(),
            last_login: now.format("%Y-%m-%d %H:%M:%S").to_string(),
        }
    }
}

/// What the profile-sync collaborator should do after its lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProfileSyncPlan {
    /// Nothing to do: no subject yet, or an account is already cached.
    Skip,
    /// No persisted account exists for the subject.
    Create,
    /// Refresh the found account, then cache it.
    Update(UserAccount),
}

/// Decide the sync action for a lookup result.
pub fn plan_profile_sync(
    auth_id: &str,
    cached: Option<&UserAccount>,
    found: Option<UserAccount>,
) -> ProfileSyncPlan {
    if auth_id.is_empty() || cached.is_some() {
        return ProfileSyncPlan::Skip;
    }

    match found {
        Some(account) if account.id.is_some() => ProfileSyncPlan::Update(account),
        _ => ProfileSyncPlan::Create,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn persisted(id: i64) -> UserAccount {
        UserAccount {
            id: Some(id),
            auth_id: Some("auth0|abc".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn upsert_copies_profile_claims() {
        let claims = IdTokenClaims::new("auth0|abc", 0)
            .with_name("Alice Smith")
            .with_nickname("alice")
            .with_email("alice@example.com");
        let now = Utc.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap();

        let upsert = ProfileUpsert::from_claims(&claims, now);

        assert_eq!(upsert.auth_id, "auth0|abc");
        assert_eq!(upsert.nickname.as_deref(), Some("alice"));
        assert_eq!(upsert.picture, None);
        assert_eq!(upsert.last_login, "2024-03-09 14:05:07");
    }

    #[test]
    fn sync_is_skipped_without_subject_or_with_cached_user() {
        assert_eq!(plan_profile_sync("", None, None), ProfileSyncPlan::Skip);
        assert_eq!(
            plan_profile_sync("auth0|abc", Some(&persisted(1)), Some(persisted(1))),
            ProfileSyncPlan::Skip
        );
    }

    #[test]
    fn missing_or_unpersisted_account_is_created() {
        assert_eq!(plan_profile_sync("auth0|abc", None, None), ProfileSyncPlan::Create);
        assert_eq!(
            plan_profile_sync("auth0|abc", None, Some(UserAccount::default())),
            ProfileSyncPlan::Create
        );
    }

    #[test]
    fn found_account_is_updated() {
        assert_eq!(
            plan_profile_sync("auth0|abc", None, Some(persisted(7))),
            ProfileSyncPlan::Update(persisted(7))
        );
    }

    #[test]
    fn account_deserializes_from_lookup_shape() {
        let json = serde_json::json!({
            "id": 42,
            "auth_id": "auth0|abc",
            "email": "alice@example.com",
            "roles": [{ "name": "admin" }, { "name": "super-role" }]
        });

        let account: UserAccount = serde_json::from_value(json).unwrap();
        assert_eq!(account.id, Some(42));
        assert_eq!(account.role_names(), vec![Role::ADMIN, Role::SUPER_ROLE]);
    }
}
