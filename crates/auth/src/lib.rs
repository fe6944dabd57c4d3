//! `authwire-auth` — identity and authorization types for the session layer.
//!
//! This crate is intentionally decoupled from the identity provider, storage
//! and the async runtime: everything here is pure data and pure policy.

pub mod account;
pub mod authorize;
pub mod claims;
pub mod permissions;
pub mod roles;

pub use account::{AccountRole, ProfileSyncPlan, ProfileUpsert, UserAccount, plan_profile_sync};
pub use authorize::{Decision, PermissionRule, RoleAuthorizationEvaluator};
pub use claims::IdTokenClaims;
pub use permissions::Permission;
pub use roles::Role;
