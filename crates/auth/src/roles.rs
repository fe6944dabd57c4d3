use std::borrow::Cow;

use serde::{Deserialize, Serialize};

/// Role name as carried by the cached account record.
///
/// Roles are opaque strings; only [`Role::ADMIN`] has built-in meaning
/// (it grants every permission).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Role(Cow<'static, str>);

impl Role {
    /// Grants every permission.
    pub const ADMIN: Role = Role(Cow::Borrowed("admin"));

    /// Elevated role required by the `edit-things` rule.
    pub const SUPER_ROLE: Role = Role(Cow::Borrowed("super-role"));

    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_admin(&self) -> bool {
        self.as_str() == Self::ADMIN.as_str()
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Role {
    fn from(value: &str) -> Self {
        Self::new(value.to_owned())
    }
}
