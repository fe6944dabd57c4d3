use std::borrow::Cow;

use serde::{Deserialize, Serialize};

/// Permission identifier checked by [`crate::RoleAuthorizationEvaluator`].
///
/// Permissions are opaque strings (e.g. `"edit-things"`). A permission with
/// no rule in the evaluator's table is denied to everyone except admins.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Permission(Cow<'static, str>);

impl Permission {
    pub const EDIT_THINGS: Permission = Permission(Cow::Borrowed("edit-things"));

    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for Permission {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Permission {
    fn from(value: &str) -> Self {
        Self::new(value.to_owned())
    }
}
