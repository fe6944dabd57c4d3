//! Role-based permission checks over the cached account's role names.
//!
//! - No IO
//! - No panics
//! - Pure function of (roles, permission, rule table)

use serde::Serialize;

use crate::{Permission, Role};

/// Static rule: `permission` is granted to holders of `required_role`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PermissionRule {
    pub permission: Permission,
    pub required_role: Role,
}

impl PermissionRule {
    pub fn new(permission: impl Into<Permission>, required_role: impl Into<Role>) -> Self {
        Self {
            permission: permission.into(),
            required_role: required_role.into(),
        }
    }
}

/// Outcome of a permission check, with the reason it was reached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Decision {
    /// The principal holds the `admin` role.
    GrantedByAdmin,
    /// A rule matched and the principal holds its role.
    GrantedByRule { role: Role },
    /// A rule matched but the principal lacks its role.
    MissingRole { role: Role },
    /// No rule exists for the permission.
    Unrecognized,
}

impl Decision {
    pub fn is_granted(&self) -> bool {
        matches!(self, Decision::GrantedByAdmin | Decision::GrantedByRule { .. })
    }
}

/// Derives permission decisions from role names.
///
/// `admin` short-circuits to granted; otherwise the first rule whose
/// permission matches decides; an unmatched permission is denied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleAuthorizationEvaluator {
    rules: Vec<PermissionRule>,
}

impl Default for RoleAuthorizationEvaluator {
    fn default() -> Self {
        Self {
            rules: vec![PermissionRule {
                permission: Permission::EDIT_THINGS,
                required_role: Role::SUPER_ROLE,
            }],
        }
    }
}

impl RoleAuthorizationEvaluator {
    /// Evaluator with the built-in rule table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Evaluator with no rules: only admins are granted anything.
    pub fn empty() -> Self {
        Self { rules: Vec::new() }
    }

    pub fn with_rule(mut self, rule: PermissionRule) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn rules(&self) -> &[PermissionRule] {
        &self.rules
    }

    pub fn can(&self, roles: &[Role], permission: &Permission) -> bool {
        self.decide(roles, permission).is_granted()
    }

    pub fn decide(&self, roles: &[Role], permission: &Permission) -> Decision {
        if roles.iter().any(Role::is_admin) {
            return Decision::GrantedByAdmin;
        }

        let Some(rule) = self.rules.iter().find(|r| &r.permission == permission) else {
            return Decision::Unrecognized;
        };

        if roles.contains(&rule.required_role) {
            Decision::GrantedByRule {
                role: rule.required_role.clone(),
            }
        } else {
            Decision::MissingRole {
                role: rule.required_role.clone(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn roles(names: &[&'static str]) -> Vec<Role> {
        names.iter().map(|n| Role::new(*n)).collect()
    }

    #[test]
    fn edit_things_requires_super_role() {
        let evaluator = RoleAuthorizationEvaluator::new();

        assert!(evaluator.can(&roles(&["super-role"]), &Permission::EDIT_THINGS));
        assert_eq!(
            evaluator.decide(&roles(&["user"]), &Permission::EDIT_THINGS),
            Decision::MissingRole {
                role: Role::SUPER_ROLE
            }
        );
    }

    #[test]
    fn no_roles_means_no_permissions() {
        let evaluator = RoleAuthorizationEvaluator::new();
        assert!(!evaluator.can(&[], &Permission::EDIT_THINGS));
        assert!(!evaluator.can(&[], &Permission::new("anything")));
    }

    #[test]
    fn custom_rules_extend_the_table() {
        let evaluator = RoleAuthorizationEvaluator::empty()
            .with_rule(PermissionRule::new("publish", "editor"));

        assert!(evaluator.can(&roles(&["editor"]), &Permission::new("publish")));
        assert!(!evaluator.can(&roles(&["super-role"]), &Permission::EDIT_THINGS));
    }

    #[test]
    fn decision_serializes_with_kind_tag() {
        let json = serde_json::to_value(Decision::GrantedByRule {
            role: Role::SUPER_ROLE,
        })
        .unwrap();
        assert_eq!(json["kind"], "granted_by_rule");
        assert_eq!(json["role"], "super-role");
    }

    proptest! {
        #[test]
        fn admin_is_granted_every_permission(permission in "[a-z\\-]{1,24}", others in proptest::collection::vec("[a-z]{1,8}", 0..4)) {
            let evaluator = RoleAuthorizationEvaluator::new();
            let mut held: Vec<Role> = others.into_iter().map(Role::new).collect();
            held.push(Role::ADMIN);
            prop_assert!(evaluator.can(&held, &Permission::new(permission)));
        }

        #[test]
        fn unprivileged_role_is_denied_unrecognized_permissions(permission in "[a-z]{1,12}-unknown") {
            let evaluator = RoleAuthorizationEvaluator::new();
            let held = roles(&["user"]);
            prop_assert!(!evaluator.can(&held, &Permission::new(permission)));
        }
    }
}
