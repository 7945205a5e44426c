//! Per-operation authorization rules.
//!
//! Every operation must be listed. Operations without a rule are denied for
//! every caller, admins included.

use std::collections::{BTreeSet, HashMap};

use serde::Deserialize;
use thiserror::Error;

use crate::services::auth::principal::{Principal, Role};

/// What a caller needs to run an operation.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Requirement {
    /// Caller's role is one of the set.
    RoleIn(BTreeSet<Role>),
    /// Caller holds every scope in the set.
    ScopeIn(BTreeSet<String>),
}

impl Requirement {
    pub fn role_in(roles: impl IntoIterator<Item = Role>) -> Self {
        Self::RoleIn(roles.into_iter().collect())
    }

    pub fn scope_in<S: Into<String>>(scopes: impl IntoIterator<Item = S>) -> Self {
        Self::ScopeIn(scopes.into_iter().map(Into::into).collect())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionRule {
    pub operation: String,
    pub requirement: Requirement,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DenyReason {
    /// No rule is configured for the operation.
    NoRule,
    /// The operation needs a principal and the request is anonymous.
    Unauthenticated,
    MissingRole { required: BTreeSet<Role>, actual: Role },
    MissingScope { missing: Vec<String> },
}

impl DenyReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NoRule => "no-rule",
            Self::Unauthenticated => "unauthenticated",
            Self::MissingRole { .. } => "missing-role",
            Self::MissingScope { .. } => "missing-scope",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny(DenyReason),
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allow)
    }
}

#[derive(Debug, Error)]
pub enum PermissionTableError {
    #[error("invalid permission table: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("rule for '{0}' has an empty requirement set")]
    EmptyRequirement(String),
}

/// Static operation -> requirement table, loaded once at startup.
#[derive(Debug, Clone, Default)]
pub struct PermissionTable {
    rules: HashMap<String, Requirement>,
}

impl PermissionTable {
    pub fn new(rules: impl IntoIterator<Item = PermissionRule>) -> Result<Self, PermissionTableError> {
        let mut table = Self::default();
        for rule in rules {
            let empty = match &rule.requirement {
                Requirement::RoleIn(roles) => roles.is_empty(),
                Requirement::ScopeIn(scopes) => scopes.is_empty(),
            };
            if empty {
                return Err(PermissionTableError::EmptyRequirement(rule.operation));
            }
            table.rules.insert(rule.operation, rule.requirement);
        }
        Ok(table)
    }

    /// Parse `{ "<operation>": {"role_in": [...]} | {"scope_in": [...]} }`.
    pub fn from_json(raw: &str) -> Result<Self, PermissionTableError> {
        let rules: HashMap<String, Requirement> = serde_json::from_str(raw)?;
        Self::new(
            rules
                .into_iter()
                .map(|(operation, requirement)| PermissionRule {
                    operation,
                    requirement,
                }),
        )
    }

    /// Rules for the dashboard's query and mutation surface.
    pub fn builtin() -> Self {
        let rules = [
            ("dashboardData", Requirement::role_in([Role::User, Role::Admin])),
            ("inventoryItems", Requirement::scope_in(["read:inventory"])),
            ("users", Requirement::scope_in(["read:users"])),
            ("user", Requirement::scope_in(["read:user"])),
            ("userBio", Requirement::scope_in(["edit:user"])),
            ("addInventoryItem", Requirement::scope_in(["write:inventory"])),
            ("deleteInventoryItem", Requirement::scope_in(["delete:inventory"])),
            ("updateUserRole", Requirement::scope_in(["edit:user"])),
            ("updateUserBio", Requirement::scope_in(["edit:user"])),
        ];

        Self {
            rules: rules
                .into_iter()
                .map(|(operation, requirement)| (operation.to_string(), requirement))
                .collect(),
        }
    }

    pub fn rule(&self, operation: &str) -> Option<&Requirement> {
        self.rules.get(operation)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn authorize(&self, principal: Option<&Principal>, operation: &str) -> Decision {
        let Some(requirement) = self.rules.get(operation) else {
            return Decision::Deny(DenyReason::NoRule);
        };
        let Some(principal) = principal else {
            return Decision::Deny(DenyReason::Unauthenticated);
        };

        match requirement {
            Requirement::RoleIn(roles) => {
                if roles.contains(&principal.role()) {
                    Decision::Allow
                } else {
                    Decision::Deny(DenyReason::MissingRole {
                        required: roles.clone(),
                        actual: principal.role(),
                    })
                }
            }
            Requirement::ScopeIn(scopes) => {
                let missing = principal.scopes().missing(scopes);
                if missing.is_empty() {
                    Decision::Allow
                } else {
                    Decision::Deny(DenyReason::MissingScope { missing })
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use serde_json::json;

    use super::*;
    use crate::services::auth::claims::{Audience, Claims, Scopes};

    fn principal(role: &str, scope: &str) -> Principal {
        let mut custom = serde_json::Map::new();
        custom.insert("https://orbit.example/sub".into(), json!("user-1"));
        custom.insert("https://orbit.example/roles".into(), json!([role]));
        let claims = Claims::new(
            "auth0|1".into(),
            "https://tenant.example.com/".into(),
            Audience::One("api".into()),
            Utc::now(),
            Scopes::parse(scope),
            custom,
        );
        Principal::from_claims(claims, "https://orbit.example").unwrap()
    }

    fn table() -> PermissionTable {
        PermissionTable::new([
            PermissionRule {
                operation: "users".into(),
                requirement: Requirement::scope_in(["read:users"]),
            },
            PermissionRule {
                operation: "updateUserRole".into(),
                requirement: Requirement::role_in([Role::Admin]),
            },
            PermissionRule {
                operation: "bulkExport".into(),
                requirement: Requirement::scope_in(["read:users", "read:inventory"]),
            },
        ])
        .unwrap()
    }

    #[test]
    fn unmapped_operation_is_denied_for_everyone() {
        let table = table();
        let admin = principal("admin", "read:users read:inventory write:inventory");

        assert_eq!(
            table.authorize(Some(&admin), "dropEverything"),
            Decision::Deny(DenyReason::NoRule)
        );
        assert_eq!(
            table.authorize(None, "dropEverything"),
            Decision::Deny(DenyReason::NoRule)
        );
    }

    #[test]
    fn role_rule() {
        let table = table();

        let user = principal("user", "");
        assert!(matches!(
            table.authorize(Some(&user), "updateUserRole"),
            Decision::Deny(DenyReason::MissingRole { actual: Role::User, .. })
        ));

        let admin = principal("admin", "");
        assert_eq!(table.authorize(Some(&admin), "updateUserRole"), Decision::Allow);
    }

    #[test]
    fn scope_rule() {
        let table = table();

        let reader = principal("user", "read:users read:inventory");
        assert_eq!(table.authorize(Some(&reader), "users"), Decision::Allow);

        let inventory_only = principal("user", "read:inventory");
        assert_eq!(
            table.authorize(Some(&inventory_only), "users"),
            Decision::Deny(DenyReason::MissingScope {
                missing: vec!["read:users".into()]
            })
        );
    }

    #[test]
    fn scope_rule_requires_every_scope() {
        let table = table();

        let both = principal("user", "read:inventory read:users");
        assert!(table.authorize(Some(&both), "bulkExport").is_allowed());

        let one = principal("admin", "read:users");
        assert_eq!(
            table.authorize(Some(&one), "bulkExport"),
            Decision::Deny(DenyReason::MissingScope {
                missing: vec!["read:inventory".into()]
            })
        );
    }

    #[test]
    fn anonymous_is_denied_for_mapped_operations() {
        let table = table();

        assert_eq!(
            table.authorize(None, "users"),
            Decision::Deny(DenyReason::Unauthenticated)
        );
        assert_eq!(
            table.authorize(None, "updateUserRole"),
            Decision::Deny(DenyReason::Unauthenticated)
        );
    }

    #[test]
    fn builtin_table_gates_dashboard_on_any_role() {
        let table = PermissionTable::builtin();

        assert!(table.authorize(Some(&principal("user", "")), "dashboardData").is_allowed());
        assert!(table.authorize(Some(&principal("admin", "")), "dashboardData").is_allowed());
        assert!(!table.authorize(None, "dashboardData").is_allowed());
        assert!(!table.authorize(Some(&principal("admin", "")), "login").is_allowed());
    }

    #[test]
    fn builtin_table_scope_gates() {
        let table = PermissionTable::builtin();
        let editor = principal("user", "edit:user read:inventory");

        assert!(table.authorize(Some(&editor), "updateUserBio").is_allowed());
        assert!(table.authorize(Some(&editor), "inventoryItems").is_allowed());
        assert!(!table.authorize(Some(&editor), "deleteInventoryItem").is_allowed());
        assert!(!table.authorize(Some(&editor), "users").is_allowed());
    }

    #[test]
    fn from_json_parses_both_rule_kinds() {
        let table = PermissionTable::from_json(
            r#"{
                "users": {"scope_in": ["read:users"]},
                "updateUserRole": {"role_in": ["admin"]}
            }"#,
        )
        .unwrap();

        assert_eq!(table.len(), 2);
        assert_eq!(
            table.rule("updateUserRole"),
            Some(&Requirement::role_in([Role::Admin]))
        );
    }

    #[test]
    fn from_json_rejects_empty_and_unknown() {
        assert!(matches!(
            PermissionTable::from_json(r#"{"users": {"scope_in": []}}"#),
            Err(PermissionTableError::EmptyRequirement(op)) if op == "users"
        ));
        assert!(matches!(
            PermissionTable::from_json(r#"{"users": {"role_in": ["owner"]}}"#),
            Err(PermissionTableError::Parse(_))
        ));
        assert!(matches!(
            PermissionTable::from_json(r#"{"users": {"anyone": true}}"#),
            Err(PermissionTableError::Parse(_))
        ));
    }
}
