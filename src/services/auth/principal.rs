//! Authenticated identity derived from verified claims.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::services::auth::claims::{Claims, Scopes};

pub const USER_ID_CLAIM: &str = "sub";
pub const ROLES_CLAIM: &str = "roles";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown role: {0}")]
pub struct UnknownRole(pub String);

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "user" => Ok(Self::User),
            "admin" => Ok(Self::Admin),
            _ => Err(UnknownRole(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PrincipalError {
    #[error("missing claim: {0}")]
    MissingClaim(String),
    #[error("invalid claim: {0}")]
    InvalidClaim(String),
    #[error(transparent)]
    UnknownRole(#[from] UnknownRole),
}

/// Who is calling, and with which permissions.
///
/// Built only from a fully verified claim set; there is no partially
/// populated principal.
#[derive(Debug, Clone)]
pub struct Principal {
    user_id: String,
    role: Role,
    claims: Claims,
}

impl Principal {
    /// Derive the principal from `<namespace>/sub` and `<namespace>/roles`.
    ///
    /// The roles claim may be a single string or an array; the first entry
    /// is the effective role.
    pub fn from_claims(claims: Claims, namespace: &str) -> Result<Self, PrincipalError> {
        let user_id = claims
            .namespaced(namespace, USER_ID_CLAIM)
            .ok_or_else(|| PrincipalError::MissingClaim(claim_name(namespace, USER_ID_CLAIM)))?
            .as_str()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| PrincipalError::InvalidClaim(claim_name(namespace, USER_ID_CLAIM)))?
            .to_string();

        let roles = claims
            .namespaced(namespace, ROLES_CLAIM)
            .ok_or_else(|| PrincipalError::MissingClaim(claim_name(namespace, ROLES_CLAIM)))?;

        let first = match roles {
            serde_json::Value::String(role) => Some(role.as_str()),
            serde_json::Value::Array(items) => items.first().and_then(|v| v.as_str()),
            _ => None,
        }
        .ok_or_else(|| PrincipalError::InvalidClaim(claim_name(namespace, ROLES_CLAIM)))?;

        let role = first.parse::<Role>()?;

        Ok(Self {
            user_id,
            role,
            claims,
        })
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn scopes(&self) -> &Scopes {
        self.claims.scopes()
    }

    pub fn claims(&self) -> &Claims {
        &self.claims
    }
}

fn claim_name(namespace: &str, name: &str) -> String {
    format!("{}/{}", namespace.trim_end_matches('/'), name)
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use serde_json::json;

    use super::*;
    use crate::services::auth::claims::Audience;

    const NS: &str = "https://orbit.example";

    fn claims_with(custom: serde_json::Value) -> Claims {
        let custom = match custom {
            serde_json::Value::Object(map) => map,
            _ => serde_json::Map::new(),
        };
        Claims::new(
            "auth0|abc".into(),
            "https://tenant.example.com/".into(),
            Audience::One("api".into()),
            Utc::now(),
            Scopes::parse("read:user"),
            custom,
        )
    }

    #[test]
    fn role_parses_case_insensitively() {
        assert_eq!("Admin".parse::<Role>(), Ok(Role::Admin));
        assert_eq!(" user ".parse::<Role>(), Ok(Role::User));
        assert!("owner".parse::<Role>().is_err());
    }

    #[test]
    fn principal_from_namespaced_claims() {
        let claims = claims_with(json!({
            "https://orbit.example/sub": "5f1c",
            "https://orbit.example/roles": ["admin", "user"],
        }));

        let principal = Principal::from_claims(claims, NS).unwrap();

        assert_eq!(principal.user_id(), "5f1c");
        assert_eq!(principal.role(), Role::Admin);
        assert!(principal.scopes().contains("read:user"));
    }

    #[test]
    fn principal_accepts_single_role_string() {
        let claims = claims_with(json!({
            "https://orbit.example/sub": "5f1c",
            "https://orbit.example/roles": "user",
        }));

        assert_eq!(Principal::from_claims(claims, NS).unwrap().role(), Role::User);
    }

    #[test]
    fn principal_requires_user_id() {
        let claims = claims_with(json!({ "https://orbit.example/roles": ["user"] }));

        assert_eq!(
            Principal::from_claims(claims, NS).unwrap_err(),
            PrincipalError::MissingClaim("https://orbit.example/sub".into())
        );
    }

    #[test]
    fn principal_rejects_empty_or_unknown_roles() {
        let claims = claims_with(json!({
            "https://orbit.example/sub": "5f1c",
            "https://orbit.example/roles": [],
        }));
        assert!(matches!(
            Principal::from_claims(claims, NS),
            Err(PrincipalError::InvalidClaim(_))
        ));

        let claims = claims_with(json!({
            "https://orbit.example/sub": "5f1c",
            "https://orbit.example/roles": ["superuser"],
        }));
        assert!(matches!(
            Principal::from_claims(claims, NS),
            Err(PrincipalError::UnknownRole(_))
        ));
    }
}
