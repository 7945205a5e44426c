//! Decoded access token claims.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::warn;

/// `aud` can be either a string or an array of strings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum Audience {
    One(String),
    Many(Vec<String>),
}

impl Audience {
    pub fn contains(&self, expected: &str) -> bool {
        match self {
            Self::One(aud) => aud == expected,
            Self::Many(auds) => auds.iter().any(|aud| aud == expected),
        }
    }
}

/// Granted scopes, de-duplicated and ordered.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Scopes(BTreeSet<String>);

impl Scopes {
    /// Parse a space-delimited scope string.
    pub fn parse(raw: &str) -> Self {
        Self(raw.split_whitespace().map(str::to_string).collect())
    }

    /// Read the `scope` claim. Anything other than a string or an array of
    /// strings yields no scopes.
    pub fn from_claim(value: Option<&serde_json::Value>) -> Self {
        match value {
            None | Some(serde_json::Value::Null) => Self::default(),
            Some(serde_json::Value::String(raw)) => Self::parse(raw),
            Some(serde_json::Value::Array(items)) => Self(
                items
                    .iter()
                    .filter_map(|v| v.as_str())
                    .flat_map(str::split_whitespace)
                    .map(str::to_string)
                    .collect(),
            ),
            Some(other) => {
                warn!(kind = json_kind(other), "ignoring malformed scope claim");
                Self::default()
            }
        }
    }

    pub fn contains(&self, scope: &str) -> bool {
        self.0.contains(scope)
    }

    /// Required scopes that are not granted, in order.
    pub fn missing<'a>(&self, required: impl IntoIterator<Item = &'a String>) -> Vec<String> {
        required
            .into_iter()
            .filter(|scope| !self.0.contains(*scope))
            .cloned()
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "bool",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

/// Claims as they appear on the wire. Presence is checked by the verifier so
/// that each missing claim maps to the right failure kind.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct RawClaims {
    #[serde(default)]
    pub sub: Option<String>,
    #[serde(default)]
    pub iss: Option<String>,
    #[serde(default)]
    pub aud: Option<Audience>,
    #[serde(default)]
    pub exp: Option<i64>,
    #[serde(default)]
    pub nbf: Option<i64>,
    #[serde(default)]
    pub scope: Option<serde_json::Value>,

    #[serde(flatten)]
    pub custom: serde_json::Map<String, serde_json::Value>,
}

/// Verified claim set for one request. Immutable once built.
#[derive(Debug, Clone)]
pub struct Claims {
    subject: String,
    issuer: String,
    audience: Audience,
    expiry: DateTime<Utc>,
    scopes: Scopes,
    custom: serde_json::Map<String, serde_json::Value>,
}

impl Claims {
    pub(crate) fn new(
        subject: String,
        issuer: String,
        audience: Audience,
        expiry: DateTime<Utc>,
        scopes: Scopes,
        custom: serde_json::Map<String, serde_json::Value>,
    ) -> Self {
        Self {
            subject,
            issuer,
            audience,
            expiry,
            scopes,
            custom,
        }
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    pub fn audience(&self) -> &Audience {
        &self.audience
    }

    pub fn expiry(&self) -> DateTime<Utc> {
        self.expiry
    }

    pub fn scopes(&self) -> &Scopes {
        &self.scopes
    }

    /// Look up `<namespace>/<name>`. A trailing `/` on the namespace is ignored.
    pub fn namespaced(&self, namespace: &str, name: &str) -> Option<&serde_json::Value> {
        let key = format!("{}/{}", namespace.trim_end_matches('/'), name);
        self.custom.get(&key)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn scopes_parse_space_delimited() {
        let scopes = Scopes::parse("read:users  read:inventory read:users");

        assert!(scopes.contains("read:users"));
        assert!(scopes.contains("read:inventory"));
        assert_eq!(scopes.iter().count(), 2);
    }

    #[test]
    fn scopes_accept_string_array() {
        let value = json!(["read:users", "write:inventory"]);
        let scopes = Scopes::from_claim(Some(&value));

        assert!(scopes.contains("write:inventory"));
        assert!(!scopes.contains("read:inventory"));
    }

    #[test]
    fn malformed_scope_claim_grants_nothing() {
        let value = json!({"read:users": true});
        assert!(Scopes::from_claim(Some(&value)).is_empty());

        let value = json!(42);
        assert!(Scopes::from_claim(Some(&value)).is_empty());

        assert!(Scopes::from_claim(None).is_empty());
    }

    #[test]
    fn missing_lists_ungranted_scopes() {
        let scopes = Scopes::parse("read:inventory");
        let required: BTreeSet<String> = ["read:inventory", "read:users"]
            .into_iter()
            .map(String::from)
            .collect();

        assert_eq!(scopes.missing(&required), vec!["read:users".to_string()]);
    }

    #[test]
    fn audience_matches_string_or_array() {
        assert!(Audience::One("api".into()).contains("api"));
        assert!(!Audience::One("api".into()).contains("other"));
        assert!(Audience::Many(vec!["userinfo".into(), "api".into()]).contains("api"));
    }

    #[test]
    fn raw_claims_keep_custom_claims() {
        let raw: RawClaims = serde_json::from_value(json!({
            "sub": "auth0|1",
            "iss": "https://tenant.example.com/",
            "aud": ["api", "userinfo"],
            "exp": 1_700_000_000,
            "scope": "read:users",
            "https://orbit.example/roles": ["admin"],
        }))
        .unwrap();

        assert_eq!(raw.aud, Some(Audience::Many(vec!["api".into(), "userinfo".into()])));
        assert!(raw.custom.contains_key("https://orbit.example/roles"));
        assert!(!raw.custom.contains_key("sub"));
    }

    #[test]
    fn namespaced_lookup_ignores_trailing_slash() {
        let mut custom = serde_json::Map::new();
        custom.insert("https://orbit.example/sub".into(), json!("user-1"));
        let claims = Claims::new(
            "auth0|1".into(),
            "iss".into(),
            Audience::One("api".into()),
            Utc::now(),
            Scopes::default(),
            custom,
        );

        assert_eq!(
            claims.namespaced("https://orbit.example/", "sub"),
            Some(&json!("user-1"))
        );
        assert_eq!(claims.namespaced("https://orbit.example", "roles"), None);
    }
}
