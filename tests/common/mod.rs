#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde_json::{Value, json};

use dashboard_api::config::Config;
use dashboard_api::services::auth::{
    AuthService,
    factory,
    jwks::{JwksDocument, JwksFetcher, KeyError, KeyResolver},
    permissions::PermissionTable,
};
use dashboard_api::services::operations::OperationRegistry;
use dashboard_api::state::AppState;

pub const DOMAIN: &str = "tenant.example.com";
pub const ISSUER: &str = "https://tenant.example.com/";
pub const AUDIENCE: &str = "https://api.dashboard.example.com";
pub const NAMESPACE: &str = "https://dashboard.example.com";
pub const KEY_A: &str = "key-a";

pub const SIGNING_KEY_A: &[u8] = include_bytes!("../fixtures/signing_key_a.pem");
pub const SIGNING_KEY_B: &[u8] = include_bytes!("../fixtures/signing_key_b.pem");
const JWKS: &str = include_str!("../fixtures/jwks.json");

/// Serves the fixture key set and counts fetches.
pub struct FixtureFetcher {
    document: JwksDocument,
    calls: AtomicUsize,
}

impl FixtureFetcher {
    pub fn new() -> Self {
        Self {
            document: serde_json::from_str(JWKS).expect("fixture jwks"),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl JwksFetcher for FixtureFetcher {
    async fn fetch(&self) -> Result<JwksDocument, KeyError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.document.clone())
    }

    fn source(&self) -> &str {
        "fixture"
    }
}

pub fn config() -> Config {
    config_with(&[])
}

pub fn config_with(overrides: &[(&str, &str)]) -> Config {
    let mut env: HashMap<String, String> = [
        ("AUTH_ISSUER_DOMAIN", DOMAIN),
        ("AUTH_AUDIENCE", AUDIENCE),
        ("AUTH_CLAIM_NAMESPACE", NAMESPACE),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect();
    for (k, v) in overrides {
        env.insert(k.to_string(), v.to_string());
    }

    Config::from_lookup(move |key| env.get(key).cloned()).expect("test config")
}

pub struct Harness {
    pub fetcher: Arc<FixtureFetcher>,
    pub auth: Arc<AuthService>,
    pub config: Config,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(config())
    }

    pub fn with_config(config: Config) -> Self {
        let fetcher = Arc::new(FixtureFetcher::new());
        let keys = Arc::new(factory::build_key_resolver(&config.auth, fetcher.clone()));
        let auth = Arc::new(factory::assemble(&config.auth, keys, PermissionTable::builtin()));

        Self {
            fetcher,
            auth,
            config,
        }
    }

    pub fn key_resolver(&self) -> KeyResolver {
        factory::build_key_resolver(&self.config.auth, self.fetcher.clone())
    }

    pub fn state(&self) -> AppState {
        AppState::new(self.auth.clone(), Arc::new(OperationRegistry::with_defaults()))
    }
}

/// Claims the identity provider would issue for `role` with `scope`.
pub fn claims(role: &str, scope: &str) -> Value {
    let now = Utc::now();
    json!({
        "iss": ISSUER,
        "aud": [AUDIENCE, "https://tenant.example.com/userinfo"],
        "sub": "auth0|abc123",
        "iat": now.timestamp(),
        "exp": (now + Duration::minutes(10)).timestamp(),
        "scope": scope,
        format!("{NAMESPACE}/sub"): "user-42",
        format!("{NAMESPACE}/roles"): [role],
    })
}

pub fn sign_with(claims: &Value, kid: &str, pem: &[u8]) -> String {
    let mut header = Header::new(Algorithm::RS256);
    header.kid = Some(kid.to_string());
    let key = EncodingKey::from_rsa_pem(pem).expect("fixture pem");
    jsonwebtoken::encode(&header, claims, &key).expect("sign")
}

pub fn sign(claims: &Value) -> String {
    sign_with(claims, KEY_A, SIGNING_KEY_A)
}

pub fn bearer(token: &str) -> String {
    format!("Bearer {token}")
}
