//! Signing key resolution against the identity provider's published key set.
//!
//! Keys are looked up by `kid`. A miss fetches the whole key set and replaces the
//! cached copy. Cached keys expire after the configured TTL so that provider key
//! rotation is picked up without a restart.

use std::{collections::HashMap, fmt, str::FromStr, sync::Arc, time::Duration};

use async_trait::async_trait;
use jsonwebtoken::{
    Algorithm, DecodingKey,
    jwk::{AlgorithmParameters, Jwk},
};
use serde::Deserialize;
use thiserror::Error;
use tokio::{
    sync::{Mutex, RwLock},
    time::Instant,
};
use tracing::{debug, info, warn};
use url::Url;

#[derive(Debug, Clone, Error)]
pub enum KeyError {
    #[error("signing key not found: {kid}")]
    KeyNotFound { kid: String },
    #[error("key set fetch failed: {0}")]
    Network(String),
    #[error("invalid key set document: {0}")]
    InvalidKeySet(String),
}

/// Raw key set document (`{"keys": [...]}`).
///
/// Entries stay untyped so that one unsupported entry does not poison the
/// whole set.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct JwksDocument {
    #[serde(default)]
    pub keys: Vec<serde_json::Value>,
}

/// A verification key taken from the provider's key set.
#[derive(Clone)]
pub struct SigningKey {
    key_id: String,
    decoding_key: DecodingKey,
}

impl SigningKey {
    pub fn key_id(&self) -> &str {
        &self.key_id
    }

    pub fn decoding_key(&self) -> &DecodingKey {
        &self.decoding_key
    }
}

impl fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Do not print key material
        f.debug_struct("SigningKey")
            .field("key_id", &self.key_id)
            .finish()
    }
}

/// Source of the provider key set.
#[async_trait]
pub trait JwksFetcher: Send + Sync {
    async fn fetch(&self) -> Result<JwksDocument, KeyError>;

    // Used for logging only.
    fn source(&self) -> &str;
}

/// Fetches the key set over HTTPS with a bounded request time.
#[derive(Debug, Clone)]
pub struct HttpJwksFetcher {
    client: reqwest::Client,
    uri: Url,
}

impl HttpJwksFetcher {
    pub fn new(uri: Url, timeout: Duration) -> Result<Self, KeyError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| KeyError::Network(e.to_string()))?;

        Ok(Self { client, uri })
    }
}

#[async_trait]
impl JwksFetcher for HttpJwksFetcher {
    async fn fetch(&self) -> Result<JwksDocument, KeyError> {
        let response = self
            .client
            .get(self.uri.clone())
            .send()
            .await
            .map_err(|e| KeyError::Network(e.to_string()))?
            .error_for_status()
            .map_err(|e| KeyError::Network(e.to_string()))?;

        response
            .json::<JwksDocument>()
            .await
            .map_err(|e| KeyError::InvalidKeySet(e.to_string()))
    }

    fn source(&self) -> &str {
        self.uri.as_str()
    }
}

/// Cache lifetime knobs.
#[derive(Debug, Clone, Copy)]
pub struct KeyCachePolicy {
    // How long a fetched key set is trusted.
    pub ttl: Duration,
    // Minimum gap between refetches caused by an unknown `kid`.
    pub min_refresh_interval: Duration,
}

impl Default for KeyCachePolicy {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(600),
            min_refresh_interval: Duration::from_secs(30),
        }
    }
}

#[derive(Default)]
struct KeyCache {
    keys: HashMap<String, Arc<SigningKey>>,
    // Last successful fetch; bounds how long `keys` are trusted.
    fetched_at: Option<Instant>,
    // Last fetch attempt, successful or not.
    attempted_at: Option<Instant>,
    last_error: Option<KeyError>,
}

impl KeyCache {
    fn is_fresh(&self, ttl: Duration) -> bool {
        self.fetched_at.is_some_and(|at| at.elapsed() < ttl)
    }

    fn fresh_key(&self, kid: &str, ttl: Duration) -> Option<Arc<SigningKey>> {
        if self.is_fresh(ttl) {
            self.keys.get(kid).cloned()
        } else {
            None
        }
    }

    /// A failed attempt holds off further fetches for `min_refresh_interval`,
    /// same as an unknown `kid` against a fresh set.
    fn may_refetch(&self, policy: &KeyCachePolicy) -> bool {
        match self.attempted_at {
            None => true,
            Some(at) if at.elapsed() >= policy.min_refresh_interval => true,
            Some(_) => self.last_error.is_none() && !self.is_fresh(policy.ttl),
        }
    }

    fn miss(&self, kid: &str) -> KeyError {
        match &self.last_error {
            Some(err) => err.clone(),
            None => KeyError::KeyNotFound {
                kid: kid.to_string(),
            },
        }
    }
}

/// Resolves `kid` -> [`SigningKey`], caching the provider key set.
///
/// Lookups take a shared read lock. Misses are serialized behind a refresh lock
/// so that concurrent requests for an unseen key trigger one fetch, not one
/// per request.
pub struct KeyResolver {
    fetcher: Arc<dyn JwksFetcher>,
    algorithm: Algorithm,
    policy: KeyCachePolicy,
    cache: RwLock<KeyCache>,
    refresh_lock: Mutex<()>,
}

impl fmt::Debug for KeyResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyResolver")
            .field("source", &self.fetcher.source())
            .field("algorithm", &self.algorithm)
            .field("policy", &self.policy)
            .finish()
    }
}

impl KeyResolver {
    pub fn new(fetcher: Arc<dyn JwksFetcher>, algorithm: Algorithm, policy: KeyCachePolicy) -> Self {
        Self {
            fetcher,
            algorithm,
            policy,
            cache: RwLock::new(KeyCache::default()),
            refresh_lock: Mutex::new(()),
        }
    }

    pub async fn get_signing_key(&self, kid: &str) -> Result<Arc<SigningKey>, KeyError> {
        if let Some(key) = self.cache.read().await.fresh_key(kid, self.policy.ttl) {
            return Ok(key);
        }

        let _refresh = self.refresh_lock.lock().await;

        // Another task may have refreshed while we were waiting for the lock.
        {
            let cache = self.cache.read().await;
            if let Some(key) = cache.fresh_key(kid, self.policy.ttl) {
                return Ok(key);
            }
            if !cache.may_refetch(&self.policy) {
                debug!(kid, "key lookup missed, refetch suppressed");
                return Err(cache.miss(kid));
            }
        }

        self.refresh_locked().await?;

        self.cache
            .read()
            .await
            .keys
            .get(kid)
            .cloned()
            .ok_or_else(|| KeyError::KeyNotFound {
                kid: kid.to_string(),
            })
    }

    /// Fetch the key set once at startup. Failure is logged; lookups retry later.
    pub async fn warm_up(&self) {
        let _refresh = self.refresh_lock.lock().await;
        if let Err(err) = self.refresh_locked().await {
            warn!(error = %err, source = self.fetcher.source(), "initial key set fetch failed");
        }
    }

    // Caller must hold `refresh_lock`.
    async fn refresh_locked(&self) -> Result<usize, KeyError> {
        let document = match self.fetcher.fetch().await {
            Ok(document) => document,
            Err(err) => {
                warn!(error = %err, source = self.fetcher.source(), "key set fetch failed");
                let mut cache = self.cache.write().await;
                cache.attempted_at = Some(Instant::now());
                cache.last_error = Some(err.clone());
                return Err(err);
            }
        };

        let keys = parse_key_set(&document, self.algorithm);
        let count = keys.len();
        let now = Instant::now();

        *self.cache.write().await = KeyCache {
            keys,
            fetched_at: Some(now),
            attempted_at: Some(now),
            last_error: None,
        };

        info!(keys = count, source = self.fetcher.source(), "signing keys refreshed");
        Ok(count)
    }
}

/// Keep only verification keys usable with `algorithm`.
///
/// Symmetric (`oct`) keys, encryption keys and keys declaring a different
/// algorithm are dropped.
pub fn parse_key_set(document: &JwksDocument, algorithm: Algorithm) -> HashMap<String, Arc<SigningKey>> {
    document
        .keys
        .iter()
        .filter_map(|entry| match signing_key_from_entry(entry, algorithm) {
            Ok(key) => Some((key.key_id.clone(), Arc::new(key))),
            Err(reason) => {
                debug!(kid = ?entry.get("kid"), reason, "skipping key set entry");
                None
            }
        })
        .collect()
}

fn signing_key_from_entry(
    entry: &serde_json::Value,
    algorithm: Algorithm,
) -> Result<SigningKey, &'static str> {
    if let Some(key_use) = entry.get("use").and_then(|v| v.as_str())
        && key_use != "sig"
    {
        return Err("not a signature key");
    }

    if let Some(alg) = entry.get("alg").and_then(|v| v.as_str()) {
        match Algorithm::from_str(alg) {
            Ok(declared) if declared == algorithm => {}
            _ => return Err("algorithm mismatch"),
        }
    }

    let jwk: Jwk = serde_json::from_value(entry.clone()).map_err(|_| "unsupported key entry")?;
    let key_id = jwk.common.key_id.clone().ok_or("missing kid")?;

    if !family_matches(&jwk.algorithm, algorithm) {
        return Err("key type does not match algorithm");
    }

    let decoding_key = DecodingKey::from_jwk(&jwk).map_err(|_| "invalid key parameters")?;

    Ok(SigningKey {
        key_id,
        decoding_key,
    })
}

fn family_matches(params: &AlgorithmParameters, algorithm: Algorithm) -> bool {
    use Algorithm::*;

    match params {
        AlgorithmParameters::RSA(_) => {
            matches!(algorithm, RS256 | RS384 | RS512 | PS256 | PS384 | PS512)
        }
        AlgorithmParameters::EllipticCurve(_) => matches!(algorithm, ES256 | ES384),
        AlgorithmParameters::OctetKeyPair(_) => matches!(algorithm, EdDSA),
        // Shared secrets (`oct`) are never accepted as verification material.
        _ => false,
    }
}
