/// Factory: build `AuthService` from application `Config`.
use std::sync::Arc;

use anyhow::Context;

use crate::config::AuthConfig;
use crate::services::auth::{
    AuthService,
    jwks::{HttpJwksFetcher, JwksFetcher, KeyCachePolicy, KeyResolver},
    permissions::PermissionTable,
    verifier::{TokenVerifier, VerifierSettings},
};

pub async fn build_auth_service(config: &AuthConfig) -> anyhow::Result<Arc<AuthService>> {
    let fetcher = HttpJwksFetcher::new(config.jwks_uri.clone(), config.jwks_fetch_timeout)
        .context("failed to build key set http client")?;

    let keys = Arc::new(build_key_resolver(config, Arc::new(fetcher)));
    keys.warm_up().await;

    let permissions = load_permissions(config)?;
    tracing::info!(rules = permissions.len(), "permission table loaded");

    Ok(Arc::new(assemble(config, keys, permissions)))
}

pub fn build_key_resolver(config: &AuthConfig, fetcher: Arc<dyn JwksFetcher>) -> KeyResolver {
    KeyResolver::new(
        fetcher,
        config.algorithm,
        KeyCachePolicy {
            ttl: config.jwks_cache_ttl,
            min_refresh_interval: config.jwks_min_refresh_interval,
        },
    )
}

/// Wire an `AuthService` around an existing key resolver.
pub fn assemble(
    config: &AuthConfig,
    keys: Arc<KeyResolver>,
    permissions: PermissionTable,
) -> AuthService {
    let verifier = TokenVerifier::new(
        keys,
        VerifierSettings {
            issuer: config.issuer.clone(),
            audience: config.audience.clone(),
            algorithm: config.algorithm,
            leeway_seconds: config.leeway_seconds,
        },
    );

    AuthService::new(verifier, config.claim_namespace.clone(), permissions)
}

fn load_permissions(config: &AuthConfig) -> anyhow::Result<PermissionTable> {
    let Some(path) = &config.permissions_file else {
        return Ok(PermissionTable::builtin());
    };

    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read permissions file {}", path.display()))?;

    PermissionTable::from_json(&raw)
        .with_context(|| format!("failed to load permissions file {}", path.display()))
}
