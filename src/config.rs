/*
 * Responsibility
 * - 環境変数や設定の読み込み (PORT, CORS 許可、Auth/JWKS 設定など)
 * - 設定値のバリデーション (不足なら起動失敗)
 */
use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use jsonwebtoken::Algorithm;
use url::Url;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnv {
    Development,
    Production,
}

impl AppEnv {
    fn parse(value: Option<&str>) -> Self {
        match value
            .unwrap_or("development")
            .to_ascii_lowercase()
            .as_str()
        {
            "production" | "prod" => Self::Production,
            _ => Self::Development,
        }
    }

    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum ConfigError {
    Missing(&'static str),
    Invalid(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Missing(key) => write!(f, "missing configuration: {}", key),
            ConfigError::Invalid(key) => write!(f, "invalid configuration: {}", key),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Identity provider and key-set settings.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub issuer_domain: String,
    pub issuer: String,
    pub audience: String,
    pub claim_namespace: String,
    // Pinned; tokens declaring anything else are rejected.
    pub algorithm: Algorithm,
    pub leeway_seconds: u64,

    pub jwks_uri: Url,
    pub jwks_cache_ttl: Duration,
    pub jwks_min_refresh_interval: Duration,
    pub jwks_fetch_timeout: Duration,

    pub permissions_file: Option<PathBuf>,
}

/// Transport limits applied to every route.
#[derive(Debug, Clone, Copy)]
pub struct HttpConfig {
    pub request_timeout: Duration,
    pub body_limit_bytes: usize,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub addr: SocketAddr,

    pub app_env: AppEnv,
    pub cors_allowed_origins: Vec<String>,

    pub http: HttpConfig,
    pub auth: AuthConfig,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup (the process environment in production).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let port: u16 = parse_or(&lookup, "PORT", 3001)?;

        let addr: SocketAddr = SocketAddr::from_str(&format!("0.0.0.0:{}", port))
            .map_err(|_| ConfigError::Invalid("PORT"))?;

        let app_env = AppEnv::parse(lookup("APP_ENV").as_deref());

        let cors_allowed_origins = lookup("CORS_ALLOWED_ORIGINS")
            .unwrap_or_default()
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>();

        let http = HttpConfig {
            request_timeout: Duration::from_secs(parse_or(&lookup, "REQUEST_TIMEOUT_SECONDS", 30)?),
            body_limit_bytes: parse_or(&lookup, "REQUEST_BODY_LIMIT_BYTES", 1024 * 1024)?,
        };

        let auth = AuthConfig::from_lookup(&lookup)?;

        Ok(Self {
            addr,
            app_env,
            cors_allowed_origins,
            http,
            auth,
        })
    }
}

impl AuthConfig {
    fn from_lookup<F>(lookup: &F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let issuer_domain = required(lookup, "AUTH_ISSUER_DOMAIN")?
            .trim_start_matches("https://")
            .trim_end_matches('/')
            .to_string();
        if issuer_domain.is_empty() || issuer_domain.contains('/') {
            return Err(ConfigError::Invalid("AUTH_ISSUER_DOMAIN"));
        }

        let issuer = lookup("AUTH_ISSUER")
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| format!("https://{}/", issuer_domain));

        let audience = required(lookup, "AUTH_AUDIENCE")?;
        let claim_namespace = required(lookup, "AUTH_CLAIM_NAMESPACE")?;

        let algorithm = lookup("AUTH_SIGNATURE_ALGORITHM")
            .map(|s| Algorithm::from_str(s.trim()))
            .transpose()
            .map_err(|_| ConfigError::Invalid("AUTH_SIGNATURE_ALGORITHM"))?
            .unwrap_or(Algorithm::RS256);
        if matches!(algorithm, Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512) {
            // Shared-secret algorithms cannot be verified against a public key set.
            return Err(ConfigError::Invalid("AUTH_SIGNATURE_ALGORITHM"));
        }

        let leeway_seconds = parse_or(lookup, "ACCESS_TOKEN_LEEWAY_SECONDS", 0)?;

        let jwks_uri = match lookup("AUTH_JWKS_URI").filter(|s| !s.trim().is_empty()) {
            Some(uri) => Url::parse(uri.trim()).map_err(|_| ConfigError::Invalid("AUTH_JWKS_URI"))?,
            None => Url::parse(&format!("https://{}/.well-known/jwks.json", issuer_domain))
                .map_err(|_| ConfigError::Invalid("AUTH_ISSUER_DOMAIN"))?,
        };

        let jwks_cache_ttl = Duration::from_secs(parse_or(lookup, "JWKS_CACHE_TTL_SECONDS", 600)?);
        let jwks_min_refresh_interval =
            Duration::from_secs(parse_or(lookup, "JWKS_MIN_REFRESH_INTERVAL_SECONDS", 30)?);
        let jwks_fetch_timeout = Duration::from_secs(parse_or(lookup, "JWKS_FETCH_TIMEOUT_SECONDS", 3)?);
        if jwks_fetch_timeout.is_zero() {
            return Err(ConfigError::Invalid("JWKS_FETCH_TIMEOUT_SECONDS"));
        }

        let permissions_file = lookup("PERMISSIONS_FILE")
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from);

        Ok(Self {
            issuer_domain,
            issuer,
            audience,
            claim_namespace,
            algorithm,
            leeway_seconds,
            jwks_uri,
            jwks_cache_ttl,
            jwks_min_refresh_interval,
            jwks_fetch_timeout,
            permissions_file,
        })
    }
}

fn required<F>(lookup: &F, key: &'static str) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or(ConfigError::Missing(key))
}

fn parse_or<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(raw) if !raw.trim().is_empty() => {
            raw.trim().parse().map_err(|_| ConfigError::Invalid(key))
        }
        _ => Ok(default),
    }
}
