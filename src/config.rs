// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! Configuration is read once from the environment at startup into an
//! immutable [`GatewayConfig`]. Any invalid value is fatal: the binary logs
//! the [`ConfigError`] and exits before binding a socket.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `8080` |
//! | `APP_ENV` | `development` or `production` (cookie scoping) | `development` |
//! | `COOKIE_DOMAIN` | Parent domain for cross-subdomain cookies | host-only |
//! | `SESSION_SECRET` | Session token signing key (>= 32 bytes) | Required |
//! | `CSRF_SECRET` | CSRF HMAC key (>= 32 bytes) | `SESSION_SECRET` |
//! | `SESSION_TTL_SECS` | Session lifetime | `86400` |
//! | `CHALLENGE_WINDOW_SECS` | Login challenge window | `300` |
//! | `APP_NAME` | Name shown in the challenge message | `Relational Crowdfund` |
//! | `WALLET_ALLOWLIST` | Comma-separated wallet addresses | disabled |
//! | `RPC_URL` | Chain JSON-RPC endpoint | Required |
//! | `CROWDFUND_CONTRACT_ADDRESS` | Crowdfunding contract | Required |
//! | `CHAIN_TIMEOUT_MS` | Bound on each contract read | `5000` |
//! | `RATE_LIMIT_<P>_MAX` / `RATE_LIMIT_<P>_WINDOW_SECS` | `P` in `AUTH`, `WALLET`, `API`, `RPC` | see [`RateLimitSettings`] |
//! | `TRUSTED_PROXY_COUNT` | Trusted `X-Forwarded-For` hops | `0` |
//! | `CORS_ALLOWED_ORIGINS` | Comma-separated origins | same-origin only |
//! | `DATA_DIR` | Directory for the metadata database | in-memory |
//! | `TLS_CERT_PATH` / `TLS_KEY_PATH` | PEM files enabling HTTPS | plain HTTP |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use url::Url;

use crate::auth::address::{is_zero_address, normalize_address, parse_address};
use crate::auth::session::{DEFAULT_SESSION_TTL, MAX_SESSION_TTL, MIN_SECRET_LEN};
use crate::blockchain::ChainSettings;
use crate::ratelimit::{PolicyLimits, RateLimitSettings};

pub const HOST_ENV: &str = "HOST";
pub const PORT_ENV: &str = "PORT";
pub const APP_ENV: &str = "APP_ENV";
pub const COOKIE_DOMAIN_ENV: &str = "COOKIE_DOMAIN";
pub const SESSION_SECRET_ENV: &str = "SESSION_SECRET";
pub const CSRF_SECRET_ENV: &str = "CSRF_SECRET";
pub const SESSION_TTL_ENV: &str = "SESSION_TTL_SECS";
pub const CHALLENGE_WINDOW_ENV: &str = "CHALLENGE_WINDOW_SECS";
pub const APP_NAME_ENV: &str = "APP_NAME";
pub const WALLET_ALLOWLIST_ENV: &str = "WALLET_ALLOWLIST";
pub const RPC_URL_ENV: &str = "RPC_URL";
pub const CONTRACT_ADDRESS_ENV: &str = "CROWDFUND_CONTRACT_ADDRESS";
pub const CHAIN_TIMEOUT_ENV: &str = "CHAIN_TIMEOUT_MS";
pub const TRUSTED_PROXY_COUNT_ENV: &str = "TRUSTED_PROXY_COUNT";
pub const CORS_ALLOWED_ORIGINS_ENV: &str = "CORS_ALLOWED_ORIGINS";
/// Directory holding the embedded metadata database. Unset keeps metadata
/// in memory (lost on restart).
pub const DATA_DIR_ENV: &str = "DATA_DIR";
pub const TLS_CERT_PATH_ENV: &str = "TLS_CERT_PATH";
pub const TLS_KEY_PATH_ENV: &str = "TLS_KEY_PATH";
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

const DEFAULT_APP_NAME: &str = "Relational Crowdfund";
const DEFAULT_CHALLENGE_WINDOW_SECS: u64 = 300;
const MAX_CHALLENGE_WINDOW_SECS: u64 = 24 * 60 * 60;
const DEFAULT_CHAIN_TIMEOUT_MS: u64 = 5_000;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingVar(&'static str),

    #[error("Invalid value for {0}: {1}")]
    InvalidValue(&'static str, String),
}

/// Deployment environment; selects cookie scoping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
}

impl FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(Environment::Development),
            "production" | "prod" => Ok(Environment::Production),
            other => Err(format!("expected `development` or `production`, got `{other}`")),
        }
    }
}

/// PEM files for HTTPS.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsPaths {
    pub cert: PathBuf,
    pub key: PathBuf,
}

#[derive(Clone)]
pub struct GatewayConfig {
    pub host: String,
    pub port: u16,
    pub environment: Environment,
    pub cookie_domain: Option<String>,
    pub session_secret: Vec<u8>,
    pub csrf_secret: Vec<u8>,
    pub session_ttl: Duration,
    pub challenge_window: Duration,
    pub app_name: String,
    /// Normalised addresses; `None` disables the allow-list.
    pub wallet_allowlist: Option<Vec<String>>,
    pub chain: ChainSettings,
    pub rate_limits: RateLimitSettings,
    pub trusted_proxy_count: usize,
    pub cors_allowed_origins: Vec<String>,
    pub data_dir: Option<PathBuf>,
    pub tls: Option<TlsPaths>,
}

impl std::fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("environment", &self.environment)
            .field("cookie_domain", &self.cookie_domain)
            .field("session_secret", &"[REDACTED]")
            .field("csrf_secret", &"[REDACTED]")
            .field("session_ttl", &self.session_ttl)
            .field("challenge_window", &self.challenge_window)
            .field("app_name", &self.app_name)
            .field("wallet_allowlist", &self.wallet_allowlist)
            .field("chain", &self.chain)
            .field("rate_limits", &self.rate_limits)
            .field("trusted_proxy_count", &self.trusted_proxy_count)
            .field("cors_allowed_origins", &self.cors_allowed_origins)
            .field("data_dir", &self.data_dir)
            .field("tls", &self.tls)
            .finish()
    }
}

impl GatewayConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let host = get(HOST_ENV).unwrap_or_else(|| "0.0.0.0".to_string());
        let port = parse_or(&get, PORT_ENV, 8080u16)?;

        let environment = match get(APP_ENV) {
            Some(raw) => raw
                .parse()
                .map_err(|e| ConfigError::InvalidValue(APP_ENV, e))?,
            None => Environment::Development,
        };

        let cookie_domain = get(COOKIE_DOMAIN_ENV);
        if let Some(domain) = &cookie_domain {
            let valid = domain
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-');
            if !valid {
                return Err(ConfigError::InvalidValue(
                    COOKIE_DOMAIN_ENV,
                    "may only contain letters, digits, dots and hyphens".to_string(),
                ));
            }
        }

        let session_secret = get(SESSION_SECRET_ENV)
            .ok_or(ConfigError::MissingVar(SESSION_SECRET_ENV))?
            .into_bytes();
        check_secret(SESSION_SECRET_ENV, &session_secret)?;

        let csrf_secret = match get(CSRF_SECRET_ENV) {
            Some(secret) => secret.into_bytes(),
            None => session_secret.clone(),
        };
        check_secret(CSRF_SECRET_ENV, &csrf_secret)?;

        let session_ttl = Duration::from_secs(parse_or(
            &get,
            SESSION_TTL_ENV,
            DEFAULT_SESSION_TTL.as_secs(),
        )?);
        if session_ttl.is_zero() {
            return Err(ConfigError::InvalidValue(
                SESSION_TTL_ENV,
                "must be greater than zero".to_string(),
            ));
        }
        if session_ttl > MAX_SESSION_TTL {
            return Err(ConfigError::InvalidValue(
                SESSION_TTL_ENV,
                format!("must be at most {} seconds", MAX_SESSION_TTL.as_secs()),
            ));
        }

        let challenge_window = Duration::from_secs(parse_or(
            &get,
            CHALLENGE_WINDOW_ENV,
            DEFAULT_CHALLENGE_WINDOW_SECS,
        )?);
        if challenge_window.is_zero() || challenge_window.as_secs() > MAX_CHALLENGE_WINDOW_SECS {
            return Err(ConfigError::InvalidValue(
                CHALLENGE_WINDOW_ENV,
                format!("must be between 1 and {MAX_CHALLENGE_WINDOW_SECS} seconds"),
            ));
        }

        let app_name = get(APP_NAME_ENV).unwrap_or_else(|| DEFAULT_APP_NAME.to_string());

        let wallet_allowlist = match get(WALLET_ALLOWLIST_ENV) {
            Some(raw) => Some(
                split_list(&raw)
                    .into_iter()
                    .map(|entry| {
                        normalize_address(&entry).ok_or_else(|| {
                            ConfigError::InvalidValue(
                                WALLET_ALLOWLIST_ENV,
                                format!("`{entry}` is not a wallet address"),
                            )
                        })
                    })
                    .collect::<Result<Vec<_>, _>>()?,
            ),
            None => None,
        };

        let chain = load_chain(&get)?;
        let rate_limits = load_rate_limits(&get)?;

        let trusted_proxy_count = parse_or(&get, TRUSTED_PROXY_COUNT_ENV, 0usize)?;
        let cors_allowed_origins = get(CORS_ALLOWED_ORIGINS_ENV)
            .map(|raw| split_list(&raw))
            .unwrap_or_default();

        let data_dir = get(DATA_DIR_ENV).map(PathBuf::from);

        let tls = match (get(TLS_CERT_PATH_ENV), get(TLS_KEY_PATH_ENV)) {
            (Some(cert), Some(key)) => Some(TlsPaths {
                cert: PathBuf::from(cert),
                key: PathBuf::from(key),
            }),
            (None, None) => None,
            (Some(_), None) => return Err(ConfigError::MissingVar(TLS_KEY_PATH_ENV)),
            (None, Some(_)) => return Err(ConfigError::MissingVar(TLS_CERT_PATH_ENV)),
        };

        Ok(Self {
            host,
            port,
            environment,
            cookie_domain,
            session_secret,
            csrf_secret,
            session_ttl,
            challenge_window,
            app_name,
            wallet_allowlist,
            chain,
            rate_limits,
            trusted_proxy_count,
            cors_allowed_origins,
            data_dir,
            tls,
        })
    }

    /// Socket address the server binds to.
    pub fn bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|_| ConfigError::InvalidValue(HOST_ENV, format!("`{}` is not an IP address", self.host)))?;
        Ok(SocketAddr::new(ip, self.port))
    }
}

fn load_chain<G>(get: &G) -> Result<ChainSettings, ConfigError>
where
    G: Fn(&str) -> Option<String>,
{
    let raw_url = get(RPC_URL_ENV).ok_or(ConfigError::MissingVar(RPC_URL_ENV))?;
    let rpc_url = Url::parse(&raw_url)
        .map_err(|e| ConfigError::InvalidValue(RPC_URL_ENV, e.to_string()))?;
    if !matches!(rpc_url.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidValue(
            RPC_URL_ENV,
            "scheme must be http or https".to_string(),
        ));
    }

    let raw_contract = get(CONTRACT_ADDRESS_ENV).ok_or(ConfigError::MissingVar(CONTRACT_ADDRESS_ENV))?;
    let contract_address = parse_address(&raw_contract)
        .filter(|address| !is_zero_address(address))
        .ok_or_else(|| {
            ConfigError::InvalidValue(
                CONTRACT_ADDRESS_ENV,
                "must be a non-zero 20-byte hex address".to_string(),
            )
        })?;

    let timeout_ms = parse_or(get, CHAIN_TIMEOUT_ENV, DEFAULT_CHAIN_TIMEOUT_MS)?;
    if timeout_ms == 0 {
        return Err(ConfigError::InvalidValue(
            CHAIN_TIMEOUT_ENV,
            "must be greater than zero".to_string(),
        ));
    }

    Ok(ChainSettings {
        rpc_url,
        contract_address,
        timeout: Duration::from_millis(timeout_ms),
    })
}

fn load_rate_limits<G>(get: &G) -> Result<RateLimitSettings, ConfigError>
where
    G: Fn(&str) -> Option<String>,
{
    let defaults = RateLimitSettings::default();
    let policy = |max_key: &'static str,
                  window_key: &'static str,
                  fallback: PolicyLimits|
     -> Result<PolicyLimits, ConfigError> {
        Ok(PolicyLimits {
            ceiling: parse_or(get, max_key, fallback.ceiling)?,
            window: Duration::from_secs(parse_or(get, window_key, fallback.window.as_secs())?),
        })
    };

    let settings = RateLimitSettings {
        auth: policy(
            "RATE_LIMIT_AUTH_MAX",
            "RATE_LIMIT_AUTH_WINDOW_SECS",
            defaults.auth,
        )?,
        wallet_mutation: policy(
            "RATE_LIMIT_WALLET_MAX",
            "RATE_LIMIT_WALLET_WINDOW_SECS",
            defaults.wallet_mutation,
        )?,
        general_api: policy(
            "RATE_LIMIT_API_MAX",
            "RATE_LIMIT_API_WINDOW_SECS",
            defaults.general_api,
        )?,
        rpc_proxy: policy(
            "RATE_LIMIT_RPC_MAX",
            "RATE_LIMIT_RPC_WINDOW_SECS",
            defaults.rpc_proxy,
        )?,
    };

    settings
        .validate()
        .map_err(|e| ConfigError::InvalidValue("RATE_LIMIT_*", e))?;

    Ok(settings)
}

fn check_secret(key: &'static str, secret: &[u8]) -> Result<(), ConfigError> {
    if secret.len() < MIN_SECRET_LEN {
        return Err(ConfigError::InvalidValue(
            key,
            format!("must be at least {MIN_SECRET_LEN} bytes"),
        ));
    }
    Ok(())
}

/// Parse an optional variable, falling back to `default` when unset.
fn parse_or<G, T>(get: &G, key: &'static str, default: T) -> Result<T, ConfigError>
where
    G: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match get(key) {
        Some(raw) => raw
            .parse()
            .map_err(|e: T::Err| ConfigError::InvalidValue(key, e.to_string())),
        None => Ok(default),
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

#[cfg(test)]
impl GatewayConfig {
    /// Development configuration with fixed secrets and a dummy chain.
    pub(crate) fn for_tests() -> Self {
        Self::from_lookup(|key| match key {
            SESSION_SECRET_ENV => Some("test-session-secret-test-session-secret".to_string()),
            RPC_URL_ENV => Some("http://127.0.0.1:1".to_string()),
            CONTRACT_ADDRESS_ENV => Some("0x5fbdb2315678afecb367f032d93f642f64180aa3".to_string()),
            CHAIN_TIMEOUT_ENV => Some("200".to_string()),
            _ => None,
        })
        .expect("test configuration is valid")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn base_env() -> HashMap<&'static str, String> {
        HashMap::from([
            (SESSION_SECRET_ENV, "s".repeat(32)),
            (RPC_URL_ENV, "https://rpc.example.org".to_string()),
            (
                CONTRACT_ADDRESS_ENV,
                "0x5FbDB2315678afecb367f032d93F642f64180aa3".to_string(),
            ),
        ])
    }

    fn load(env: &HashMap<&'static str, String>) -> Result<GatewayConfig, ConfigError> {
        GatewayConfig::from_lookup(|key| env.get(key).cloned())
    }

    #[test]
    fn minimal_environment_uses_defaults() {
        let config = load(&base_env()).unwrap();

        assert_eq!(config.port, 8080);
        assert_eq!(config.environment, Environment::Development);
        assert_eq!(config.session_ttl, Duration::from_secs(86_400));
        assert_eq!(config.csrf_secret, config.session_secret);
        assert_eq!(config.chain.timeout, Duration::from_millis(5_000));
        assert_eq!(config.rate_limits, RateLimitSettings::default());
        assert!(config.wallet_allowlist.is_none());
        assert!(config.tls.is_none());
    }

    #[test]
    fn bind_addr_accepts_ipv4_and_ipv6_hosts() {
        let mut config = load(&base_env()).unwrap();
        assert_eq!(config.bind_addr().unwrap().to_string(), "0.0.0.0:8080");

        config.host = "::1".to_string();
        assert_eq!(config.bind_addr().unwrap().to_string(), "[::1]:8080");

        config.host = "localhost".to_string();
        assert!(matches!(
            config.bind_addr(),
            Err(ConfigError::InvalidValue(HOST_ENV, _))
        ));
    }

    #[test]
    fn missing_secret_is_fatal() {
        let mut env = base_env();
        env.remove(SESSION_SECRET_ENV);
        assert!(matches!(
            load(&env),
            Err(ConfigError::MissingVar(SESSION_SECRET_ENV))
        ));
    }

    #[test]
    fn short_secrets_are_fatal() {
        let mut env = base_env();
        env.insert(SESSION_SECRET_ENV, "short".to_string());
        assert!(matches!(
            load(&env),
            Err(ConfigError::InvalidValue(SESSION_SECRET_ENV, _))
        ));

        let mut env = base_env();
        env.insert(CSRF_SECRET_ENV, "short".to_string());
        assert!(matches!(
            load(&env),
            Err(ConfigError::InvalidValue(CSRF_SECRET_ENV, _))
        ));
    }

    #[test]
    fn chain_settings_are_required() {
        let mut env = base_env();
        env.remove(RPC_URL_ENV);
        assert!(matches!(load(&env), Err(ConfigError::MissingVar(RPC_URL_ENV))));

        let mut env = base_env();
        env.remove(CONTRACT_ADDRESS_ENV);
        assert!(matches!(
            load(&env),
            Err(ConfigError::MissingVar(CONTRACT_ADDRESS_ENV))
        ));
    }

    #[test]
    fn invalid_chain_settings_are_rejected() {
        let mut env = base_env();
        env.insert(RPC_URL_ENV, "ws://rpc.example.org".to_string());
        assert!(load(&env).is_err());

        let mut env = base_env();
        env.insert(
            CONTRACT_ADDRESS_ENV,
            "0x0000000000000000000000000000000000000000".to_string(),
        );
        assert!(load(&env).is_err());

        let mut env = base_env();
        env.insert(CHAIN_TIMEOUT_ENV, "0".to_string());
        assert!(load(&env).is_err());
    }

    #[test]
    fn allowlist_is_normalised() {
        let mut env = base_env();
        env.insert(
            WALLET_ALLOWLIST_ENV,
            " 0x742D35CC6634C0532925A3B844BC9E7595F4AB12 , ".to_string(),
        );
        let config = load(&env).unwrap();
        assert_eq!(
            config.wallet_allowlist,
            Some(vec!["0x742d35cc6634c0532925a3b844bc9e7595f4ab12".to_string()])
        );

        env.insert(WALLET_ALLOWLIST_ENV, "0xnope".to_string());
        assert!(load(&env).is_err());
    }

    #[test]
    fn rate_limit_invariant_is_enforced() {
        let mut env = base_env();
        env.insert("RATE_LIMIT_WALLET_MAX", "500".to_string());
        env.insert("RATE_LIMIT_API_MAX", "100".to_string());
        assert!(matches!(
            load(&env),
            Err(ConfigError::InvalidValue("RATE_LIMIT_*", _))
        ));
    }

    #[test]
    fn out_of_range_lifetimes_are_fatal() {
        let mut env = base_env();
        env.insert(SESSION_TTL_ENV, u64::MAX.to_string());
        assert!(matches!(
            load(&env),
            Err(ConfigError::InvalidValue(SESSION_TTL_ENV, _))
        ));

        let mut env = base_env();
        env.insert(SESSION_TTL_ENV, MAX_SESSION_TTL.as_secs().to_string());
        assert_eq!(load(&env).unwrap().session_ttl, MAX_SESSION_TTL);

        let mut env = base_env();
        env.insert(CHALLENGE_WINDOW_ENV, u64::MAX.to_string());
        assert!(matches!(
            load(&env),
            Err(ConfigError::InvalidValue(CHALLENGE_WINDOW_ENV, _))
        ));
    }

    #[test]
    fn oversized_rate_limit_window_is_fatal() {
        let mut env = base_env();
        env.insert("RATE_LIMIT_API_WINDOW_SECS", u64::MAX.to_string());
        assert!(matches!(
            load(&env),
            Err(ConfigError::InvalidValue("RATE_LIMIT_*", _))
        ));
    }

    #[test]
    fn rate_limits_can_be_overridden() {
        let mut env = base_env();
        env.insert("RATE_LIMIT_AUTH_MAX", "3".to_string());
        env.insert("RATE_LIMIT_AUTH_WINDOW_SECS", "60".to_string());
        let config = load(&env).unwrap();
        assert_eq!(config.rate_limits.auth, PolicyLimits::new(3, 60));
    }

    #[test]
    fn tls_needs_both_paths() {
        let mut env = base_env();
        env.insert(TLS_CERT_PATH_ENV, "/etc/tls/cert.pem".to_string());
        assert!(matches!(
            load(&env),
            Err(ConfigError::MissingVar(TLS_KEY_PATH_ENV))
        ));

        env.insert(TLS_KEY_PATH_ENV, "/etc/tls/key.pem".to_string());
        assert!(load(&env).unwrap().tls.is_some());
    }

    #[test]
    fn production_environment_parses() {
        let mut env = base_env();
        env.insert(APP_ENV, "Production".to_string());
        env.insert(COOKIE_DOMAIN_ENV, ".example.org".to_string());
        let config = load(&env).unwrap();
        assert_eq!(config.environment, Environment::Production);
        assert_eq!(config.cookie_domain.as_deref(), Some(".example.org"));

        env.insert(APP_ENV, "staging".to_string());
        assert!(load(&env).is_err());
    }
}
