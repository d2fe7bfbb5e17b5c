// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! Environment variable names, defaults and the [`Config`] loaded from them
//! once at startup.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `5000` |
//! | `UPLOAD_DIR` | Root of the upload tree | `uploads` |
//! | `SECRET_KEY` | Secret signing the unlock cookie | random per start |
//! | `KDF_ITERATIONS` | PBKDF2 rounds for the PIN-derived key | `100000` |
//! | `PIN_HASH_ITERATIONS` | PBKDF2 rounds for stored PIN hashes | `600000` |
//! | `UNLOCK_TTL_SECS` | Lifetime of unlock tokens and cookie | `604800` (7 days) |
//! | `SESSION_TTL_SECS` | Idle timeout of browser sessions | `86400` |
//! | `SESSION_CAPACITY` | Max live browser sessions | `10000` |
//! | `MAX_UPLOAD_BYTES` | Request body limit for uploads | `536870912` (512 MiB) |
//! | `TRUSTED_PROXIES` | Peers whose `X-Forwarded-For` is honoured | `127.0.0.1,::1` |
//! | `TLS_CERT_PATH` / `TLS_KEY_PATH` | PEM files; both set enables HTTPS | unset |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::num::NonZeroU32;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;
use tracing::warn;

use crate::crypto::kdf::{DEFAULT_KEK_ITERATIONS, DEFAULT_PIN_HASH_ITERATIONS};
use crate::crypto::{random_bytes, KdfParams};
use crate::storage::paths::DEFAULT_UPLOAD_ROOT;

pub const HOST_ENV: &str = "HOST";
pub const PORT_ENV: &str = "PORT";

/// Upload root. Created on startup if missing.
pub const UPLOAD_DIR_ENV: &str = "UPLOAD_DIR";

/// Cookie signing secret. Without it, unlock cookies do not survive a
/// restart (the token store does not either).
pub const SECRET_KEY_ENV: &str = "SECRET_KEY";

pub const KDF_ITERATIONS_ENV: &str = "KDF_ITERATIONS";
pub const PIN_HASH_ITERATIONS_ENV: &str = "PIN_HASH_ITERATIONS";
pub const UNLOCK_TTL_ENV: &str = "UNLOCK_TTL_SECS";
pub const SESSION_TTL_ENV: &str = "SESSION_TTL_SECS";
pub const SESSION_CAPACITY_ENV: &str = "SESSION_CAPACITY";
pub const MAX_UPLOAD_BYTES_ENV: &str = "MAX_UPLOAD_BYTES";

/// Comma-separated proxy addresses.
pub const TRUSTED_PROXIES_ENV: &str = "TRUSTED_PROXIES";

pub const TLS_CERT_PATH_ENV: &str = "TLS_CERT_PATH";
pub const TLS_KEY_PATH_ENV: &str = "TLS_KEY_PATH";

/// `json` for production, anything else for human-readable output.
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

pub const DEFAULT_PORT: u16 = 5000;
pub const DEFAULT_UNLOCK_TTL_SECS: u64 = 7 * 24 * 3600;
pub const DEFAULT_SESSION_TTL_SECS: u64 = 24 * 3600;
pub const DEFAULT_SESSION_CAPACITY: usize = 10_000;
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 512 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{var} has an invalid value: {value:?}")]
    Invalid { var: &'static str, value: String },

    #[error("{0} and {1} must be set together")]
    Incomplete(&'static str, &'static str),

    #[error("could not generate a cookie secret")]
    Secret,
}

/// PEM certificate and key for HTTPS.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsPaths {
    pub cert: PathBuf,
    pub key: PathBuf,
}

/// Server configuration.
#[derive(Clone)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub upload_dir: PathBuf,
    pub secret_key: Vec<u8>,
    pub kdf: KdfParams,
    pub unlock_ttl: Duration,
    pub session_ttl: Duration,
    pub session_capacity: usize,
    pub max_upload_bytes: usize,
    pub trusted_proxies: Vec<IpAddr>,
    pub tls: Option<TlsPaths>,
}

// Custom Debug implementation to prevent secret leakage
impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("bind_address", &self.bind_address)
            .field("upload_dir", &self.upload_dir)
            .field("secret_key", &"[REDACTED]")
            .field("kdf", &self.kdf)
            .field("unlock_ttl", &self.unlock_ttl)
            .field("session_ttl", &self.session_ttl)
            .field("session_capacity", &self.session_capacity)
            .field("max_upload_bytes", &self.max_upload_bytes)
            .field("trusted_proxies", &self.trusted_proxies)
            .field("tls", &self.tls)
            .finish()
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let host: IpAddr = parse_or(&var, HOST_ENV, IpAddr::V4(Ipv4Addr::UNSPECIFIED))?;
        let port: u16 = parse_or(&var, PORT_ENV, DEFAULT_PORT)?;

        let upload_dir = var(UPLOAD_DIR_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_UPLOAD_ROOT));

        let secret_key = match var(SECRET_KEY_ENV) {
            Some(secret) => secret.into_bytes(),
            None => {
                warn!("{SECRET_KEY_ENV} not set; unlock cookies will not survive a restart");
                random_bytes::<32>()
                    .map_err(|_| ConfigError::Secret)?
                    .to_vec()
            }
        };

        let kdf = KdfParams {
            kek_iterations: parse_or(
                &var,
                KDF_ITERATIONS_ENV,
                NonZeroU32::new(DEFAULT_KEK_ITERATIONS).unwrap_or(NonZeroU32::MIN),
            )?,
            pin_hash_iterations: parse_or(
                &var,
                PIN_HASH_ITERATIONS_ENV,
                NonZeroU32::new(DEFAULT_PIN_HASH_ITERATIONS).unwrap_or(NonZeroU32::MIN),
            )?,
        };

        let unlock_ttl = Duration::from_secs(parse_or(&var, UNLOCK_TTL_ENV, DEFAULT_UNLOCK_TTL_SECS)?);
        let session_ttl =
            Duration::from_secs(parse_or(&var, SESSION_TTL_ENV, DEFAULT_SESSION_TTL_SECS)?);
        let session_capacity = parse_or(&var, SESSION_CAPACITY_ENV, DEFAULT_SESSION_CAPACITY)?;
        let max_upload_bytes = parse_or(&var, MAX_UPLOAD_BYTES_ENV, DEFAULT_MAX_UPLOAD_BYTES)?;

        let trusted_proxies = match var(TRUSTED_PROXIES_ENV) {
            None => vec![
                IpAddr::V4(Ipv4Addr::LOCALHOST),
                IpAddr::V6(Ipv6Addr::LOCALHOST),
            ],
            Some(list) => list
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(|s| {
                    s.parse::<IpAddr>().map_err(|_| ConfigError::Invalid {
                        var: TRUSTED_PROXIES_ENV,
                        value: s.to_string(),
                    })
                })
                .collect::<Result<_, _>>()?,
        };

        let tls = match (var(TLS_CERT_PATH_ENV), var(TLS_KEY_PATH_ENV)) {
            (Some(cert), Some(key)) => Some(TlsPaths {
                cert: cert.into(),
                key: key.into(),
            }),
            (None, None) => None,
            _ => return Err(ConfigError::Incomplete(TLS_CERT_PATH_ENV, TLS_KEY_PATH_ENV)),
        };

        Ok(Config {
            bind_address: SocketAddr::new(host, port),
            upload_dir,
            secret_key,
            kdf,
            unlock_ttl,
            session_ttl,
            session_capacity,
            max_upload_bytes,
            trusted_proxies,
            tls,
        })
    }

    /// Config rooted at `upload_dir` with cheap KDF settings.
    #[cfg(test)]
    pub fn for_tests(upload_dir: impl Into<PathBuf>) -> Self {
        Self {
            bind_address: SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 0),
            upload_dir: upload_dir.into(),
            secret_key: b"test-secret-key".to_vec(),
            kdf: KdfParams::fast(),
            unlock_ttl: Duration::from_secs(DEFAULT_UNLOCK_TTL_SECS),
            session_ttl: Duration::from_secs(DEFAULT_SESSION_TTL_SECS),
            session_capacity: 128,
            max_upload_bytes: 16 * 1024 * 1024,
            trusted_proxies: vec![IpAddr::V4(Ipv4Addr::LOCALHOST)],
            tls: None,
        }
    }
}

fn parse_or<T: std::str::FromStr>(
    var: &impl Fn(&str) -> Option<String>,
    name: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match var(name) {
        None => Ok(default),
        Some(value) => value
            .parse()
            .map_err(|_| ConfigError::Invalid { var: name, value }),
    }
}
