//! Configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! - `HOST` - Bind address (default: 0.0.0.0)
//! - `PORT` - Listen port (default: 8083)
//! - `DOCUMENT_STORE` - `memory` or `nats` (default: memory)
//! - `NATS_URL` - NATS server URL, required when `DOCUMENT_STORE=nats`
//! - `NATS_BUCKET` - Key-value bucket holding every document (default: storefront)
//! - `STORE_WRITE_POLICY` - `cas` or `lww` (default: cas)
//! - `STORE_ECHO_TIMEOUT_MS` - How long a write waits to see itself (default: 2000)
//! - `CATALOG_TAX_FILE` - JSON object of product id to tax percent

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::store::{StoreOptions, WritePolicy};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentBackend {
    Memory,
    Nats { url: String, bucket: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub host: IpAddr,
    pub port: u16,
    pub backend: DocumentBackend,
    pub store: StoreOptions,
    pub catalog_tax_file: Option<PathBuf>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from any key lookup; `from_env` uses the process environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let host = parse_or(&get, "HOST", IpAddr::V4(Ipv4Addr::UNSPECIFIED))?;
        let port = parse_or(&get, "PORT", 8083u16)?;

        let backend = match get("DOCUMENT_STORE").as_deref().unwrap_or("memory") {
            "memory" => DocumentBackend::Memory,
            "nats" => DocumentBackend::Nats {
                url: get("NATS_URL").ok_or_else(|| ConfigError::MissingEnvVar("NATS_URL".into()))?,
                bucket: get("NATS_BUCKET").unwrap_or_else(|| "storefront".into()),
            },
            other => return Err(ConfigError::InvalidEnvVar("DOCUMENT_STORE".into(), format!("unknown backend {other:?}"))),
        };

        let write_policy = match get("STORE_WRITE_POLICY").as_deref().unwrap_or("cas") {
            "cas" => WritePolicy::CompareAndSwap,
            "lww" => WritePolicy::LastWriteWins,
            other => {
                return Err(ConfigError::InvalidEnvVar("STORE_WRITE_POLICY".into(), format!("expected cas or lww, got {other:?}")))
            }
        };
        let echo_timeout = Duration::from_millis(parse_or(&get, "STORE_ECHO_TIMEOUT_MS", 2000u64)?);

        Ok(Self {
            host,
            port,
            backend,
            store: StoreOptions { write_policy, echo_timeout },
            catalog_tax_file: get("CATALOG_TAX_FILE").map(PathBuf::from),
        })
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

fn parse_or<T>(get: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match get(key) {
        Some(raw) => raw.parse().map_err(|e: T::Err| ConfigError::InvalidEnvVar(key.to_string(), e.to_string())),
        None => Ok(default),
    }
}
