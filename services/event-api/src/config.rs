use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{bail, Context, Result};

use crate::db::DbConfig;

/// Where events, resources and grants are read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    /// In-process stores, optionally seeded from a JSON file.
    Memory,
    Postgres,
}

impl FromStr for StoreBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(StoreBackend::Memory),
            "postgres" => Ok(StoreBackend::Postgres),
            other => bail!("unknown store backend '{other}' (expected 'memory' or 'postgres')"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub listen_addr: SocketAddr,
    pub log_level: String,
    pub dev_mode: bool,
    pub store: StoreBackend,
    pub seed_file: Option<PathBuf>,
    /// Whether the provisioner in front of the node registry can list nodes.
    pub node_listing: bool,
    pub authz_timeout: Duration,
    pub database: DbConfig,
}

fn env_flag(name: &str, default: bool) -> bool {
    std::env::var(name)
        .map(|v| v == "1" || v.to_lowercase() == "true")
        .unwrap_or(default)
}

/// Parses a millisecond count, keeping its full `u64` range.
fn parse_authz_timeout(raw: &str) -> Result<Duration> {
    let ms: u64 = raw
        .trim()
        .parse()
        .context("invalid EVAUTH_AUTHZ_TIMEOUT_MS")?;
    Ok(Duration::from_millis(ms))
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let listen_addr = std::env::var("EVAUTH_LISTEN_ADDR")
            .unwrap_or_else(|_| "127.0.0.1:8080".to_string())
            .parse()
            .context("invalid EVAUTH_LISTEN_ADDR")?;

        let log_level = std::env::var("EVAUTH_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let dev_mode = env_flag("EVAUTH_DEV", false);

        let store = std::env::var("EVAUTH_STORE")
            .unwrap_or_else(|_| "memory".to_string())
            .parse()?;

        let seed_file = std::env::var_os("EVAUTH_SEED_FILE").map(PathBuf::from);

        let node_listing = env_flag("EVAUTH_NODE_LISTING", true);

        let authz_timeout = parse_authz_timeout(
            &std::env::var("EVAUTH_AUTHZ_TIMEOUT_MS").unwrap_or_else(|_| "5000".to_string()),
        )?;

        let database = DbConfig::from_env();

        Ok(Self {
            listen_addr,
            log_level,
            dev_mode,
            store,
            seed_file,
            node_listing,
            authz_timeout,
            database,
        })
    }
}
