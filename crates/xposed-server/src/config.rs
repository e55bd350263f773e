//! Server configuration loaded from environment variables.
//!
//! All settings have sensible defaults so the server can start with zero
//! configuration for local development.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use xposed_shared::constants::{APP_NAME, DEFAULT_HTTP_PORT, MAX_PAGE_SIZE};

const DEFAULT_NOTIFY_TIMEOUT_SECS: u64 = 10;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Socket address for the HTTP (axum) API server.
    /// Env: `HTTP_ADDR`
    /// Default: `0.0.0.0:8080`
    pub http_addr: SocketAddr,

    /// SQLite database file.
    /// Env: `DATABASE_PATH`
    /// Default: `./xposed.db`
    pub database_path: PathBuf,

    /// Ed25519 public key of the identity provider (hex-encoded, 64 chars).
    /// Env: `IDENTITY_PUBKEY`
    /// Default: all-zeros, which rejects every token (development only).
    pub identity_pubkey: [u8; 32],

    /// Human-readable name for this server instance.
    /// Env: `INSTANCE_NAME`
    /// Default: `"xPosed"`
    pub instance_name: String,

    /// Upper bound for the `limit` query parameter.
    /// Env: `MAX_PAGE_SIZE`
    /// Default: `100`
    pub max_page_size: u32,

    /// Deadline for a notification the request has to wait on.
    /// Env: `NOTIFY_TIMEOUT` (seconds)
    /// Default: `10`
    pub notify_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_addr: ([0, 0, 0, 0], DEFAULT_HTTP_PORT).into(),
            database_path: PathBuf::from("./xposed.db"),
            identity_pubkey: [0u8; 32],
            instance_name: APP_NAME.to_string(),
            max_page_size: MAX_PAGE_SIZE,
            notify_timeout: Duration::from_secs(DEFAULT_NOTIFY_TIMEOUT_SECS),
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(addr) = get("HTTP_ADDR") {
            if let Ok(parsed) = addr.parse::<SocketAddr>() {
                config.http_addr = parsed;
            } else {
                tracing::warn!(value = %addr, "Invalid HTTP_ADDR, using default");
            }
        }

        if let Some(path) = get("DATABASE_PATH") {
            if !path.trim().is_empty() {
                config.database_path = PathBuf::from(path);
            }
        }

        if let Some(hex_key) = get("IDENTITY_PUBKEY") {
            match parse_hex_pubkey(&hex_key) {
                Ok(key) => config.identity_pubkey = key,
                Err(e) => {
                    tracing::warn!(
                        error = %e,
                        "Invalid IDENTITY_PUBKEY, using default (dev-only)"
                    );
                }
            }
        }

        if let Some(name) = get("INSTANCE_NAME") {
            config.instance_name = name;
        }

        if let Some(val) = get("MAX_PAGE_SIZE") {
            match val.parse::<u32>() {
                Ok(n) if n > 0 => config.max_page_size = n,
                _ => tracing::warn!(value = %val, "Invalid MAX_PAGE_SIZE, using default"),
            }
        }

        if let Some(val) = get("NOTIFY_TIMEOUT") {
            match val.parse::<u64>() {
                Ok(secs) if secs > 0 => config.notify_timeout = Duration::from_secs(secs),
                _ => tracing::warn!(value = %val, "Invalid NOTIFY_TIMEOUT, using default"),
            }
        }

        // RUST_LOG is handled directly by tracing-subscriber's EnvFilter,
        // so we do not store it here.

        config
    }
}

/// Parse a 64-character hex string into a 32-byte array.
fn parse_hex_pubkey(input: &str) -> Result<[u8; 32], String> {
    let input = input.trim();
    if input.len() != 64 {
        return Err(format!("expected 64 hex chars, got {}", input.len()));
    }

    let bytes = hex::decode(input).map_err(|e| format!("invalid hex: {e}"))?;
    let mut key = [0u8; 32];
    key.copy_from_slice(&bytes);
    Ok(key)
}
