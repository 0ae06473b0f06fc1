//! Server configuration.
//!
//! Defaults match a local single-node deployment; every field can be
//! overridden through `GRID_*` environment variables.

use std::path::PathBuf;
use std::time::Duration;

use pixelfield_core::GridDims;

use crate::identity::IdentityMode;

/// Top-level server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// HTTP API bind address
    pub http_addr: String,
    /// WebSocket feed bind address
    pub feed_addr: String,
    /// Per-principal write cooldown
    pub cooldown: Duration,
    /// RocksDB directory; `None` selects the in-memory store
    pub store_path: Option<PathBuf>,
    /// How writers are identified
    pub identity_mode: IdentityMode,
    /// Grid dimensions and color depth
    pub dims: GridDims,
    /// Feed broadcast buffer per connection
    pub feed_capacity: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_addr: "127.0.0.1:3000".to_string(),
            feed_addr: "127.0.0.1:3001".to_string(),
            cooldown: Duration::from_secs(5),
            store_path: Some(PathBuf::from("./pixelfield-data")),
            identity_mode: IdentityMode::HashedFingerprint,
            dims: GridDims::default(),
            feed_capacity: 256,
        }
    }
}

impl ServerConfig {
    /// Build from the environment, falling back to defaults.
    ///
    /// Recognized variables: `GRID_HTTP_ADDR`, `GRID_FEED_ADDR`,
    /// `GRID_COOLDOWN_SECONDS`, `GRID_STORE_PATH` (`memory` for the
    /// in-memory store), `GRID_IDENTITY_MODE`
    /// (`network`/`header`/`token`/`fingerprint`), `GRID_VERIFY_URL`.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(addr) = std::env::var("GRID_HTTP_ADDR") {
            config.http_addr = addr;
        }
        if let Ok(addr) = std::env::var("GRID_FEED_ADDR") {
            config.feed_addr = addr;
        }
        if let Ok(secs) = std::env::var("GRID_COOLDOWN_SECONDS") {
            match secs.parse::<u64>() {
                Ok(secs) => config.cooldown = Duration::from_secs(secs),
                Err(_) => log::warn!("Ignoring unparseable GRID_COOLDOWN_SECONDS={secs}"),
            }
        }
        if let Ok(path) = std::env::var("GRID_STORE_PATH") {
            config.store_path = if path == "memory" {
                None
            } else {
                Some(PathBuf::from(path))
            };
        }
        if let Ok(mode) = std::env::var("GRID_IDENTITY_MODE") {
            match IdentityMode::parse(&mode, std::env::var("GRID_VERIFY_URL").ok()) {
                Some(mode) => config.identity_mode = mode,
                None => log::warn!("Ignoring unknown GRID_IDENTITY_MODE={mode}"),
            }
        }

        config
    }

    /// Small in-memory configuration for tests.
    pub fn for_testing() -> Self {
        Self {
            http_addr: "127.0.0.1:0".to_string(),
            feed_addr: "127.0.0.1:0".to_string(),
            cooldown: Duration::from_secs(5),
            store_path: None,
            identity_mode: IdentityMode::HashedFingerprint,
            dims: GridDims::default(),
            feed_capacity: 64,
        }
    }
}
