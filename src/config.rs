//! Server configuration.
//!
//! Configuration is a plain value constructed at startup, either from
//! [`Config::default`] or from environment variables via [`Config::from_env`].
//! There is no CLI surface.

use std::path::PathBuf;
use std::time::Duration;

use crate::storage::DEFAULT_BUFFER_SIZE;

/// Runtime configuration for the server and storage stack.
#[derive(Debug, Clone)]
pub struct Config {
    /// TCP port the listener binds to.
    pub port: u16,
    /// Buffer pool capacity in pages (128 pages = 1 MiB).
    pub buffer_size: usize,
    /// Per-query socket read deadline. A timeout while idle is benign;
    /// the session simply waits for the next query.
    pub query_timeout: Duration,
    /// Per-frame deadline during startup and payload reads.
    pub connection_timeout: Duration,
    /// Directory containing the `pages/` subdirectory of table files.
    pub data_root: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 5432,
            buffer_size: DEFAULT_BUFFER_SIZE,
            query_timeout: Duration::from_millis(30_000),
            connection_timeout: Duration::from_millis(10_000),
            data_root: PathBuf::from("./data"),
        }
    }
}

impl Config {
    /// Builds a configuration from `CHALKDB_*` environment variables,
    /// falling back to defaults for anything unset or unparseable.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            port: env_parse("CHALKDB_PORT").unwrap_or(defaults.port),
            buffer_size: env_parse("CHALKDB_BUFFER_SIZE").unwrap_or(defaults.buffer_size),
            query_timeout: env_parse("CHALKDB_QUERY_TIMEOUT_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.query_timeout),
            connection_timeout: env_parse("CHALKDB_CONNECTION_TIMEOUT_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.connection_timeout),
            data_root: std::env::var_os("CHALKDB_DATA_ROOT")
                .map(PathBuf::from)
                .unwrap_or(defaults.data_root),
        }
    }

    /// Returns the listen address for the TCP listener.
    pub fn listen_addr(&self) -> String {
        format!("127.0.0.1:{}", self.port)
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok()?.parse().ok()
}
