//! Configuration resolution
//!
//! Priority order for every setting:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file (`DRIFTFEED_CONFIG` or `./driftfeed.toml`)
//! 4. Compiled default (fallback)

use std::path::{Path, PathBuf};
use tracing::warn;

/// Default bind address for the feed service
pub const DEFAULT_BIND: &str = "127.0.0.1:5730";
/// Default database location relative to the working directory
pub const DEFAULT_DB_PATH: &str = "data/driftfeed.db";

/// Resolved service configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub db_path: PathBuf,
    pub bind: String,
}

/// Resolve configuration from CLI arguments, environment, and config file
pub fn resolve(cli_db_path: Option<&Path>, cli_bind: Option<&str>) -> ServerConfig {
    let file = load_config_file();

    let db_path = cli_db_path
        .map(Path::to_path_buf)
        .or_else(|| std::env::var("DRIFTFEED_DB").ok().map(PathBuf::from))
        .or_else(|| file_string(&file, "db_path").map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DB_PATH));

    let bind = cli_bind
        .map(str::to_string)
        .or_else(|| std::env::var("DRIFTFEED_BIND").ok())
        .or_else(|| file_string(&file, "bind"))
        .unwrap_or_else(|| DEFAULT_BIND.to_string());

    ServerConfig { db_path, bind }
}

fn load_config_file() -> Option<toml::Value> {
    let path = std::env::var("DRIFTFEED_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("driftfeed.toml"));

    if !path.exists() {
        return None;
    }

    let contents = match std::fs::read_to_string(&path) {
        Ok(c) => c,
        Err(e) => {
            warn!("Could not read config file {}: {}", path.display(), e);
            return None;
        }
    };

    match toml::from_str::<toml::Value>(&contents) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!("Could not parse config file {}: {}", path.display(), e);
            None
        }
    }
}

fn file_string(file: &Option<toml::Value>, key: &str) -> Option<String> {
    file.as_ref()?
        .get(key)
        .and_then(|v| v.as_str())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_argument_wins() {
        let config = resolve(Some(Path::new("/tmp/override.db")), Some("0.0.0.0:9000"));
        assert_eq!(config.db_path, PathBuf::from("/tmp/override.db"));
        assert_eq!(config.bind, "0.0.0.0:9000");
    }

    #[test]
    fn defaults_apply_when_nothing_is_set() {
        // Env vars are not set in the test environment
        let config = resolve(None, None);
        assert_eq!(config.bind, DEFAULT_BIND);
        assert_eq!(config.db_path, PathBuf::from(DEFAULT_DB_PATH));
    }
}
