//! # Node Configuration
//!
//! Storage and fast-query settings for the node, with environment overrides.
//!
//! ## Environment
//!
//! | Variable | Field |
//! |----------|-------|
//! | `QC_DATA_DIR` | `storage.data_dir` |
//! | `QC_FAST_QUERY` | `fast_query.enabled` |
//! | `QC_FAST_QUERY_ASYNC_COMMIT` | `fast_query.async_commit` |
//! | `QC_COMMIT_GAP_HEIGHT` | `fast_query.commit_gap_height` |
//! | `QC_FAST_QUERY_LRU` | `fast_query.lru_size` |
//! | `QC_CHECK_WD` | `fast_query.check_watch_db` |

use std::path::PathBuf;

use qc_18_fast_query::FastQueryConfig;
use tracing::{info, warn};

/// Complete node configuration.
#[derive(Debug, Clone, Default)]
pub struct NodeConfig {
    /// Storage configuration.
    pub storage: StorageConfig,
    /// Fast-query subsystem configuration.
    pub fast_query: FastQueryConfig,
}

impl NodeConfig {
    /// Defaults overridden by the process environment.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env(|name| std::env::var(name).ok());
        config
    }

    /// Applies overrides from `lookup`. Unparseable values are logged and
    /// ignored.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(dir) = lookup("QC_DATA_DIR") {
            self.storage.data_dir = PathBuf::from(dir);
        }

        let fq = &mut self.fast_query;
        if let Some(on) = parse_var::<bool, _>(&lookup, "QC_FAST_QUERY") {
            fq.enabled = on;
        }
        if let Some(on) = parse_var::<bool, _>(&lookup, "QC_FAST_QUERY_ASYNC_COMMIT") {
            fq.async_commit = on;
        }
        if let Some(gap) = parse_var::<usize, _>(&lookup, "QC_COMMIT_GAP_HEIGHT") {
            fq.commit_gap_height = gap;
        }
        if let Some(size) = parse_var::<usize, _>(&lookup, "QC_FAST_QUERY_LRU") {
            fq.lru_size = size;
        }
        if let Some(on) = parse_var::<bool, _>(&lookup, "QC_CHECK_WD") {
            fq.check_watch_db = on;
        }

        info!(
            "Loaded config (data dir: {}, fast query: {}, async commit: {})",
            self.storage.data_dir.display(),
            self.fast_query.enabled,
            self.fast_query.async_commit
        );
    }

    /// Rejects settings the node cannot start with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.fast_query
            .validate()
            .map_err(|e| ConfigError::InvalidFastQuery(e.to_string()))
    }
}

fn parse_var<T, F>(lookup: &F, name: &str) -> Option<T>
where
    T: std::str::FromStr,
    F: Fn(&str) -> Option<String>,
{
    let raw = lookup(name)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!("Ignoring {}={:?}: not a valid value", name, raw);
            None
        }
    }
}

/// Configuration errors.
#[derive(Debug)]
pub enum ConfigError {
    /// Fast-query limits are unusable.
    InvalidFastQuery(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::InvalidFastQuery(reason) => {
                write!(f, "Invalid fast-query configuration: {}", reason)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Which backend holds the query store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StorageBackend {
    /// Process memory; contents are lost on exit.
    #[default]
    Memory,
    /// RocksDB under `data_dir` (requires the `rocksdb` feature).
    RocksDb,
}

/// Storage configuration.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Data directory for the query store.
    pub data_dir: PathBuf,
    pub backend: StorageBackend,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            backend: if cfg!(feature = "rocksdb") {
                StorageBackend::RocksDb
            } else {
                StorageBackend::Memory
            },
        }
    }
}

impl StorageConfig {
    /// Directory of the watch database.
    pub fn watch_db_path(&self) -> PathBuf {
        self.data_dir.join("watch.db")
    }

    /// Directory of the bloom index database.
    pub fn bloom_db_path(&self) -> PathBuf {
        self.data_dir.join("bloom.db")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = NodeConfig::default();
        assert!(!config.fast_query.enabled);
        assert_eq!(config.storage.data_dir, PathBuf::from("./data"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_overrides() {
        let mut config = NodeConfig::default();
        config.apply_env(env(&[
            ("QC_DATA_DIR", "/var/lib/qc"),
            ("QC_FAST_QUERY", "true"),
            ("QC_FAST_QUERY_ASYNC_COMMIT", "true"),
            ("QC_COMMIT_GAP_HEIGHT", "8"),
            ("QC_FAST_QUERY_LRU", "64"),
            ("QC_CHECK_WD", "true"),
        ]));

        assert_eq!(config.storage.watch_db_path(), PathBuf::from("/var/lib/qc/watch.db"));
        assert!(config.fast_query.enabled);
        assert!(config.fast_query.async_commit);
        assert_eq!(config.fast_query.commit_gap_height, 8);
        assert_eq!(config.fast_query.lru_size, 64);
        assert!(config.fast_query.check_watch_db);
    }

    #[test]
    fn test_bad_values_are_ignored() {
        let mut config = NodeConfig::default();
        config.apply_env(env(&[("QC_COMMIT_GAP_HEIGHT", "lots"), ("QC_FAST_QUERY", "yes")]));
        assert_eq!(config.fast_query.commit_gap_height, 100);
        assert!(!config.fast_query.enabled);
    }

    #[test]
    fn test_validate_rejects_zero_gap() {
        let mut config = NodeConfig::default();
        config.apply_env(env(&[("QC_COMMIT_GAP_HEIGHT", "0")]));
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidFastQuery(_))
        ));
    }
}
