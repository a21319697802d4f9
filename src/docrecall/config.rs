use crate::codec::DEFAULT_COMPRESSION_LEVEL;
use crate::error::{RecallError, Result};
use crate::model::Features;
use crate::retention::DEFAULT_SNAPSHOTS_PER_SESSION;
use crate::store::{Capacities, DEFAULT_TABLE_BYTES};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

const CONFIG_FILENAME: &str = "config.json";
const DEFAULT_DEBOUNCE_MS: u64 = 1250;

/// Configuration for docrecall, stored in <data dir>/config.json
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RecallConfig {
    #[serde(default)]
    pub features: Features,

    /// Quiet period before a burst of edits is captured
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    /// Local-history snapshots kept per document when the table is full
    #[serde(default = "default_snapshots_per_session")]
    pub snapshots_per_session: usize,

    #[serde(default = "default_table_bytes")]
    pub hot_close_table_bytes: u64,

    #[serde(default = "default_table_bytes")]
    pub local_history_table_bytes: u64,

    /// Deflate level, 0 (store) to 9 (smallest)
    #[serde(default = "default_compression_level")]
    pub compression_level: u32,
}

fn default_debounce_ms() -> u64 {
    DEFAULT_DEBOUNCE_MS
}

fn default_snapshots_per_session() -> usize {
    DEFAULT_SNAPSHOTS_PER_SESSION
}

fn default_table_bytes() -> u64 {
    DEFAULT_TABLE_BYTES
}

fn default_compression_level() -> u32 {
    DEFAULT_COMPRESSION_LEVEL
}

impl Default for RecallConfig {
    fn default() -> Self {
        Self {
            features: Features::default(),
            debounce_ms: DEFAULT_DEBOUNCE_MS,
            snapshots_per_session: DEFAULT_SNAPSHOTS_PER_SESSION,
            hot_close_table_bytes: DEFAULT_TABLE_BYTES,
            local_history_table_bytes: DEFAULT_TABLE_BYTES,
            compression_level: DEFAULT_COMPRESSION_LEVEL,
        }
    }
}

pub const KEYS: [&str; 7] = [
    "features.hot_close",
    "features.local_history",
    "debounce_ms",
    "snapshots_per_session",
    "hot_close_table_bytes",
    "local_history_table_bytes",
    "compression_level",
];

impl RecallConfig {
    /// Load config from the given directory, or return defaults if not found
    pub fn load<P: AsRef<Path>>(config_dir: P) -> Result<Self> {
        let config_path = config_dir.as_ref().join(CONFIG_FILENAME);

        if !config_path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&config_path)?;
        let config: RecallConfig = serde_json::from_str(&content)?;
        Ok(config)
    }

    pub fn save<P: AsRef<Path>>(&self, config_dir: P) -> Result<()> {
        let config_dir = config_dir.as_ref();
        fs::create_dir_all(config_dir)?;

        let content = serde_json::to_string_pretty(self)?;
        fs::write(config_dir.join(CONFIG_FILENAME), content)?;
        Ok(())
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn capacities(&self) -> Capacities {
        Capacities {
            hot_close_table_bytes: self.hot_close_table_bytes,
            local_history_table_bytes: self.local_history_table_bytes,
        }
    }

    pub fn get(&self, key: &str) -> Option<String> {
        let value = match key {
            "features.hot_close" => self.features.hot_close.to_string(),
            "features.local_history" => self.features.local_history.to_string(),
            "debounce_ms" => self.debounce_ms.to_string(),
            "snapshots_per_session" => self.snapshots_per_session.to_string(),
            "hot_close_table_bytes" => self.hot_close_table_bytes.to_string(),
            "local_history_table_bytes" => self.local_history_table_bytes.to_string(),
            "compression_level" => self.compression_level.to_string(),
            _ => return None,
        };
        Some(value)
    }

    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        match key {
            "features.hot_close" => self.features.hot_close = parse_bool(key, value)?,
            "features.local_history" => self.features.local_history = parse_bool(key, value)?,
            "debounce_ms" => self.debounce_ms = parse_num(key, value)?,
            "snapshots_per_session" => {
                let n: usize = parse_num(key, value)?;
                if n == 0 {
                    return Err(RecallError::Config(
                        "snapshots_per_session must be at least 1".to_string(),
                    ));
                }
                self.snapshots_per_session = n;
            }
            "hot_close_table_bytes" => self.hot_close_table_bytes = parse_num(key, value)?,
            "local_history_table_bytes" => self.local_history_table_bytes = parse_num(key, value)?,
            "compression_level" => {
                let level: u32 = parse_num(key, value)?;
                if level > 9 {
                    return Err(RecallError::Config(format!(
                        "compression_level must be between 0 and 9, got {}",
                        level
                    )));
                }
                self.compression_level = level;
            }
            _ => return Err(RecallError::Config(format!("Unknown config key: {}", key))),
        }
        Ok(())
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "on" | "yes" | "1" => Ok(true),
        "false" | "off" | "no" | "0" => Ok(false),
        _ => Err(RecallError::Config(format!(
            "{} expects true or false, got '{}'",
            key, value
        ))),
    }
}

fn parse_num<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| RecallError::Config(format!("{} expects a number, got '{}'", key, value)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_config() {
        let config = RecallConfig::default();
        assert_eq!(config.debounce_ms, 1250);
        assert_eq!(config.snapshots_per_session, 5);
        assert_eq!(config.hot_close_table_bytes, 200 * 1024 * 1024);
        assert!(config.features.hot_close);
    }

    #[test]
    fn test_load_missing_config() {
        let dir = tempdir().unwrap();
        let config = RecallConfig::load(dir.path()).unwrap();
        assert_eq!(config, RecallConfig::default());
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join(CONFIG_FILENAME),
            r#"{"debounce_ms": 300, "features": {"local_history": false}}"#,
        )
        .unwrap();

        let config = RecallConfig::load(dir.path()).unwrap();
        assert_eq!(config.debounce_ms, 300);
        assert!(config.features.hot_close);
        assert!(!config.features.local_history);
        assert_eq!(config.compression_level, 6);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempdir().unwrap();
        let nested = dir.path().join("data");

        let mut config = RecallConfig::default();
        config.set("snapshots_per_session", "3").unwrap();
        config.set("features.hot_close", "off").unwrap();
        config.save(&nested).unwrap();

        let loaded = RecallConfig::load(&nested).unwrap();
        assert_eq!(loaded.snapshots_per_session, 3);
        assert!(!loaded.features.hot_close);
    }

    #[test]
    fn test_get_every_key() {
        let config = RecallConfig::default();
        for key in KEYS {
            assert!(config.get(key).is_some(), "missing {}", key);
        }
        assert_eq!(config.get("nope"), None);
    }

    #[test]
    fn test_set_rejects_bad_values() {
        let mut config = RecallConfig::default();
        assert!(config.set("compression_level", "11").is_err());
        assert!(config.set("debounce_ms", "soon").is_err());
        assert!(config.set("snapshots_per_session", "0").is_err());
        assert!(config.set("features.hot_close", "maybe").is_err());
        assert!(config.set("colour", "blue").is_err());
        assert_eq!(config, RecallConfig::default());
    }

    #[test]
    fn test_corrupt_file_is_an_error() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join(CONFIG_FILENAME), "{not json").unwrap();
        assert!(matches!(
            RecallConfig::load(dir.path()),
            Err(RecallError::Serialization(_))
        ));
    }
}
