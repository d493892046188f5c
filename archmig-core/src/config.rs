//! Migrator configuration.
//!
//! Every field has a default, so an empty TOML file is a valid configuration.
//! The CLI layers environment variables and flags on top of the file.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::ConfigError;

pub const DEFAULT_SOURCE_PATH: &str = "storage/old";
pub const DEFAULT_TARGET_PATH: &str = "storage/new";
pub const DEFAULT_BATCH_SIZE: usize = 10_000;
/// Epochs above this number carry a target tick vote signature.
pub const DEFAULT_SIGNATURE_EPOCH_THRESHOLD: u32 = 158;
pub const DEFAULT_MAP_SIZE_MB: usize = 64 * 1024;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MigratorConfig {
    /// Directory of the v1 store.
    pub source_path: PathBuf,
    /// Root directory under which one v2 store per epoch is created.
    pub target_path: PathBuf,
    /// Records staged before a durable commit.
    pub batch_size: usize,
    pub compact_after_migrate: bool,
    pub signature_epoch_threshold: u32,
    /// LMDB map size for target stores, in megabytes.
    pub map_size_mb: usize,
}

impl Default for MigratorConfig {
    fn default() -> Self {
        Self {
            source_path: PathBuf::from(DEFAULT_SOURCE_PATH),
            target_path: PathBuf::from(DEFAULT_TARGET_PATH),
            batch_size: DEFAULT_BATCH_SIZE,
            compact_after_migrate: false,
            signature_epoch_threshold: DEFAULT_SIGNATURE_EPOCH_THRESHOLD,
            map_size_mb: DEFAULT_MAP_SIZE_MB,
        }
    }
}

impl MigratorConfig {
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        toml::from_str(contents).map_err(|e| ConfigError::Parse {
            path: "<inline>".to_string(),
            reason: e.to_string(),
        })
    }

    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        toml::from_str(&contents).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            reason: e.to_string(),
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.source_path.as_os_str().is_empty() {
            return Err(ConfigError::MissingRequired {
                field: "source_path".to_string(),
            });
        }
        if self.target_path.as_os_str().is_empty() {
            return Err(ConfigError::MissingRequired {
                field: "target_path".to_string(),
            });
        }
        if self.batch_size == 0 {
            return Err(ConfigError::InvalidValue {
                field: "batch_size".to_string(),
                value: self.batch_size.to_string(),
                reason: "must be > 0".to_string(),
            });
        }
        if self.map_size_mb == 0 {
            return Err(ConfigError::InvalidValue {
                field: "map_size_mb".to_string(),
                value: self.map_size_mb.to_string(),
                reason: "must be > 0".to_string(),
            });
        }
        if self.source_path == self.target_path {
            return Err(ConfigError::InvalidValue {
                field: "target_path".to_string(),
                value: self.target_path.display().to_string(),
                reason: "must differ from source_path".to_string(),
            });
        }
        Ok(())
    }

    /// Map size in bytes, as the store adapter expects it.
    pub fn map_size_bytes(&self) -> usize {
        self.map_size_mb.saturating_mul(1024 * 1024)
    }
}

/// Which epochs a migration run covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EpochSelection {
    All,
    Epoch(u32),
    /// Inclusive on both ends.
    Range { start: u32, end: u32 },
}

impl EpochSelection {
    pub fn validate(&self) -> Result<(), ConfigError> {
        match *self {
            EpochSelection::Range { start, end } if start > end => {
                Err(ConfigError::InvalidValue {
                    field: "epoch_range".to_string(),
                    value: format!("{}..{}", start, end),
                    reason: "start must be <= end".to_string(),
                })
            }
            _ => Ok(()),
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        let config = MigratorConfig::default();
        assert_eq!(config.batch_size, 10_000);
        assert_eq!(config.signature_epoch_threshold, 158);
        assert_eq!(config.source_path, PathBuf::from("storage/old"));
        assert!(!config.compact_after_migrate);
        config.validate().expect("defaults should validate");
    }

    #[test]
    fn test_empty_toml_uses_defaults() {
        let config = MigratorConfig::from_toml_str("").expect("empty config should parse");
        assert_eq!(config, MigratorConfig::default());
    }

    #[test]
    fn test_partial_toml_overrides_fields() {
        let config = MigratorConfig::from_toml_str(
            r#"
            batch_size = 250
            compact_after_migrate = true
            target_path = "/data/v2"
            "#,
        )
        .expect("partial config should parse");
        assert_eq!(config.batch_size, 250);
        assert!(config.compact_after_migrate);
        assert_eq!(config.target_path, PathBuf::from("/data/v2"));
        assert_eq!(config.source_path, PathBuf::from(DEFAULT_SOURCE_PATH));
    }

    #[test]
    fn test_unknown_fields_rejected() {
        let err = MigratorConfig::from_toml_str("batchsize = 5")
            .expect_err("unknown field should fail");
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_zero_batch_size_rejected() {
        let config = MigratorConfig {
            batch_size: 0,
            ..Default::default()
        };
        let err = config.validate().expect_err("zero batch should fail");
        assert!(matches!(err, ConfigError::InvalidValue { ref field, .. } if field == "batch_size"));
    }

    #[test]
    fn test_zero_map_size_rejected() {
        let config = MigratorConfig {
            map_size_mb: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_source_rejected() {
        let config = MigratorConfig {
            source_path: PathBuf::new(),
            ..Default::default()
        };
        let err = config.validate().expect_err("empty source should fail");
        assert!(matches!(err, ConfigError::MissingRequired { .. }));
    }

    #[test]
    fn test_same_source_and_target_rejected() {
        let config = MigratorConfig {
            target_path: PathBuf::from(DEFAULT_SOURCE_PATH),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_path_reads_file() {
        let mut file = tempfile::NamedTempFile::new().expect("tempfile should succeed");
        writeln!(file, "map_size_mb = 128").expect("write should succeed");
        let config = MigratorConfig::from_path(file.path()).expect("load should succeed");
        assert_eq!(config.map_size_mb, 128);
        assert_eq!(config.map_size_bytes(), 128 * 1024 * 1024);
    }

    #[test]
    fn test_from_path_missing_file() {
        let err = MigratorConfig::from_path(Path::new("/nonexistent/archmig.toml"))
            .expect_err("missing file should fail");
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn test_inverted_epoch_range_rejected() {
        assert!(EpochSelection::Range { start: 10, end: 9 }.validate().is_err());
        assert!(EpochSelection::Range { start: 9, end: 9 }.validate().is_ok());
        assert!(EpochSelection::All.validate().is_ok());
    }
}
