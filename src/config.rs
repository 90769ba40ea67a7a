//! Configuration: TOML file with environment overrides.
//!
//! Resolution order: explicit `--config` path, then the `CT_CONFIG` env var,
//! then the global file at `<config_dir>/ct/config.toml`. Env overrides
//! (`CT_DB_PATH`, `CT_TREE`) are applied last.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{CtError, Result};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub tree: TreeConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Database file path. Defaults to `<data_dir>/ct/ct.db`.
    #[serde(default)]
    pub db_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreeConfig {
    /// Skill tree name used when the caller does not pass `--tree`.
    #[serde(default = "default_tree_name")]
    pub default_name: String,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            default_name: default_tree_name(),
        }
    }
}

fn default_tree_name() -> String {
    "default".to_string()
}

/// Partial config as read from a file; `None` fields keep the defaults.
#[derive(Debug, Clone, Default, Deserialize)]
struct ConfigPatch {
    #[serde(default)]
    storage: Option<StoragePatch>,
    #[serde(default)]
    tree: Option<TreePatch>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct StoragePatch {
    #[serde(default)]
    db_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct TreePatch {
    #[serde(default)]
    default_name: Option<String>,
}

impl Config {
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        let mut config = Self::default();

        let explicit = explicit_path
            .map(PathBuf::from)
            .or_else(|| std::env::var("CT_CONFIG").ok().map(PathBuf::from));

        if let Some(path) = explicit {
            if let Some(patch) = Self::load_patch(&path)? {
                config.merge_patch(patch);
            } else {
                return Err(CtError::Config(format!(
                    "config file not found: {}",
                    path.display()
                )));
            }
        } else if let Some(global) = Self::load_global()? {
            config.merge_patch(global);
        }

        config.apply_env_overrides();
        Ok(config)
    }

    fn load_global() -> Result<Option<ConfigPatch>> {
        let Some(dir) = dirs::config_dir() else {
            return Ok(None);
        };
        Self::load_patch(&dir.join("ct").join("config.toml"))
    }

    fn load_patch(path: &Path) -> Result<Option<ConfigPatch>> {
        if !path.exists() {
            return Ok(None);
        }
        let raw = std::fs::read_to_string(path)?;
        let patch = toml::from_str(&raw)
            .map_err(|err| CtError::Config(format!("{}: {err}", path.display())))?;
        Ok(Some(patch))
    }

    fn merge_patch(&mut self, patch: ConfigPatch) {
        if let Some(storage) = patch.storage {
            if let Some(db_path) = storage.db_path {
                self.storage.db_path = Some(db_path);
            }
        }
        if let Some(tree) = patch.tree {
            if let Some(default_name) = tree.default_name {
                self.tree.default_name = default_name;
            }
        }
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(path) = std::env::var("CT_DB_PATH") {
            if !path.is_empty() {
                self.storage.db_path = Some(PathBuf::from(path));
            }
        }
        if let Ok(tree) = std::env::var("CT_TREE") {
            if !tree.is_empty() {
                self.tree.default_name = tree;
            }
        }
    }

    /// Resolved database path, falling back to the platform data dir.
    #[must_use]
    pub fn db_path(&self) -> PathBuf {
        self.storage.db_path.clone().unwrap_or_else(|| {
            dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("ct")
                .join("ct.db")
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = Config::default();
        assert_eq!(config.tree.default_name, "default");
        assert!(config.storage.db_path.is_none());
        assert!(config.db_path().ends_with("ct.db"));
    }

    #[test]
    fn patch_merges_over_defaults() {
        let mut config = Config::default();
        let patch: ConfigPatch = toml::from_str(
            r#"
            [storage]
            db_path = "/tmp/custom.db"

            [tree]
            default_name = "math"
            "#,
        )
        .unwrap();
        config.merge_patch(patch);
        assert_eq!(config.storage.db_path, Some(PathBuf::from("/tmp/custom.db")));
        assert_eq!(config.tree.default_name, "math");
    }

    #[test]
    fn empty_patch_keeps_defaults() {
        let mut config = Config::default();
        config.merge_patch(ConfigPatch::default());
        assert_eq!(config.tree.default_name, "default");
    }

    #[test]
    fn missing_explicit_config_is_an_error() {
        let err = Config::load(Some(Path::new("/nonexistent/ct.toml"))).unwrap_err();
        assert!(matches!(err, CtError::Config(_)));
    }
}
