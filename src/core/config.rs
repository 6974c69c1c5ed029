//! Configuration system: TOML file + env var overrides + defaults.
//!
//! The file declares the trigger interval, the activity-log location, and the
//! volume -> folder -> file rule hierarchy. [`crate::sweep::manager::ReaperManager::from_config`]
//! replays the hierarchy through the normal registration calls, so file-borne
//! duplicates and invalid depth windows behave exactly like programmatic ones.

#![allow(missing_docs)]

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::core::errors::{Result, SfrError};
use crate::logger::jsonl::JsonlConfig;
use crate::rules::model::FolderOptions;

/// Env var naming the config file; beats the default path, loses to an
/// explicit `--config` argument.
pub const CONFIG_PATH_ENV: &str = "SFR_CONFIG";

/// Full reaper configuration model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    /// Hours between deletion passes.
    pub trigger_hours: u64,
    pub logging: LoggingConfig,
    #[serde(rename = "volume")]
    pub volumes: Vec<VolumeConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            trigger_hours: 24,
            logging: LoggingConfig::default(),
            volumes: Vec::new(),
        }
    }
}

/// Activity-log tuning.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LoggingConfig {
    pub jsonl_path: PathBuf,
    pub max_size_bytes: u64,
    pub max_rotated_files: u32,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        let defaults = JsonlConfig::default();
        Self {
            jsonl_path: defaults.path,
            max_size_bytes: defaults.max_size_bytes,
            max_rotated_files: defaults.max_rotated_files,
        }
    }
}

/// One `[[volume]]` table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VolumeConfig {
    /// Storage root, e.g. `/data`.
    pub root: PathBuf,
    #[serde(default)]
    pub min_free_space_gb: u64,
    /// Recorded for compatibility; no trigger logic consults it.
    #[serde(default)]
    pub max_used_space_gb: u64,
    #[serde(default, rename = "folder")]
    pub folders: Vec<FolderConfig>,
}

/// One `[[volume.folder]]` table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FolderConfig {
    pub path: PathBuf,
    #[serde(default)]
    pub delete_folder_if_empty: bool,
    #[serde(default)]
    pub delete_subfolders_if_empty: bool,
    #[serde(default)]
    pub first_depth: u32,
    #[serde(default)]
    pub last_depth: u32,
    #[serde(default, rename = "file")]
    pub files: Vec<FileRuleConfig>,
}

impl FolderConfig {
    /// Registration options; an invalid depth window normalizes at
    /// registration, same as the programmatic path.
    #[must_use]
    pub const fn options(&self) -> FolderOptions {
        FolderOptions {
            delete_folder_if_empty: self.delete_folder_if_empty,
            delete_subfolders_if_empty: self.delete_subfolders_if_empty,
            first_depth: self.first_depth,
            last_depth: self.last_depth,
        }
    }
}

/// One `[[volume.folder.file]]` table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FileRuleConfig {
    /// Extension, with or without the leading dot.
    pub extension: String,
    pub max_age_days: u32,
}

impl Config {
    /// Default configuration path: `~/.config/sfr/config.toml`.
    #[must_use]
    pub fn default_path() -> PathBuf {
        let home = env::var_os("HOME").map_or_else(|| PathBuf::from("/tmp"), PathBuf::from);
        home.join(".config").join("sfr").join("config.toml")
    }

    /// Load from an explicit path, `SFR_CONFIG`, or the default path, then
    /// apply env overrides and validate.
    ///
    /// A missing file is only an error when the path was named explicitly
    /// (argument or env var); a missing default-path file yields defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_with_env(path, |key| env::var(key).ok())
    }

    /// `load` with an injectable env lookup, so tests never mutate process
    /// environment.
    pub fn load_with_env(
        path: Option<&Path>,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        let env_path = lookup(CONFIG_PATH_ENV).map(PathBuf::from);
        let is_explicit = path.is_some() || env_path.is_some();
        let path_buf = path
            .map(Path::to_path_buf)
            .or(env_path)
            .unwrap_or_else(Self::default_path);

        let mut cfg = if path_buf.exists() {
            let raw =
                fs::read_to_string(&path_buf).map_err(|source| SfrError::io(&path_buf, source))?;
            toml::from_str::<Self>(&raw)?
        } else if is_explicit {
            return Err(SfrError::InvalidConfig {
                details: format!("config file not found: {}", path_buf.display()),
            });
        } else {
            Self::default()
        };

        cfg.apply_env_overrides(&lookup)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Writer config for the activity log.
    #[must_use]
    pub fn jsonl_config(&self) -> JsonlConfig {
        JsonlConfig {
            path: self.logging.jsonl_path.clone(),
            max_size_bytes: self.logging.max_size_bytes,
            max_rotated_files: self.logging.max_rotated_files,
        }
    }

    fn apply_env_overrides(&mut self, lookup: &impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(raw) = lookup("SFR_TRIGGER_HOURS") {
            self.trigger_hours = raw.parse().map_err(|_| SfrError::ConfigParse {
                context: "SFR_TRIGGER_HOURS",
                details: format!("not an unsigned integer: {raw}"),
            })?;
        }
        if let Some(raw) = lookup("SFR_JSONL_LOG") {
            self.logging.jsonl_path = PathBuf::from(raw);
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.trigger_hours == 0 {
            return Err(SfrError::InvalidConfig {
                details: "trigger_hours must be at least 1".to_string(),
            });
        }
        for volume in &self.volumes {
            if !volume.root.is_absolute() {
                return Err(SfrError::InvalidConfig {
                    details: format!("volume root must be absolute: {}", volume.root.display()),
                });
            }
            for folder in &volume.folders {
                if !folder.path.is_absolute() {
                    return Err(SfrError::InvalidConfig {
                        details: format!(
                            "folder rule path must be absolute: {}",
                            folder.path.display()
                        ),
                    });
                }
                for file in &folder.files {
                    if file.extension.trim_start_matches('.').is_empty() {
                        return Err(SfrError::InvalidConfig {
                            details: format!(
                                "empty file extension under {}",
                                folder.path.display()
                            ),
                        });
                    }
                }
            }
        }
        Ok(())
    }
}

// ──────────────────── tests ────────────────────
