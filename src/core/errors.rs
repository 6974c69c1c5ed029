//! SFR-prefixed error types with structured error codes.
//!
//! Registration and lifecycle calls return these as discrete codes to the
//! caller; pass-time faults are collapsed to [`SfrError::Deletion`] inside the
//! scheduler loop and never cross the public boundary as panics.

#![allow(missing_docs)]

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Shared `Result` alias for the project.
pub type Result<T> = std::result::Result<T, SfrError>;

/// Top-level error type for Stale File Reaper.
#[derive(Debug, Error)]
pub enum SfrError {
    #[error("[SFR-1001] invalid configuration: {details}")]
    InvalidConfig { details: String },

    #[error("[SFR-1002] configuration parse failure in {context}: {details}")]
    ConfigParse {
        context: &'static str,
        details: String,
    },

    #[error("[SFR-1101] volume already registered: {root}")]
    VolumeAlreadyPresent { root: PathBuf },

    #[error("[SFR-1102] folder rule already registered: {path}")]
    FolderRuleAlreadyPresent { path: PathBuf },

    #[error("[SFR-1103] file rule already registered: {extension}")]
    FileRuleAlreadyPresent { extension: String },

    #[error("[SFR-1104] volume not registered: {root}")]
    VolumeMissing { root: PathBuf },

    #[error("[SFR-1105] folder rule not registered: {path}")]
    FolderRuleMissing { path: PathBuf },

    #[error("[SFR-2001] folder does not exist: {path}")]
    FolderNotExisting { path: PathBuf },

    #[error("[SFR-2002] file does not exist: {path}")]
    FileNotExisting { path: PathBuf },

    #[error("[SFR-2101] free-space query failure for {root}: {details}")]
    FreeSpaceQuery { root: PathBuf, details: String },

    #[error("[SFR-2102] IO failure at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("[SFR-2103] serialization failure in {context}: {details}")]
    Serialization {
        context: &'static str,
        details: String,
    },

    #[error("[SFR-3001] failed to start deletion worker: {details}")]
    StartingDeletion { details: String },

    #[error("[SFR-3002] failed to stop deletion worker: {details}")]
    StoppingDeletion { details: String },

    #[error("[SFR-3003] deletion pass fault: {details}")]
    Deletion { details: String },
}

impl SfrError {
    /// Stable machine-parseable error code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidConfig { .. } => "SFR-1001",
            Self::ConfigParse { .. } => "SFR-1002",
            Self::VolumeAlreadyPresent { .. } => "SFR-1101",
            Self::FolderRuleAlreadyPresent { .. } => "SFR-1102",
            Self::FileRuleAlreadyPresent { .. } => "SFR-1103",
            Self::VolumeMissing { .. } => "SFR-1104",
            Self::FolderRuleMissing { .. } => "SFR-1105",
            Self::FolderNotExisting { .. } => "SFR-2001",
            Self::FileNotExisting { .. } => "SFR-2002",
            Self::FreeSpaceQuery { .. } => "SFR-2101",
            Self::Io { .. } => "SFR-2102",
            Self::Serialization { .. } => "SFR-2103",
            Self::StartingDeletion { .. } => "SFR-3001",
            Self::StoppingDeletion { .. } => "SFR-3002",
            Self::Deletion { .. } => "SFR-3003",
        }
    }

    /// Whether the next scheduled cycle might resolve the failure.
    ///
    /// Registration conflicts and config errors are deterministic and will not
    /// clear on retry; filesystem absence and IO faults may.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::FolderNotExisting { .. }
                | Self::FileNotExisting { .. }
                | Self::FreeSpaceQuery { .. }
                | Self::Io { .. }
                | Self::Deletion { .. }
        )
    }

    /// Convenience constructor for IO errors with a known path.
    #[must_use]
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }
}

impl From<serde_json::Error> for SfrError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serialization {
            context: "serde_json",
            details: value.to_string(),
        }
    }
}

impl From<toml::de::Error> for SfrError {
    fn from(value: toml::de::Error) -> Self {
        Self::ConfigParse {
            context: "toml",
            details: value.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn all_errors() -> Vec<SfrError> {
        vec![
            SfrError::InvalidConfig {
                details: String::new(),
            },
            SfrError::ConfigParse {
                context: "",
                details: String::new(),
            },
            SfrError::VolumeAlreadyPresent {
                root: PathBuf::new(),
            },
            SfrError::FolderRuleAlreadyPresent {
                path: PathBuf::new(),
            },
            SfrError::FileRuleAlreadyPresent {
                extension: String::new(),
            },
            SfrError::VolumeMissing {
                root: PathBuf::new(),
            },
            SfrError::FolderRuleMissing {
                path: PathBuf::new(),
            },
            SfrError::FolderNotExisting {
                path: PathBuf::new(),
            },
            SfrError::FileNotExisting {
                path: PathBuf::new(),
            },
            SfrError::FreeSpaceQuery {
                root: PathBuf::new(),
                details: String::new(),
            },
            SfrError::Io {
                path: PathBuf::new(),
                source: std::io::Error::other("test"),
            },
            SfrError::Serialization {
                context: "",
                details: String::new(),
            },
            SfrError::StartingDeletion {
                details: String::new(),
            },
            SfrError::StoppingDeletion {
                details: String::new(),
            },
            SfrError::Deletion {
                details: String::new(),
            },
        ]
    }

    #[test]
    fn error_codes_are_unique() {
        let errors = all_errors();
        let codes: Vec<&str> = errors.iter().map(SfrError::code).collect();
        let unique: std::collections::HashSet<&&str> = codes.iter().collect();
        assert_eq!(
            codes.len(),
            unique.len(),
            "error codes must be unique: {codes:?}"
        );
    }

    #[test]
    fn error_codes_have_sfr_prefix() {
        for err in &all_errors() {
            assert!(
                err.code().starts_with("SFR-"),
                "code {} must start with SFR-",
                err.code()
            );
        }
    }

    #[test]
    fn error_display_includes_code() {
        let err = SfrError::VolumeAlreadyPresent {
            root: PathBuf::from("/data/"),
        };
        let msg = err.to_string();
        assert!(msg.contains("SFR-1101"), "display should contain code: {msg}");
        assert!(msg.contains("/data/"), "display should contain root: {msg}");
    }

    #[test]
    fn retryable_split_matches_taxonomy() {
        // The next scheduled cycle is the de facto retry mechanism.
        assert!(
            SfrError::FolderNotExisting {
                path: PathBuf::new()
            }
            .is_retryable()
        );
        assert!(
            SfrError::Deletion {
                details: String::new()
            }
            .is_retryable()
        );
        assert!(SfrError::io("/tmp/x", std::io::Error::other("test")).is_retryable());

        // Registration conflicts never clear on retry.
        assert!(
            !SfrError::VolumeAlreadyPresent {
                root: PathBuf::new()
            }
            .is_retryable()
        );
        assert!(
            !SfrError::FolderRuleMissing {
                path: PathBuf::new()
            }
            .is_retryable()
        );
        assert!(
            !SfrError::InvalidConfig {
                details: String::new()
            }
            .is_retryable()
        );
    }

    #[test]
    fn io_convenience_constructor() {
        let err = SfrError::io(
            "/tmp/test.txt",
            std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        );
        assert_eq!(err.code(), "SFR-2102");
        assert!(err.to_string().contains("/tmp/test.txt"));
    }

    #[test]
    fn from_toml_error() {
        let toml_err = toml::from_str::<toml::Value>("= invalid").unwrap_err();
        let err: SfrError = toml_err.into();
        assert_eq!(err.code(), "SFR-1002");
    }

    #[test]
    fn from_serde_json_error() {
        let json_err = serde_json::from_str::<serde_json::Value>("not json").unwrap_err();
        let err: SfrError = json_err.into();
        assert_eq!(err.code(), "SFR-2103");
    }
}
