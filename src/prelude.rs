//! Convenience re-exports for library consumers.
//!
//! ```rust,no_run
//! use stale_file_reaper::prelude::*;
//! ```

// Core
pub use crate::core::config::Config;
pub use crate::core::errors::{Result, SfrError};

// Rules
pub use crate::rules::model::{DepthWindow, FileRule, FolderOptions, FolderRule, Volume, VolumeSet};

// Platform
pub use crate::platform::pal::{FileMeta, Filesystem, StdFilesystem};

// Sweep
pub use crate::sweep::evictor::{EvictionOutcome, SpaceEvictor};
pub use crate::sweep::manager::{PassSummary, ReaperManager};
pub use crate::sweep::walker::{TreeWalker, WalkOutcome};

// Logging
pub use crate::logger::activity::{ActivityEvent, ActivityLoggerHandle, spawn_logger};
pub use crate::logger::jsonl::JsonlConfig;
