#![forbid(unsafe_code)]

//! Stale File Reaper (sfr) — background housekeeping for unattended hosts.
//!
//! Two independent deletion triggers share one configuration hierarchy
//! (volume -> folder rule -> file rule):
//! 1. **Age-based pruning** — files older than a per-extension limit are
//!    deleted inside depth-bounded directory windows, and emptied directories
//!    are pruned per rule flags.
//! 2. **Free-space eviction** — when a volume drops below its free-space
//!    floor, the oldest files across its rules are deleted until the deficit
//!    is covered.
//!
//! A single cancellable worker runs both triggers as one pass per cycle.
//!
//! # Library usage
//!
//! Use the [`prelude`] for convenient access to the most common types:
//!
//! ```rust,no_run
//! use stale_file_reaper::prelude::*;
//! ```
//!
//! Individual modules can also be imported directly:
//!
//! ```rust,no_run
//! use stale_file_reaper::rules::model::{FolderOptions, VolumeSet};
//! use stale_file_reaper::sweep::manager::ReaperManager;
//! ```

pub mod prelude;

pub mod core;
#[cfg(feature = "daemon")]
pub mod daemon;
pub mod logger;
pub mod platform;
pub mod rules;
pub mod sweep;
