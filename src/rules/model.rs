//! Rule hierarchy: Volume -> FolderRule -> FileRule.
//!
//! Pure data plus validation and normalization; no I/O. The hierarchy is built
//! incrementally through registration calls before the scheduler starts and is
//! snapshotted (never mutated) during deletion passes. Normalization — volume
//! root trailing separator, file-extension leading dot, depth-window reset —
//! happens exactly once at registration time.

#![allow(missing_docs)]

use std::collections::HashMap;
use std::hash::Hash;
use std::path::{Path, PathBuf};

use crate::core::errors::{Result, SfrError};

const BYTES_PER_GB: u64 = 1024 * 1024 * 1024;

// ──────────────────── ordered registry ────────────────────

/// Order-preserving associative registry: O(1) duplicate checks via the map,
/// deterministic registration-order iteration via the key list.
#[derive(Debug, Clone)]
struct OrderedRegistry<K, V> {
    entries: HashMap<K, V>,
    order: Vec<K>,
}

impl<K, V> Default for OrderedRegistry<K, V> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
            order: Vec::new(),
        }
    }
}

impl<K: Eq + Hash + Clone, V> OrderedRegistry<K, V> {
    fn new() -> Self {
        Self {
            entries: HashMap::new(),
            order: Vec::new(),
        }
    }

    /// Insert if absent. Returns `false` (state untouched) when the key exists.
    fn insert(&mut self, key: K, value: V) -> bool {
        if self.entries.contains_key(&key) {
            return false;
        }
        self.order.push(key.clone());
        self.entries.insert(key, value);
        true
    }

    fn get(&self, key: &K) -> Option<&V> {
        self.entries.get(key)
    }

    fn get_mut(&mut self, key: &K) -> Option<&mut V> {
        self.entries.get_mut(key)
    }

    fn len(&self) -> usize {
        self.order.len()
    }

    fn iter(&self) -> impl Iterator<Item = &V> {
        self.order.iter().filter_map(|k| self.entries.get(k))
    }
}

// ──────────────────── depth window ────────────────────

/// Inclusive directory-depth inspection window for a folder rule.
///
/// Traversal never proceeds past `last`; `first..=last` gates which visited
/// directories have their files evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DepthWindow {
    first: u32,
    last: u32,
}

impl DepthWindow {
    /// Build a window, resetting an invalid pair (`first > last`) to `0..=0`.
    #[must_use]
    pub fn new(first: u32, last: u32) -> Self {
        if first > last {
            Self { first: 0, last: 0 }
        } else {
            Self { first, last }
        }
    }

    #[must_use]
    pub const fn first(&self) -> u32 {
        self.first
    }

    #[must_use]
    pub const fn last(&self) -> u32 {
        self.last
    }

    /// Whether files at `depth` are inspected.
    #[must_use]
    pub const fn inspects(&self, depth: u32) -> bool {
        self.first <= depth && depth <= self.last
    }

    /// Whether traversal may descend into a child at `depth`.
    #[must_use]
    pub const fn descends_to(&self, depth: u32) -> bool {
        depth <= self.last
    }
}

impl Default for DepthWindow {
    fn default() -> Self {
        Self::new(0, 0)
    }
}

// ──────────────────── file rule ────────────────────

/// Extension + maximum-age pair governing age-based deletion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRule {
    extension: String,
    max_age_days: u32,
}

impl FileRule {
    fn new(extension: &str, max_age_days: u32) -> Self {
        Self {
            extension: normalize_extension(extension),
            max_age_days,
        }
    }

    /// Normalized extension, always carrying the leading dot.
    #[must_use]
    pub fn extension(&self) -> &str {
        &self.extension
    }

    #[must_use]
    pub const fn max_age_days(&self) -> u32 {
        self.max_age_days
    }

    /// Age threshold in coarse hours; exceeding this triggers deletion.
    #[must_use]
    pub const fn max_age_hours(&self) -> i64 {
        self.max_age_days as i64 * 24
    }

    /// Whether `path`'s extension matches this rule (exact, case-sensitive).
    #[must_use]
    pub fn matches(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| self.extension.len() == ext.len() + 1 && self.extension[1..] == *ext)
    }
}

/// Ensure the extension carries exactly one leading dot.
fn normalize_extension(extension: &str) -> String {
    let bare = extension.trim_start_matches('.');
    format!(".{bare}")
}

// ──────────────────── folder rule ────────────────────

/// Emptiness-deletion flags and depth window for a folder rule.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FolderOptions {
    /// Delete the rule's own root directory when it ends up empty.
    pub delete_folder_if_empty: bool,
    /// Delete descendant directories visited during traversal when empty.
    pub delete_subfolders_if_empty: bool,
    /// First depth whose files are inspected.
    pub first_depth: u32,
    /// Last depth inspected; also the hard traversal bound.
    pub last_depth: u32,
}

/// A configured directory tree targeted for deletion.
#[derive(Debug, Clone)]
pub struct FolderRule {
    path: PathBuf,
    delete_folder_if_empty: bool,
    delete_subfolders_if_empty: bool,
    depth_window: DepthWindow,
    file_rules: OrderedRegistry<String, FileRule>,
}

impl FolderRule {
    fn new(path: PathBuf, options: FolderOptions) -> Self {
        Self {
            path,
            delete_folder_if_empty: options.delete_folder_if_empty,
            delete_subfolders_if_empty: options.delete_subfolders_if_empty,
            depth_window: DepthWindow::new(options.first_depth, options.last_depth),
            file_rules: OrderedRegistry::new(),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub const fn depth_window(&self) -> DepthWindow {
        self.depth_window
    }

    /// Whether an empty directory at `depth` is deletion-eligible under this rule.
    #[must_use]
    pub const fn deletes_empty_at(&self, depth: u32) -> bool {
        if depth == 0 {
            self.delete_folder_if_empty
        } else {
            self.delete_subfolders_if_empty
        }
    }

    /// File rules in registration order.
    pub fn file_rules(&self) -> impl Iterator<Item = &FileRule> {
        self.file_rules.iter()
    }

    #[must_use]
    pub fn file_rule_count(&self) -> usize {
        self.file_rules.len()
    }

    fn add_file_rule(&mut self, extension: &str, max_age_days: u32) -> Result<()> {
        let rule = FileRule::new(extension, max_age_days);
        let key = rule.extension().to_string();
        if self.file_rules.insert(key, rule) {
            Ok(())
        } else {
            Err(SfrError::FileRuleAlreadyPresent {
                extension: normalize_extension(extension),
            })
        }
    }
}

// ──────────────────── volume ────────────────────

/// A storage root with a minimum free-space floor and its folder rules.
#[derive(Debug, Clone)]
pub struct Volume {
    root: PathBuf,
    min_free_space_gb: u64,
    /// Recorded at registration for compatibility; no deletion or eviction
    /// logic consults it. Unimplemented by design — do not wire a trigger to
    /// it without an agreed semantic.
    max_used_space_gb: u64,
    folder_rules: OrderedRegistry<PathBuf, FolderRule>,
}

impl Volume {
    fn new(root: PathBuf, min_free_space_gb: u64, max_used_space_gb: u64) -> Self {
        Self {
            root,
            min_free_space_gb,
            max_used_space_gb,
            folder_rules: OrderedRegistry::new(),
        }
    }

    /// Normalized volume root (always carries a trailing separator).
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub const fn min_free_space_gb(&self) -> u64 {
        self.min_free_space_gb
    }

    #[must_use]
    pub const fn max_used_space_gb(&self) -> u64 {
        self.max_used_space_gb
    }

    /// Minimum required free space in bytes.
    #[must_use]
    pub const fn min_free_bytes(&self) -> u64 {
        self.min_free_space_gb * BYTES_PER_GB
    }

    /// Folder rules in registration order.
    pub fn folder_rules(&self) -> impl Iterator<Item = &FolderRule> {
        self.folder_rules.iter()
    }

    #[must_use]
    pub fn folder_rule_count(&self) -> usize {
        self.folder_rules.len()
    }

    fn add_folder_rule(&mut self, path: PathBuf, options: FolderOptions) -> Result<()> {
        let rule = FolderRule::new(path.clone(), options);
        if self.folder_rules.insert(path.clone(), rule) {
            Ok(())
        } else {
            Err(SfrError::FolderRuleAlreadyPresent { path })
        }
    }
}

/// Normalize a volume identifier to its root path with a trailing separator.
///
/// Rebuilds the path from its components so trailing and doubled separators
/// collapse without round-tripping through UTF-8; non-Unicode roots keep
/// their bytes intact.
fn normalize_volume_root(root: &Path) -> PathBuf {
    let mut normalized: PathBuf = root.components().collect();
    if normalized.as_os_str().is_empty() {
        return PathBuf::from("/");
    }
    // Pushing an empty component appends the trailing separator.
    normalized.push("");
    normalized
}

// ──────────────────── volume set ────────────────────

/// The full registration hierarchy: every configured volume with its rules.
///
/// Registration errors are returned synchronously and leave state untouched.
#[derive(Debug, Clone, Default)]
pub struct VolumeSet {
    volumes: OrderedRegistry<PathBuf, Volume>,
}

impl VolumeSet {
    #[must_use]
    pub fn new() -> Self {
        Self {
            volumes: OrderedRegistry::new(),
        }
    }

    /// Register a volume. `min_free_space_gb = 0` disables eviction for it
    /// (observed free space is never below zero bytes).
    pub fn add_volume(
        &mut self,
        root: impl AsRef<Path>,
        min_free_space_gb: u64,
        max_used_space_gb: u64,
    ) -> Result<()> {
        let root = normalize_volume_root(root.as_ref());
        let volume = Volume::new(root.clone(), min_free_space_gb, max_used_space_gb);
        if self.volumes.insert(root.clone(), volume) {
            Ok(())
        } else {
            Err(SfrError::VolumeAlreadyPresent { root })
        }
    }

    /// Register a folder rule under an existing volume.
    pub fn add_folder_rule(
        &mut self,
        volume_root: impl AsRef<Path>,
        path: impl Into<PathBuf>,
        options: FolderOptions,
    ) -> Result<()> {
        let root = normalize_volume_root(volume_root.as_ref());
        let Some(volume) = self.volumes.get_mut(&root) else {
            return Err(SfrError::VolumeMissing { root });
        };
        volume.add_folder_rule(path.into(), options)
    }

    /// Register a file rule under an existing folder rule.
    pub fn add_file_rule(
        &mut self,
        volume_root: impl AsRef<Path>,
        folder_path: impl AsRef<Path>,
        extension: &str,
        max_age_days: u32,
    ) -> Result<()> {
        let root = normalize_volume_root(volume_root.as_ref());
        let Some(volume) = self.volumes.get_mut(&root) else {
            return Err(SfrError::VolumeMissing { root });
        };
        let folder_path = folder_path.as_ref().to_path_buf();
        let Some(rule) = volume.folder_rules.get_mut(&folder_path) else {
            return Err(SfrError::FolderRuleMissing { path: folder_path });
        };
        rule.add_file_rule(extension, max_age_days)
    }

    /// Volumes in registration order.
    pub fn volumes(&self) -> impl Iterator<Item = &Volume> {
        self.volumes.iter()
    }

    #[must_use]
    pub fn volume_count(&self) -> usize {
        self.volumes.len()
    }

    #[must_use]
    pub fn volume(&self, root: impl AsRef<Path>) -> Option<&Volume> {
        self.volumes.get(&normalize_volume_root(root.as_ref()))
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.volumes.len() == 0
    }
}

// ──────────────────── tests ────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn volume_root_gains_trailing_separator() {
        let mut set = VolumeSet::new();
        set.add_volume("/data", 10, 0).unwrap();
        assert!(set.volume("/data").is_some());
        assert_eq!(set.volumes().next().unwrap().root(), Path::new("/data/"));
    }

    #[test]
    fn volume_lookup_ignores_trailing_separator_spelling() {
        let mut set = VolumeSet::new();
        set.add_volume("/data/", 10, 0).unwrap();
        // Same identifier spelled without the separator is the same volume.
        let err = set.add_volume("/data", 10, 0).unwrap_err();
        assert_eq!(err.code(), "SFR-1101");
    }

    #[cfg(unix)]
    #[test]
    fn non_unicode_volume_root_keeps_its_bytes() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let raw = OsStr::from_bytes(b"/data/caf\xe9");
        let with_sep = OsStr::from_bytes(b"/data/caf\xe9/");

        let mut set = VolumeSet::new();
        set.add_volume(Path::new(raw), 10, 0).unwrap();
        assert_eq!(
            set.volumes().next().unwrap().root().as_os_str(),
            OsStr::from_bytes(b"/data/caf\xe9/"),
            "bytes survive normalization unmangled"
        );

        // Separator-spelling variant resolves to the same volume.
        let err = set.add_volume(Path::new(with_sep), 10, 0).unwrap_err();
        assert_eq!(err.code(), "SFR-1101");
        assert!(set.volume(Path::new(raw)).is_some());
    }

    #[test]
    fn duplicate_volume_is_rejected_without_mutation() {
        let mut set = VolumeSet::new();
        set.add_volume("/data", 100, 50).unwrap();
        set.add_folder_rule("/data", "/data/logs", FolderOptions::default())
            .unwrap();

        let err = set.add_volume("/data", 1, 1).unwrap_err();
        assert_eq!(err.code(), "SFR-1101");

        let vol = set.volume("/data").unwrap();
        assert_eq!(vol.min_free_space_gb(), 100, "first registration wins");
        assert_eq!(vol.folder_rule_count(), 1);
    }

    #[test]
    fn folder_rule_requires_existing_volume() {
        let mut set = VolumeSet::new();
        let err = set
            .add_folder_rule("/data", "/data/logs", FolderOptions::default())
            .unwrap_err();
        assert_eq!(err.code(), "SFR-1104");
    }

    #[test]
    fn file_rule_requires_existing_folder_rule() {
        let mut set = VolumeSet::new();
        set.add_volume("/data", 0, 0).unwrap();
        let err = set
            .add_file_rule("/data", "/data/logs", "log", 7)
            .unwrap_err();
        assert_eq!(err.code(), "SFR-1105");

        let err = set
            .add_file_rule("/other", "/other/logs", "log", 7)
            .unwrap_err();
        assert_eq!(err.code(), "SFR-1104");
    }

    #[test]
    fn duplicate_folder_rule_preserves_nested_file_rules() {
        let mut set = VolumeSet::new();
        set.add_volume("/data", 0, 0).unwrap();
        set.add_folder_rule("/data", "/data/logs", FolderOptions::default())
            .unwrap();
        set.add_file_rule("/data", "/data/logs", "log", 7).unwrap();

        let err = set
            .add_folder_rule(
                "/data",
                "/data/logs",
                FolderOptions {
                    delete_folder_if_empty: true,
                    ..FolderOptions::default()
                },
            )
            .unwrap_err();
        assert_eq!(err.code(), "SFR-1102");

        let vol = set.volume("/data").unwrap();
        let rule = vol.folder_rules().next().unwrap();
        assert_eq!(rule.file_rule_count(), 1, "nested file rules intact");
        assert!(!rule.deletes_empty_at(0), "first registration's flags intact");
    }

    #[test]
    fn duplicate_file_rule_reports_error() {
        let mut set = VolumeSet::new();
        set.add_volume("/data", 0, 0).unwrap();
        set.add_folder_rule("/data", "/data/logs", FolderOptions::default())
            .unwrap();
        set.add_file_rule("/data", "/data/logs", ".log", 7).unwrap();

        // Same extension spelled without the dot is the same key.
        let err = set
            .add_file_rule("/data", "/data/logs", "log", 30)
            .unwrap_err();
        assert_eq!(err.code(), "SFR-1103");
    }

    #[test]
    fn extension_is_normalized_to_leading_dot() {
        let rule = FileRule::new("tmp", 1);
        assert_eq!(rule.extension(), ".tmp");
        let rule = FileRule::new(".tmp", 1);
        assert_eq!(rule.extension(), ".tmp");
    }

    #[test]
    fn file_rule_matches_exact_extension() {
        let rule = FileRule::new("log", 7);
        assert!(rule.matches(Path::new("/data/a.log")));
        assert!(!rule.matches(Path::new("/data/a.log.gz")));
        assert!(!rule.matches(Path::new("/data/a.LOG")), "case-sensitive");
        assert!(!rule.matches(Path::new("/data/noext")));
    }

    #[test]
    fn registration_order_is_preserved() {
        let mut set = VolumeSet::new();
        set.add_volume("/c", 0, 0).unwrap();
        set.add_volume("/a", 0, 0).unwrap();
        set.add_volume("/b", 0, 0).unwrap();

        let roots: Vec<_> = set.volumes().map(|v| v.root().to_path_buf()).collect();
        assert_eq!(
            roots,
            vec![
                PathBuf::from("/c/"),
                PathBuf::from("/a/"),
                PathBuf::from("/b/")
            ]
        );
    }

    #[test]
    fn invalid_depth_window_resets_to_zero() {
        let window = DepthWindow::new(3, 1);
        assert_eq!(window.first(), 0);
        assert_eq!(window.last(), 0);
    }

    #[test]
    fn depth_window_gates_inspection_and_descent() {
        let window = DepthWindow::new(1, 2);
        assert!(!window.inspects(0));
        assert!(window.inspects(1));
        assert!(window.inspects(2));
        assert!(!window.inspects(3));
        assert!(window.descends_to(2));
        assert!(!window.descends_to(3));
    }

    #[test]
    fn min_free_bytes_uses_binary_gigabytes() {
        let mut set = VolumeSet::new();
        set.add_volume("/data", 3, 0).unwrap();
        assert_eq!(
            set.volume("/data").unwrap().min_free_bytes(),
            3 * 1024 * 1024 * 1024
        );
    }

    proptest! {
        #[test]
        fn depth_window_is_always_valid(first in 0u32..100, last in 0u32..100) {
            let window = DepthWindow::new(first, last);
            prop_assert!(window.first() <= window.last());
            if first <= last {
                prop_assert_eq!(window.first(), first);
                prop_assert_eq!(window.last(), last);
            } else {
                prop_assert_eq!(window.first(), 0);
                prop_assert_eq!(window.last(), 0);
            }
        }
    }
}
