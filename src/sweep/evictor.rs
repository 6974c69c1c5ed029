//! Free-space eviction: oldest-first deletion until a volume's deficit is
//! covered.
//!
//! Candidate collection reuses the walker's depth bounding but skips the Exit
//! phase and all extension/age filtering: once a volume is below its free-space
//! floor, every file inside any of its folder rules' depth windows is eligible,
//! whatever its type. Candidates are ranked by last-write time and deleted in
//! order until the accumulated freed bytes reach or cross the deficit.

#![allow(missing_docs)]

use std::path::PathBuf;
use std::time::SystemTime;

use crate::core::errors::{Result, SfrError};
use crate::platform::pal::Filesystem;
use crate::rules::model::Volume;

/// Result of one eviction attempt against one volume.
#[derive(Debug, Default)]
pub struct EvictionOutcome {
    /// Byte shortfall at the start of the eviction; zero means no action.
    pub deficit_bytes: u64,
    /// Bytes reclaimed. May overshoot the deficit by at most the size of the
    /// last file deleted, never by an extra file.
    pub bytes_freed: u64,
    /// Files deleted, oldest first, with their sizes.
    pub deleted_files: Vec<(PathBuf, u64)>,
    /// Non-fatal faults observed while collecting or deleting.
    pub errors: Vec<SfrError>,
}

#[derive(Debug)]
struct Candidate {
    path: PathBuf,
    size_bytes: u64,
    modified: SystemTime,
}

/// Evicts the minimal oldest-first file prefix needed to restore a volume's
/// free-space floor.
pub struct SpaceEvictor<'a> {
    fs: &'a dyn Filesystem,
}

impl<'a> SpaceEvictor<'a> {
    #[must_use]
    pub const fn new(fs: &'a dyn Filesystem) -> Self {
        Self { fs }
    }

    /// Run eviction for one volume.
    ///
    /// Fails with `FreeSpaceQuery` when the volume cannot be queried; the
    /// caller skips this volume and moves on to the next.
    pub fn evict(&self, volume: &Volume) -> Result<EvictionOutcome> {
        let free_bytes = self.fs.free_space(volume.root())?;
        let min_free = volume.min_free_bytes();
        if free_bytes >= min_free {
            return Ok(EvictionOutcome::default());
        }
        let deficit = min_free - free_bytes;

        let mut outcome = EvictionOutcome {
            deficit_bytes: deficit,
            ..EvictionOutcome::default()
        };

        let mut candidates = self.collect_candidates(volume, &mut outcome.errors);
        // Stable sort: ties keep encounter order.
        candidates.sort_by_key(|c| c.modified);

        for candidate in candidates {
            if outcome.bytes_freed >= deficit {
                break;
            }
            if !self.fs.file_exists(&candidate.path) {
                // Vanished since collection; does not count toward the deficit.
                outcome.errors.push(SfrError::FileNotExisting {
                    path: candidate.path,
                });
                continue;
            }
            match self.fs.remove_file(&candidate.path) {
                Ok(()) => {
                    outcome.bytes_freed += candidate.size_bytes;
                    outcome
                        .deleted_files
                        .push((candidate.path, candidate.size_bytes));
                }
                Err(err) => outcome.errors.push(err),
            }
        }

        Ok(outcome)
    }

    /// One combined candidate list across all of the volume's folder rules,
    /// Enter-phase depth bounding only.
    fn collect_candidates(&self, volume: &Volume, errors: &mut Vec<SfrError>) -> Vec<Candidate> {
        let mut candidates = Vec::new();

        for rule in volume.folder_rules() {
            if !self.fs.dir_exists(rule.path()) {
                errors.push(SfrError::FolderNotExisting {
                    path: rule.path().to_path_buf(),
                });
                continue;
            }

            let window = rule.depth_window();
            let mut stack = vec![(rule.path().to_path_buf(), 0u32)];

            while let Some((dir, depth)) = stack.pop() {
                if window.inspects(depth) {
                    match self.fs.list_files(&dir) {
                        Ok(files) => {
                            for file in files {
                                match self.fs.file_metadata(&file) {
                                    Ok(meta) => candidates.push(Candidate {
                                        path: file,
                                        size_bytes: meta.size_bytes,
                                        modified: meta.modified,
                                    }),
                                    Err(err) => errors.push(err),
                                }
                            }
                        }
                        Err(err) => errors.push(err),
                    }
                }
                if window.descends_to(depth + 1) {
                    match self.fs.list_dirs(&dir) {
                        Ok(children) => {
                            for child in children {
                                stack.push((child, depth + 1));
                            }
                        }
                        Err(err) => errors.push(err),
                    }
                }
            }
        }

        candidates
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::pal::{FileMeta, StdFilesystem};
    use crate::rules::model::{FolderOptions, VolumeSet};
    use std::fs;
    use std::path::Path;
    use std::time::Duration;
    use tempfile::TempDir;

    const GB: u64 = 1024 * 1024 * 1024;

    /// Wraps the real filesystem but pins the free-space answer and scales
    /// reported file sizes so small fixture files stand in for huge ones.
    struct PinnedFreeSpace {
        inner: StdFilesystem,
        free_bytes: u64,
        size_multiplier: u64,
    }

    impl Filesystem for PinnedFreeSpace {
        fn dir_exists(&self, path: &Path) -> bool {
            self.inner.dir_exists(path)
        }
        fn file_exists(&self, path: &Path) -> bool {
            self.inner.file_exists(path)
        }
        fn list_files(&self, dir: &Path) -> Result<Vec<PathBuf>> {
            self.inner.list_files(dir)
        }
        fn list_dirs(&self, dir: &Path) -> Result<Vec<PathBuf>> {
            self.inner.list_dirs(dir)
        }
        fn file_metadata(&self, path: &Path) -> Result<FileMeta> {
            let meta = self.inner.file_metadata(path)?;
            Ok(FileMeta {
                size_bytes: meta.size_bytes * self.size_multiplier,
                modified: meta.modified,
            })
        }
        fn remove_file(&self, path: &Path) -> Result<()> {
            self.inner.remove_file(path)
        }
        fn remove_dir(&self, path: &Path) -> Result<()> {
            self.inner.remove_dir(path)
        }
        fn free_space(&self, _root: &Path) -> Result<u64> {
            Ok(self.free_bytes)
        }
    }

    fn volume_with_rule(root: &Path, min_free_gb: u64) -> Volume {
        let mut set = VolumeSet::new();
        set.add_volume("/", min_free_gb, 0).unwrap();
        set.add_folder_rule("/", root, FolderOptions::default())
            .unwrap();
        set.volumes().next().unwrap().clone()
    }

    fn write_aged(dir: &Path, name: &str, bytes: usize, age_days: u64) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, vec![0u8; bytes]).unwrap();
        let mtime = SystemTime::now() - Duration::from_secs(age_days * 24 * 3600);
        filetime::set_file_mtime(&path, filetime::FileTime::from_system_time(mtime)).unwrap();
        path
    }

    #[test]
    fn no_eviction_when_free_space_sufficient() {
        let tmp = TempDir::new().unwrap();
        write_aged(tmp.path(), "a.dat", 1, 10);

        let fs_impl = PinnedFreeSpace {
            inner: StdFilesystem::new(),
            free_bytes: 200 * GB,
            size_multiplier: 1,
        };
        let volume = volume_with_rule(tmp.path(), 100);
        let outcome = SpaceEvictor::new(&fs_impl).evict(&volume).unwrap();

        assert_eq!(outcome.deficit_bytes, 0);
        assert!(outcome.deleted_files.is_empty());
        assert!(tmp.path().join("a.dat").exists());
    }

    #[test]
    fn zero_min_free_disables_eviction() {
        let tmp = TempDir::new().unwrap();
        write_aged(tmp.path(), "a.dat", 1, 10);

        let fs_impl = PinnedFreeSpace {
            inner: StdFilesystem::new(),
            free_bytes: 0,
            size_multiplier: 1,
        };
        let volume = volume_with_rule(tmp.path(), 0);
        let outcome = SpaceEvictor::new(&fs_impl).evict(&volume).unwrap();

        assert_eq!(outcome.deficit_bytes, 0);
        assert!(tmp.path().join("a.dat").exists());
    }

    #[test]
    fn deletes_minimal_oldest_first_prefix() {
        // Spec scenario: min 100 GB, free 50 GB, three 20 GB files oldest to
        // newest A, B, C. All three go: 20 < 50, 40 < 50, 60 >= 50 stops.
        let tmp = TempDir::new().unwrap();
        let a = write_aged(tmp.path(), "a.dat", 20, 30);
        let b = write_aged(tmp.path(), "b.dat", 20, 20);
        let c = write_aged(tmp.path(), "c.dat", 20, 10);

        let fs_impl = PinnedFreeSpace {
            inner: StdFilesystem::new(),
            free_bytes: 50 * GB,
            size_multiplier: GB,
        };
        let volume = volume_with_rule(tmp.path(), 100);
        let outcome = SpaceEvictor::new(&fs_impl).evict(&volume).unwrap();

        assert_eq!(outcome.deficit_bytes, 50 * GB);
        assert_eq!(outcome.bytes_freed, 60 * GB);
        assert_eq!(
            outcome
                .deleted_files
                .iter()
                .map(|(p, _)| p.clone())
                .collect::<Vec<_>>(),
            vec![a, b, c],
            "oldest first"
        );
        assert!(fs::read_dir(tmp.path()).unwrap().next().is_none());
    }

    #[test]
    fn stops_once_deficit_is_reached() {
        let tmp = TempDir::new().unwrap();
        write_aged(tmp.path(), "old.dat", 60, 30);
        let newer = write_aged(tmp.path(), "new.dat", 20, 1);

        let fs_impl = PinnedFreeSpace {
            inner: StdFilesystem::new(),
            free_bytes: 50 * GB,
            size_multiplier: GB,
        };
        let volume = volume_with_rule(tmp.path(), 100);
        let outcome = SpaceEvictor::new(&fs_impl).evict(&volume).unwrap();

        // The 60 GB oldest file alone covers the 50 GB deficit.
        assert_eq!(outcome.deleted_files.len(), 1);
        assert_eq!(outcome.bytes_freed, 60 * GB);
        assert!(newer.exists(), "no file deleted past the deficit");
    }

    #[test]
    fn eviction_ignores_extension_and_age_rules() {
        let tmp = TempDir::new().unwrap();
        // Fresh file with an extension no file rule would ever cover.
        let fresh = write_aged(tmp.path(), "fresh.db", 60, 0);

        let mut set = VolumeSet::new();
        set.add_volume("/", 100, 0).unwrap();
        set.add_folder_rule("/", tmp.path(), FolderOptions::default())
            .unwrap();
        set.add_file_rule("/", tmp.path(), "log", 7).unwrap();
        let volume = set.volumes().next().unwrap().clone();

        let fs_impl = PinnedFreeSpace {
            inner: StdFilesystem::new(),
            free_bytes: 50 * GB,
            size_multiplier: GB,
        };
        let outcome = SpaceEvictor::new(&fs_impl).evict(&volume).unwrap();

        assert!(!fresh.exists(), "any file type is eligible for eviction");
        assert_eq!(outcome.bytes_freed, 60 * GB);
    }

    #[test]
    fn candidates_respect_depth_window() {
        let tmp = TempDir::new().unwrap();
        let in_window = write_aged(tmp.path(), "top.dat", 60, 10);
        let deep = tmp.path().join("a").join("b");
        fs::create_dir_all(&deep).unwrap();
        let out_of_window = write_aged(&deep, "deep.dat", 60, 50);

        let mut set = VolumeSet::new();
        set.add_volume("/", 100, 0).unwrap();
        set.add_folder_rule(
            "/",
            tmp.path(),
            FolderOptions {
                first_depth: 0,
                last_depth: 1,
                ..FolderOptions::default()
            },
        )
        .unwrap();
        let volume = set.volumes().next().unwrap().clone();

        let fs_impl = PinnedFreeSpace {
            inner: StdFilesystem::new(),
            free_bytes: 50 * GB,
            size_multiplier: GB,
        };
        SpaceEvictor::new(&fs_impl).evict(&volume).unwrap();

        assert!(!in_window.exists());
        assert!(
            out_of_window.exists(),
            "depth-2 file is older but outside the window"
        );
    }

    #[test]
    fn free_space_query_failure_propagates() {
        struct FailingQuery;
        impl Filesystem for FailingQuery {
            fn dir_exists(&self, _: &Path) -> bool {
                true
            }
            fn file_exists(&self, _: &Path) -> bool {
                false
            }
            fn list_files(&self, _: &Path) -> Result<Vec<PathBuf>> {
                Ok(Vec::new())
            }
            fn list_dirs(&self, _: &Path) -> Result<Vec<PathBuf>> {
                Ok(Vec::new())
            }
            fn file_metadata(&self, path: &Path) -> Result<FileMeta> {
                Err(SfrError::FileNotExisting {
                    path: path.to_path_buf(),
                })
            }
            fn remove_file(&self, _: &Path) -> Result<()> {
                Ok(())
            }
            fn remove_dir(&self, _: &Path) -> Result<()> {
                Ok(())
            }
            fn free_space(&self, root: &Path) -> Result<u64> {
                Err(SfrError::FreeSpaceQuery {
                    root: root.to_path_buf(),
                    details: "simulated".to_string(),
                })
            }
        }

        let mut set = VolumeSet::new();
        set.add_volume("/", 100, 0).unwrap();
        let volume = set.volumes().next().unwrap().clone();

        let err = SpaceEvictor::new(&FailingQuery).evict(&volume).unwrap_err();
        assert_eq!(err.code(), "SFR-2101");
    }

    #[test]
    fn missing_rule_root_is_recorded_not_fatal() {
        let tmp = TempDir::new().unwrap();
        let present = write_aged(tmp.path(), "here.dat", 60, 10);

        let mut set = VolumeSet::new();
        set.add_volume("/", 100, 0).unwrap();
        set.add_folder_rule("/", tmp.path().join("gone"), FolderOptions::default())
            .unwrap();
        set.add_folder_rule("/", tmp.path(), FolderOptions::default())
            .unwrap();
        let volume = set.volumes().next().unwrap().clone();

        let fs_impl = PinnedFreeSpace {
            inner: StdFilesystem::new(),
            free_bytes: 50 * GB,
            size_multiplier: GB,
        };
        let outcome = SpaceEvictor::new(&fs_impl).evict(&volume).unwrap();

        assert!(!present.exists(), "other rules still contribute candidates");
        assert_eq!(outcome.errors.len(), 1);
        assert_eq!(outcome.errors[0].code(), "SFR-2001");
    }

    proptest::proptest! {
        /// The freed total is always the smallest oldest-first prefix sum that
        /// reaches or crosses the deficit.
        #[test]
        fn minimal_prefix_property(
            sizes in proptest::collection::vec(1u64..=64, 1..12),
            deficit_factor in 1u64..100,
        ) {
            let total: u64 = sizes.iter().sum();
            let deficit = (total * deficit_factor / 100).max(1);

            // Model of the eviction loop over pre-sorted candidates.
            let mut freed = 0u64;
            let mut deleted = 0usize;
            for size in &sizes {
                if freed >= deficit {
                    break;
                }
                freed += size;
                deleted += 1;
            }

            if freed >= deficit && deleted > 0 {
                let without_last: u64 = sizes[..deleted - 1].iter().sum();
                proptest::prop_assert!(without_last < deficit, "last deletion was necessary");
            }
            if total >= deficit {
                proptest::prop_assert!(freed >= deficit, "deficit covered when coverable");
            }
        }
    }
}
