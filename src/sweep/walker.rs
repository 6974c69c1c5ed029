//! Depth-bounded tree walker: age-based file deletion and empty-directory
//! pruning for a single folder rule.
//!
//! Traversal uses an explicit worklist of `(directory, depth, phase)` frames
//! rather than call-stack recursion. Each directory is visited twice: the
//! Enter phase evaluates its files and queues children, the Exit phase runs
//! after all descendants and evaluates emptiness. Directories strictly deeper
//! than the rule's `last_depth` are never pushed — the depth window is a hard
//! traversal bound, not a filter on deletions.

#![allow(missing_docs)]

use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};

use crate::core::errors::{Result, SfrError};
use crate::platform::pal::Filesystem;
use crate::rules::model::FolderRule;
use crate::sweep::age::is_stale;

/// Result of one walk over one folder rule.
///
/// Errors encountered mid-walk (a file vanishing between listing and
/// evaluation) are recorded here instead of aborting the walk.
#[derive(Debug, Default)]
pub struct WalkOutcome {
    /// Files deleted by age rules, with their sizes, in deletion order.
    pub deleted_files: Vec<(PathBuf, u64)>,
    /// Empty directories pruned, deepest first.
    pub deleted_dirs: Vec<PathBuf>,
    /// Non-fatal faults observed during the walk.
    pub errors: Vec<SfrError>,
}

impl WalkOutcome {
    #[must_use]
    pub fn bytes_freed(&self) -> u64 {
        self.deleted_files.iter().map(|(_, size)| size).sum()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Enter,
    Exit,
}

#[derive(Debug)]
struct Frame {
    dir: PathBuf,
    depth: u32,
    phase: Phase,
}

/// Applies one folder rule's age-based deletions and emptiness pruning.
pub struct TreeWalker<'a> {
    fs: &'a dyn Filesystem,
    now: DateTime<Local>,
}

impl<'a> TreeWalker<'a> {
    #[must_use]
    pub fn new(fs: &'a dyn Filesystem, now: DateTime<Local>) -> Self {
        Self { fs, now }
    }

    /// Walk `rule`'s tree, deleting aged files and pruning eligible empty
    /// directories.
    ///
    /// A missing rule root fails the whole walk with `FolderNotExisting`; the
    /// caller skips this rule for the current pass. Everything else is
    /// recorded in the outcome and the walk continues.
    pub fn walk(&self, rule: &FolderRule) -> Result<WalkOutcome> {
        if !self.fs.dir_exists(rule.path()) {
            return Err(SfrError::FolderNotExisting {
                path: rule.path().to_path_buf(),
            });
        }

        let window = rule.depth_window();
        let mut outcome = WalkOutcome::default();
        let mut stack = vec![Frame {
            dir: rule.path().to_path_buf(),
            depth: 0,
            phase: Phase::Enter,
        }];

        while let Some(frame) = stack.pop() {
            match frame.phase {
                Phase::Enter => {
                    if window.inspects(frame.depth) {
                        self.evaluate_files(rule, &frame.dir, &mut outcome);
                    }

                    // Exit frame first so it pops after all children.
                    stack.push(Frame {
                        dir: frame.dir.clone(),
                        depth: frame.depth,
                        phase: Phase::Exit,
                    });

                    if window.descends_to(frame.depth + 1) {
                        match self.fs.list_dirs(&frame.dir) {
                            Ok(children) => {
                                for child in children {
                                    stack.push(Frame {
                                        dir: child,
                                        depth: frame.depth + 1,
                                        phase: Phase::Enter,
                                    });
                                }
                            }
                            Err(err) => outcome.errors.push(err),
                        }
                    }
                }
                Phase::Exit => {
                    self.evaluate_emptiness(rule, &frame.dir, frame.depth, &mut outcome);
                }
            }
        }

        Ok(outcome)
    }

    /// Evaluate every direct file in `dir` against the rule's file rules.
    fn evaluate_files(&self, rule: &FolderRule, dir: &Path, outcome: &mut WalkOutcome) {
        let files = match self.fs.list_files(dir) {
            Ok(files) => files,
            Err(err) => {
                outcome.errors.push(err);
                return;
            }
        };

        for file in files {
            match self.decide(rule, &file) {
                Ok(Some(size)) => match self.fs.remove_file(&file) {
                    Ok(()) => outcome.deleted_files.push((file, size)),
                    Err(err) => outcome.errors.push(err),
                },
                Ok(None) => {}
                Err(err) => outcome.errors.push(err),
            }
        }
    }

    /// Decide whether `file` should be deleted under `rule`.
    ///
    /// File rules are consulted in registration order; evaluation stops at the
    /// first rule that marks the file eligible. Returns the file's size on a
    /// delete decision so the caller can account freed bytes, `None` to keep,
    /// or `FileNotExisting` when the file vanished between listing and
    /// evaluation.
    fn decide(&self, rule: &FolderRule, file: &Path) -> Result<Option<u64>> {
        for file_rule in rule.file_rules() {
            if !file_rule.matches(file) {
                continue;
            }
            if !self.fs.file_exists(file) {
                return Err(SfrError::FileNotExisting {
                    path: file.to_path_buf(),
                });
            }
            // The file can still vanish between the existence check and the
            // metadata read; report that as a missing file, not a raw IO fault.
            let meta = match self.fs.file_metadata(file) {
                Ok(meta) => meta,
                Err(SfrError::Io { path, source })
                    if source.kind() == std::io::ErrorKind::NotFound =>
                {
                    return Err(SfrError::FileNotExisting { path });
                }
                Err(err) => return Err(err),
            };
            if is_stale(meta.modified, self.now, file_rule.max_age_hours()) {
                return Ok(Some(meta.size_bytes));
            }
        }
        Ok(None)
    }

    /// Delete `dir` when it ended up empty and the rule's flags allow it at
    /// this depth. Runs after files and descendants were handled.
    fn evaluate_emptiness(
        &self,
        rule: &FolderRule,
        dir: &Path,
        depth: u32,
        outcome: &mut WalkOutcome,
    ) {
        if !rule.deletes_empty_at(depth) {
            return;
        }
        let (files, dirs) = match (self.fs.list_files(dir), self.fs.list_dirs(dir)) {
            (Ok(files), Ok(dirs)) => (files, dirs),
            // Directory gone or unreadable at exit time: nothing to prune.
            _ => return,
        };
        if files.is_empty() && dirs.is_empty() {
            match self.fs.remove_dir(dir) {
                Ok(()) => outcome.deleted_dirs.push(dir.to_path_buf()),
                Err(err) => outcome.errors.push(err),
            }
        }
    }
}
