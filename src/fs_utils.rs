// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::{debug, warn};
use walkdir::WalkDir;

/// Totals of everything removed during a run. Shared between the sequential
/// cleanup steps and the verification workers.
#[derive(Debug, Default)]
pub struct RemovalCounters {
    files: AtomicU64,
    bytes: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RemovalSummary {
    pub files: u64,
    pub bytes: u64,
}

impl RemovalCounters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, bytes: u64) {
        self.bytes.fetch_add(bytes, Ordering::Relaxed);
        self.files.fetch_add(1, Ordering::Relaxed);
    }

    pub fn files(&self) -> u64 {
        self.files.load(Ordering::Relaxed)
    }

    pub fn bytes(&self) -> u64 {
        self.bytes.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> RemovalSummary {
        RemovalSummary {
            files: self.files(),
            bytes: self.bytes(),
        }
    }
}

/// Deletes files and directory trees, accounting every removal in the shared
/// counters. In dry-run mode the counters and log lines are produced as usual
/// but nothing is touched on disk.
#[derive(Debug, Clone)]
pub struct Remover {
    dry_run: bool,
    counters: Arc<RemovalCounters>,
}

impl Remover {
    pub fn new(dry_run: bool, counters: Arc<RemovalCounters>) -> Self {
        Self { dry_run, counters }
    }

    pub fn counters(&self) -> &RemovalCounters {
        &self.counters
    }

    /// Removes a single file, printing the outcome. Returns true if the file
    /// was removed (or would have been, in dry-run mode). An existing file is
    /// counted even when the removal fails.
    pub fn remove_file(&self, path: &Path) -> bool {
        self.remove_entry(path, false)
    }

    /// Removes `root` and everything below it. Symbolic links are removed but
    /// never followed, and every directory is emptied before its own removal
    /// is attempted. A missing root is not an error.
    pub fn remove_tree(&self, root: &Path, label: &str, silent: bool) {
        if fs::symlink_metadata(root).is_err() {
            debug!("{} does not exist, won't remove it", root.display());
            return;
        }

        println!("Removing {label}: {}", root.display());
        let walker = WalkDir::new(root)
            .follow_links(false)
            .follow_root_links(false)
            .contents_first(true);
        for entry in walker {
            match entry {
                Ok(entry) => {
                    self.remove_entry(entry.path(), silent);
                }
                Err(err) => {
                    // Entries that vanished mid-walk are reported here too.
                    let path = err.path().unwrap_or(root).display().to_string();
                    warn!("Cannot list {path}: {err}");
                }
            }
        }
    }

    fn remove_entry(&self, path: &Path, silent: bool) -> bool {
        let metadata = match fs::symlink_metadata(path) {
            Ok(metadata) => metadata,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!("File {} does not exist, won't remove it", path.display());
                return false;
            }
            Err(err) => {
                eprintln!("Unable to remove {}: {err}", path.display());
                return false;
            }
        };

        let is_dir = metadata.is_dir();
        let size = if is_dir { 0 } else { metadata.len() };
        // Counted once found, whether or not the removal below succeeds.
        self.counters.record(size);

        if !self.dry_run {
            let result = if is_dir {
                fs::remove_dir(path)
            } else {
                fs::remove_file(path)
            };
            match result {
                Ok(()) => {}
                Err(err) if err.kind() == ErrorKind::NotFound => {
                    debug!("File {} disappeared before removal", path.display());
                    return false;
                }
                Err(err) => {
                    eprintln!("Unable to remove {}: {err}", path.display());
                    return false;
                }
            }
        }

        if !silent {
            println!("Removed {}", path.display());
        }
        true
    }
}

/// Renders a byte count with a binary unit, e.g. `1.50 KB`.
pub fn format_file_size(size: u64) -> String {
    const UNITS: [&str; 7] = ["B", "KB", "MB", "GB", "TB", "PB", "EB"];

    let mut unit = 0;
    let mut value = size as f64;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }

    match (unit, value) {
        (0, _) => format!("{size} B"),
        (_, v) if v < 10.0 => format!("{v:.2} {}", UNITS[unit]),
        (_, v) if v < 100.0 => format!("{v:.1} {}", UNITS[unit]),
        (_, v) => format!("{v:.0} {}", UNITS[unit]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(path: &Path, contents: &[u8]) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    fn remover(dry_run: bool) -> Remover {
        Remover::new(dry_run, Arc::new(RemovalCounters::new()))
    }

    #[test]
    fn remove_file_counts_size() {
        let temp = tempfile::TempDir::new().unwrap();
        let file = temp.path().join("journal-1.lock");
        write(&file, b"0123456789");

        let remover = remover(false);
        assert!(remover.remove_file(&file));
        assert!(!file.exists());
        assert_eq!(
            remover.counters().snapshot(),
            RemovalSummary {
                files: 1,
                bytes: 10
            }
        );
    }

    #[test]
    fn remove_missing_file_is_noop() {
        let temp = tempfile::TempDir::new().unwrap();
        let remover = remover(false);

        assert!(!remover.remove_file(&temp.path().join("user-id.txt")));
        assert_eq!(remover.counters().snapshot(), RemovalSummary::default());
    }

    #[test]
    fn dry_run_counts_without_deleting() {
        let temp = tempfile::TempDir::new().unwrap();
        let file = temp.path().join("modules-2.lock");
        write(&file, b"abc");

        let remover = remover(true);
        assert!(remover.remove_file(&file));
        assert!(file.exists());
        assert_eq!(remover.counters().files(), 1);
        assert_eq!(remover.counters().bytes(), 3);
    }

    #[test]
    fn remove_tree_empties_children_first() {
        let temp = tempfile::TempDir::new().unwrap();
        let root = temp.path().join("gradle-7.3-bin");
        write(&root.join("a/b/c/deep.txt"), b"1234");
        write(&root.join("a/top.txt"), b"12");
        write(&root.join("gradle-7.3-bin.zip"), b"zip");

        let remover = remover(false);
        remover.remove_tree(&root, "stale wrapper distribution", true);

        // remove_dir refuses non-empty directories, so a full removal proves
        // the children went first.
        assert!(!root.exists());
        let summary = remover.counters().snapshot();
        // 3 files + a, a/b, a/b/c and the root itself
        assert_eq!(summary.files, 7);
        assert_eq!(summary.bytes, 9);
    }

    #[test]
    fn remove_tree_dry_run_keeps_everything() {
        let temp = tempfile::TempDir::new().unwrap();
        let root = temp.path().join("7.3");
        write(&root.join("file-changes/last-build.bin"), b"12345");

        let remover = remover(true);
        remover.remove_tree(&root, "cache from old Gradle version", false);

        assert!(root.join("file-changes/last-build.bin").exists());
        assert_eq!(
            remover.counters().snapshot(),
            RemovalSummary { files: 3, bytes: 5 }
        );
    }

    #[test]
    fn remove_tree_on_missing_root_is_noop() {
        let temp = tempfile::TempDir::new().unwrap();
        let remover = remover(false);
        remover.remove_tree(&temp.path().join("absent"), "unzipped distribution", true);
        assert_eq!(remover.counters().snapshot(), RemovalSummary::default());
    }

    #[cfg(unix)]
    #[test]
    fn remove_tree_does_not_follow_symlinks() {
        let temp = tempfile::TempDir::new().unwrap();
        let outside = temp.path().join("outside");
        write(&outside.join("precious.txt"), b"keep me");

        let root = temp.path().join("unzipped-distribution");
        fs::create_dir_all(&root).unwrap();
        std::os::unix::fs::symlink(&outside, root.join("link")).unwrap();

        let remover = remover(false);
        remover.remove_tree(&root, "unzipped distribution", true);

        assert!(!root.exists());
        assert!(outside.join("precious.txt").exists());
    }

    #[test]
    fn counters_survive_concurrent_updates() {
        let counters = Arc::new(RemovalCounters::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let counters = Arc::clone(&counters);
                std::thread::spawn(move || {
                    for _ in 0..1000 {
                        counters.record(2);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(counters.files(), 8000);
        assert_eq!(counters.bytes(), 16000);
    }

    #[test]
    fn failed_removal_is_still_counted() {
        let temp = tempfile::TempDir::new().unwrap();
        let dir = temp.path().join("caches/7.3");
        write(&dir.join("fileHashes.bin"), b"123");

        // remove_dir refuses a directory that still has contents.
        let remover = remover(false);
        assert!(!remover.remove_entry(&dir, true));
        assert!(dir.exists());
        assert_eq!(
            remover.counters().snapshot(),
            RemovalSummary { files: 1, bytes: 0 }
        );
    }

    #[test]
    fn test_format_file_size() {
        assert_eq!(format_file_size(0), "0 B");
        assert_eq!(format_file_size(512), "512 B");
        assert_eq!(format_file_size(1536), "1.50 KB");
        assert_eq!(format_file_size(50 * 1024 * 1024), "50.0 MB");
        assert_eq!(format_file_size(300 * 1024 * 1024 * 1024), "300 GB");
    }
}
