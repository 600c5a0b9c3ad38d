// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{debug, error, warn};
use walkdir::WalkDir;

use crate::config::RunConfig;
use crate::fs_utils::{RemovalCounters, RemovalSummary, Remover, format_file_size};
use crate::paths::{GradleLayout, UNZIPPED_DISTRIBUTION, WRAPPER_PROPERTIES};
use crate::verify::verify_subtree;
use crate::wrapper::WrapperDistribution;

type Step = fn(&Cleanup) -> Result<()>;

/// One cleanup run over a Gradle user home. Every step is attempted even if
/// an earlier one failed.
pub struct Cleanup {
    config: RunConfig,
    layout: GradleLayout,
    remover: Remover,
}

impl Cleanup {
    pub fn new(config: RunConfig) -> Self {
        let layout = GradleLayout::new(&config.gradle_user_home);
        let remover = Remover::new(config.dry_run, Arc::new(RemovalCounters::new()));
        Self {
            config,
            layout,
            remover,
        }
    }

    pub fn layout(&self) -> &GradleLayout {
        &self.layout
    }

    pub fn run(&self) -> RemovalSummary {
        let steps: [(&str, Step); 5] = [
            ("Lock file removal", Cleanup::remove_lock_files),
            ("User id removal", Cleanup::remove_user_id),
            (
                "Unzipped distribution removal",
                Cleanup::remove_unzipped_distributions,
            ),
            ("Version dependent cleanup", Cleanup::version_dependent_cleanup),
            ("Checksum verification", Cleanup::verify_checksums),
        ];

        for (name, step) in steps {
            if let Err(err) = step(self) {
                error!("{name} failed: {err:#}");
            }
        }

        self.remover.counters().snapshot()
    }

    fn remove_lock_files(&self) -> Result<()> {
        if self.config.keep_lock_files {
            debug!("Removal of journal-1.lock and modules-2.lock is disabled");
            return Ok(());
        }
        for file in self.layout.lock_files() {
            self.remover.remove_file(&file);
        }
        Ok(())
    }

    fn remove_user_id(&self) -> Result<()> {
        if self.config.keep_user_id {
            debug!("Removal of caches/user-id.txt is disabled");
            return Ok(());
        }
        for file in self.layout.user_id_files() {
            self.remover.remove_file(&file);
        }
        Ok(())
    }

    fn remove_unzipped_distributions(&self) -> Result<()> {
        if self.config.keep_unzipped_distributions {
            debug!("Removal of unzipped-distribution is disabled");
            return Ok(());
        }
        let root = self.layout.transforms_files_dir();
        if !root.is_dir() {
            debug!(
                "{} is not a directory, so will skip unzipped-distribution removal",
                root.display()
            );
            return Ok(());
        }

        let mut entries = WalkDir::new(&root)
            .min_depth(1)
            .max_depth(2)
            .follow_links(false)
            .into_iter();
        while let Some(entry) = entries.next() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    warn!("Cannot list entry below {}: {err}", root.display());
                    continue;
                }
            };
            if entry.file_name() != UNZIPPED_DISTRIBUTION {
                continue;
            }
            let is_dir = entry.file_type().is_dir();
            self.remover
                .remove_tree(entry.path(), "unzipped distribution", true);
            if is_dir {
                entries.skip_current_dir();
            }
        }
        Ok(())
    }

    /// Reads the wrapper descriptor once and prunes distributions and
    /// per-version caches that do not belong to the pinned version.
    fn version_dependent_cleanup(&self) -> Result<()> {
        let distribution = match WrapperDistribution::load(&self.config.project_dir) {
            Ok(Some(distribution)) => Some(distribution),
            Ok(None) => {
                warn!(
                    "Gradle wrapper properties file is not found: {}",
                    self.config.project_dir.join(WRAPPER_PROPERTIES).display()
                );
                None
            }
            Err(err) => {
                warn!("Cannot use Gradle wrapper properties: {err:#}");
                None
            }
        };

        let (dists_dir, keep_name) = match &distribution {
            Some(distribution) => (
                distribution
                    .distributions_dir(&self.config.gradle_user_home, &self.config.project_dir),
                Some(distribution.distribution_name()),
            ),
            None => {
                // Every archive goes, including one a concurrent build may be using.
                warn!("Distribution version is unknown, removing archives of all distributions");
                (self.layout.wrapper_dists_dir(), None)
            }
        };

        if let Err(err) = self.remove_stale_wrappers(&dists_dir, keep_name) {
            error!("Stale distribution removal failed: {err:#}");
        }

        if self.config.keep_old_versions {
            debug!("Removal of caches from old Gradle versions is disabled");
        } else if let Some(distribution) = &distribution {
            self.remove_stale_caches(distribution.distribution_version())?;
        }
        Ok(())
    }

    fn remove_stale_wrappers(&self, distributions: &Path, keep_name: Option<&str>) -> Result<()> {
        let keep_name = keep_name.filter(|_| !self.config.keep_old_versions);
        match keep_name {
            Some(name) => println!(
                "Removing old Gradle distributions from {} (will keep {name})",
                distributions.display()
            ),
            None => println!("Removing zip files from {}", distributions.display()),
        }

        let entries = match fs::read_dir(distributions) {
            Ok(entries) => entries,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!("{} does not exist", distributions.display());
                return Ok(());
            }
            Err(err) => {
                return Err(err)
                    .with_context(|| format!("Cannot list {}", distributions.display()));
            }
        };

        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    warn!("Cannot list entry below {}: {err}", distributions.display());
                    continue;
                }
            };
            let path = entry.path();
            match keep_name {
                Some(name) if entry.file_name().to_str() != Some(name) => {
                    self.remover
                        .remove_tree(&path, "stale wrapper distribution", true);
                }
                _ => self.remove_distribution_zips(&path),
            }
        }
        Ok(())
    }

    fn remove_distribution_zips(&self, distribution: &Path) {
        println!("Removing distribution zip from {}", distribution.display());
        for entry in WalkDir::new(distribution).max_depth(2).follow_links(false) {
            match entry {
                Ok(entry) => {
                    let is_zip = entry.file_name().to_string_lossy().ends_with(".zip");
                    if is_zip && !entry.file_type().is_dir() {
                        self.remover.remove_file(entry.path());
                    }
                }
                Err(err) => warn!("Cannot list entry below {}: {err}", distribution.display()),
            }
        }
    }

    fn remove_stale_caches(&self, version: &str) -> Result<()> {
        println!("Removing caches from the stale versions");
        let caches = self.layout.caches_dir();
        let entries = match fs::read_dir(&caches) {
            Ok(entries) => entries,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(()),
            Err(err) => {
                return Err(err).with_context(|| format!("Cannot list {}", caches.display()));
            }
        };

        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    warn!("Cannot list entry below {}: {err}", caches.display());
                    continue;
                }
            };
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            let versioned = name.starts_with(|c: char| c.is_ascii_digit());
            if versioned && name != version {
                self.remover
                    .remove_tree(&entry.path(), "cache from old Gradle version", true);
            }
        }
        Ok(())
    }

    fn verify_checksums(&self) -> Result<()> {
        if !self.config.verify_checksums {
            debug!("Checksum verification is disabled");
            return Ok(());
        }
        let root = self.layout.modules_files_dir();
        println!("Verifying checksums in {}", root.display());
        verify_subtree(&root, &self.remover, self.config.verify_timeout)?;
        Ok(())
    }
}

/// Handles a full cleanup run and prints the summary line.
pub fn handle_cleanup(config: RunConfig) -> Result<RemovalSummary> {
    println!("Gradle cache cleanup utility");
    if config.dry_run {
        println!("Dry run: nothing will be removed");
    }
    let cleanup = Cleanup::new(config);
    debug!("Gradle user home: {}", cleanup.layout().root().display());

    let summary = cleanup.run();
    println!(
        "Removed {} files, {} bytes ({})",
        summary.files,
        summary.bytes,
        format_file_size(summary.bytes)
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn touch(path: PathBuf, contents: &[u8]) -> PathBuf {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn unzipped_distributions_within_two_levels() {
        let temp = tempfile::TempDir::new().unwrap();
        let config = RunConfig::new(temp.path(), temp.path());
        let cleanup = Cleanup::new(config);
        let transforms = cleanup.layout().transforms_files_dir();

        let shallow = touch(transforms.join("abc/unzipped-distribution/gradle/bin/gradle"), b"#!");
        let deep = touch(
            transforms.join("abc/def/unzipped-distribution/gradle/bin/gradle"),
            b"#!",
        );
        let other = touch(transforms.join("abc/transformed/lib.jar"), b"jar");

        cleanup.remove_unzipped_distributions().unwrap();

        assert!(!shallow.exists());
        assert!(!transforms.join("abc/unzipped-distribution").exists());
        // Only two levels below files-2.1 are searched.
        assert!(deep.exists());
        assert!(other.exists());
    }

    #[test]
    fn stale_caches_only_touch_version_directories() {
        let temp = tempfile::TempDir::new().unwrap();
        let cleanup = Cleanup::new(RunConfig::new(temp.path(), temp.path()));
        let caches = cleanup.layout().caches_dir();

        let old = touch(caches.join("7.3/fileHashes/fileHashes.bin"), b"old");
        let current = touch(caches.join("7.4/fileHashes/fileHashes.bin"), b"new");
        let modules = touch(caches.join("modules-2/metadata.bin"), b"meta");

        cleanup.remove_stale_caches("7.4").unwrap();

        assert!(!old.exists());
        assert!(!caches.join("7.3").exists());
        assert!(current.exists());
        assert!(modules.exists());
    }

    #[cfg(unix)]
    #[test]
    fn stale_caches_continue_past_unusable_entries() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let temp = tempfile::TempDir::new().unwrap();
        let cleanup = Cleanup::new(RunConfig::new(temp.path(), temp.path()));
        let caches = cleanup.layout().caches_dir();

        let odd = caches.join(OsStr::from_bytes(b"7.\xff"));
        fs::create_dir_all(&odd).unwrap();
        let old = touch(caches.join("6.9/fileHashes/fileHashes.bin"), b"old");
        let older = touch(caches.join("5.0/fileHashes/fileHashes.bin"), b"older");

        cleanup.remove_stale_caches("7.4").unwrap();

        assert!(odd.exists());
        assert!(!old.exists());
        assert!(!older.exists());
    }

    #[test]
    fn missing_gradle_home_is_harmless() {
        let temp = tempfile::TempDir::new().unwrap();
        let home = temp.path().join("no-such-home");
        let summary = Cleanup::new(RunConfig::new(&home, temp.path())).run();
        assert_eq!(summary, RemovalSummary::default());
        assert!(!home.exists());
    }
}
