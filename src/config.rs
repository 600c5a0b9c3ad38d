// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

use std::path::PathBuf;
use std::time::Duration;

/// Default upper bound on how long the verification pass waits for its workers.
pub const DEFAULT_VERIFY_TIMEOUT: Duration = Duration::from_secs(120);

/// Settings for a single cleanup run. Built once at startup and never mutated.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub gradle_user_home: PathBuf,
    pub project_dir: PathBuf,
    pub dry_run: bool,
    pub keep_old_versions: bool,
    pub verify_checksums: bool,
    pub keep_lock_files: bool,
    pub keep_user_id: bool,
    pub keep_unzipped_distributions: bool,
    pub verify_timeout: Duration,
}

impl RunConfig {
    /// Configuration with every step enabled, matching a run without flags.
    pub fn new(gradle_user_home: impl Into<PathBuf>, project_dir: impl Into<PathBuf>) -> Self {
        Self {
            gradle_user_home: gradle_user_home.into(),
            project_dir: project_dir.into(),
            dry_run: false,
            keep_old_versions: false,
            verify_checksums: true,
            keep_lock_files: false,
            keep_user_id: false,
            keep_unzipped_distributions: false,
            verify_timeout: DEFAULT_VERIFY_TIMEOUT,
        }
    }
}
