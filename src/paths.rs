// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

use anyhow::{Error, anyhow};
use std::env;
use std::path::{Path, PathBuf};

pub const GRADLE_USER_HOME: &str = "GRADLE_USER_HOME";

/// Location of the wrapper descriptor, relative to the project directory.
pub const WRAPPER_PROPERTIES: &str = "gradle/wrapper/gradle-wrapper.properties";

pub const UNZIPPED_DISTRIBUTION: &str = "unzipped-distribution";

/// Resolves the Gradle user home the same way Gradle does: `GRADLE_USER_HOME`
/// if set, `~/.gradle` otherwise.
pub fn get_gradle_user_home() -> Result<PathBuf, Error> {
    if let Some(home) = env::var_os(GRADLE_USER_HOME).filter(|v| !v.is_empty()) {
        return Ok(PathBuf::from(home));
    }
    default_gradle_user_home()
}

pub fn default_gradle_user_home() -> Result<PathBuf, Error> {
    dirs::home_dir()
        .map(|home| home.join(".gradle"))
        .ok_or_else(|| anyhow!("Cannot determine the home directory; pass --gradle-user-home"))
}

/// Well-known locations inside a Gradle user home.
#[derive(Debug, Clone)]
pub struct GradleLayout {
    root: PathBuf,
}

impl GradleLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn caches_dir(&self) -> PathBuf {
        self.root.join("caches")
    }

    pub fn lock_files(&self) -> [PathBuf; 2] {
        let caches = self.caches_dir();
        [
            caches.join("journal-1").join("journal-1.lock"),
            caches.join("modules-2").join("modules-2.lock"),
        ]
    }

    pub fn user_id_files(&self) -> [PathBuf; 2] {
        let caches = self.caches_dir();
        [caches.join("user-id.txt"), caches.join("user-id.txt.lock")]
    }

    pub fn transforms_files_dir(&self) -> PathBuf {
        self.caches_dir().join("transforms-2").join("files-2.1")
    }

    pub fn modules_files_dir(&self) -> PathBuf {
        self.caches_dir().join("modules-2").join("files-2.1")
    }

    pub fn wrapper_dists_dir(&self) -> PathBuf {
        self.root.join("wrapper").join("dists")
    }
}
