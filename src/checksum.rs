// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Content hashing and the rules deciding which cache files carry an
//! expected checksum in their path.
//!
//! Gradle stores every module artifact as `files-2.1/<group>/<module>/<version>/<sha1>/<file>`,
//! where `<sha1>` is the file's SHA-1 printed as an unsigned base-16 number,
//! so leading zeros are not part of the directory name.

use std::cell::RefCell;
use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use lazy_static::lazy_static;
use regex::Regex;
use sha1::{Digest, Sha1};
use walkdir::DirEntry;

const BUF_SIZE: usize = 64 * 1024;

lazy_static! {
    static ref IS_HEX: Regex = Regex::new("^[0-9a-f]+$").expect("hex pattern is valid");
}

/// A SHA-1 context with its own read buffer. Never shared between threads;
/// each verification worker owns one through [`compute_checksum`].
pub struct Checksum {
    digest: Sha1,
    buffer: Box<[u8]>,
}

impl Default for Checksum {
    fn default() -> Self {
        Self::new()
    }
}

impl Checksum {
    pub fn new() -> Self {
        Self {
            digest: Sha1::new(),
            buffer: vec![0u8; BUF_SIZE].into_boxed_slice(),
        }
    }

    /// Hash the file at `path` in fixed-size chunks.
    pub fn compute(&mut self, path: &Path) -> Result<String> {
        // A failed read can leave partial input behind.
        self.digest.reset();
        let mut file = File::open(path).with_context(|| format!("open {}", path.display()))?;
        loop {
            let n = file
                .read(&mut self.buffer)
                .with_context(|| format!("read {}", path.display()))?;
            if n == 0 {
                break;
            }
            self.digest.update(&self.buffer[..n]);
        }
        Ok(digest_to_hex(&self.digest.finalize_reset()))
    }
}

thread_local! {
    static CHECKSUM: RefCell<Checksum> = RefCell::new(Checksum::new());
}

/// Hash `path` with the calling thread's own [`Checksum`].
pub fn compute_checksum(path: &Path) -> Result<String> {
    CHECKSUM.with(|checksum| checksum.borrow_mut().compute(path))
}

/// Render a digest as Gradle names its cache directories: lowercase hex with
/// leading zeros stripped.
pub fn digest_to_hex(digest: &[u8]) -> String {
    let hex = hex::encode(digest);
    let trimmed = hex.trim_start_matches('0');
    if trimmed.is_empty() {
        "0".to_string()
    } else {
        trimmed.to_string()
    }
}

pub fn is_hex_name(name: &str) -> bool {
    IS_HEX.is_match(name)
}

/// A single entry found while walking the verified tree.
#[derive(Debug, Clone)]
pub struct ScanTask {
    pub path: PathBuf,
    pub is_file: bool,
    pub is_dir: bool,
}

impl From<DirEntry> for ScanTask {
    fn from(entry: DirEntry) -> Self {
        let file_type = entry.file_type();
        Self {
            is_file: file_type.is_file(),
            is_dir: file_type.is_dir(),
            path: entry.into_path(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    NotAFile,
    NoParentDirectory,
    ParentNotHex,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::NotAFile => write!(f, "not a regular file"),
            SkipReason::NoParentDirectory => write!(f, "filename is too short"),
            SkipReason::ParentNotHex => {
                write!(f, "directory name should look like a checksum {}", IS_HEX.as_str())
            }
        }
    }
}

/// The checksum a file is expected to have, taken from its parent directory name.
pub fn expected_checksum(task: &ScanTask) -> Result<&str, SkipReason> {
    if !task.is_file {
        return Err(SkipReason::NotAFile);
    }
    let dir_name = task
        .path
        .parent()
        .and_then(Path::file_name)
        .ok_or(SkipReason::NoParentDirectory)?;
    match dir_name.to_str() {
        Some(name) if is_hex_name(name) => Ok(name),
        _ => Err(SkipReason::ParentNotHex),
    }
}

pub fn is_verifiable(task: &ScanTask) -> bool {
    expected_checksum(task).is_ok()
}
