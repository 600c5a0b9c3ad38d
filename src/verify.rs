// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

use std::num::NonZeroUsize;
use std::path::Path;
use std::sync::Arc;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use tracing::{debug, error, warn};
use walkdir::WalkDir;

use crate::checksum::{ScanTask, SkipReason, compute_checksum, expected_checksum};
use crate::fs_utils::Remover;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerificationOutcome {
    Verified,
    Mismatch,
    Skipped(SkipReason),
    Error(String),
}

/// What a verification pass did, unit by unit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VerifyReport {
    pub verified: usize,
    pub mismatched: usize,
    pub skipped: usize,
    pub errors: usize,
    /// Units still running when the pass stopped waiting.
    pub outstanding: usize,
}

impl VerifyReport {
    fn record(&mut self, outcome: &VerificationOutcome) {
        match outcome {
            VerificationOutcome::Verified => self.verified += 1,
            VerificationOutcome::Mismatch => self.mismatched += 1,
            VerificationOutcome::Skipped(_) => self.skipped += 1,
            VerificationOutcome::Error(_) => self.errors += 1,
        }
    }

    pub fn completed(&self) -> usize {
        self.verified + self.mismatched + self.skipped + self.errors
    }
}

/// Checks a single walked entry against the checksum its path promises and
/// removes it when the content does not match.
pub fn verify_file(task: &ScanTask, remover: &Remover) -> VerificationOutcome {
    let expected = match expected_checksum(task) {
        Ok(expected) => expected,
        Err(reason) => {
            if reason != SkipReason::NotAFile {
                debug!("Skipping {}: {reason}", task.path.display());
            }
            return VerificationOutcome::Skipped(reason);
        }
    };

    let actual = match compute_checksum(&task.path) {
        Ok(actual) => actual,
        Err(err) => {
            // Never delete what could not be read.
            error!("Error while processing {}: {err:#}", task.path.display());
            return VerificationOutcome::Error(format!("{err:#}"));
        }
    };

    if expected == actual {
        return VerificationOutcome::Verified;
    }

    println!(
        "Checksum mismatch for {} (expected {expected}, actual: {actual})",
        task.path.display()
    );
    remover.remove_file(&task.path);
    VerificationOutcome::Mismatch
}

fn worker_count() -> usize {
    thread::available_parallelism()
        .map(NonZeroUsize::get)
        .unwrap_or(1)
}

/// Verifies every file below `root` on a worker pool sized to the machine.
///
/// Entries are pulled from the walk one at a time and handed to the pool as
/// independent jobs. The pass then waits for the jobs to report back, but no
/// longer than `timeout`; whatever is still running after that is left behind
/// and counted in [`VerifyReport::outstanding`].
pub fn verify_subtree(root: &Path, remover: &Remover, timeout: Duration) -> Result<VerifyReport> {
    let remover = remover.clone();
    run_units(root, timeout, move |task| verify_file(&task, &remover))
}

/// Walks `root` and runs `unit` once per entry on the worker pool, collecting
/// outcomes until every unit reported or `timeout` elapsed.
fn run_units<F>(root: &Path, timeout: Duration, unit: F) -> Result<VerifyReport>
where
    F: Fn(ScanTask) -> VerificationOutcome + Send + Sync + 'static,
{
    let mut report = VerifyReport::default();
    if !root.is_dir() {
        debug!(
            "{} is not a directory, so will skip checksum verification",
            root.display()
        );
        return Ok(report);
    }

    let workers = worker_count();
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers)
        .thread_name(|i| format!("verify-{i}"))
        .panic_handler(|_| error!("A checksum verification worker panicked"))
        .build()
        .context("Failed to start the checksum verification workers")?;
    debug!("Verifying with {workers} workers");

    let unit = Arc::new(unit);
    let (done_tx, done_rx) = mpsc::channel::<VerificationOutcome>();
    let mut scheduled = 0usize;
    for entry in WalkDir::new(root).follow_links(false) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                warn!("Cannot list entry below {}: {err}", root.display());
                continue;
            }
        };
        let task = ScanTask::from(entry);
        let unit = Arc::clone(&unit);
        let done_tx = done_tx.clone();
        scheduled += 1;
        pool.spawn(move || {
            let outcome = unit(task);
            // The receiver is gone once the pass has timed out.
            let _ = done_tx.send(outcome);
        });
    }
    drop(done_tx);

    // A timeout too large to represent means waiting for every unit.
    let deadline = Instant::now().checked_add(timeout);
    while report.completed() < scheduled {
        let received = match deadline {
            Some(deadline) => {
                done_rx.recv_timeout(deadline.saturating_duration_since(Instant::now()))
            }
            None => done_rx.recv().map_err(|_| RecvTimeoutError::Disconnected),
        };
        match received {
            Ok(outcome) => report.record(&outcome),
            Err(RecvTimeoutError::Timeout) => {
                report.outstanding = scheduled - report.completed();
                warn!(
                    "There are {} tasks still executing after {}s, not waiting for them",
                    report.outstanding,
                    timeout.as_secs()
                );
                break;
            }
            Err(RecvTimeoutError::Disconnected) => {
                // Every job is gone; the missing ones panicked.
                report.outstanding = scheduled - report.completed();
                break;
            }
        }
    }

    debug!(
        "Checksum verification finished: {} verified, {} mismatched, {} skipped, {} errors",
        report.verified, report.mismatched, report.skipped, report.errors
    );
    Ok(report)
}
