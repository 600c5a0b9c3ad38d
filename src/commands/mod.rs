// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

use std::ffi::OsString;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::error::ErrorKind;
use clap::{CommandFactory, Parser};

use crate::config::{DEFAULT_VERIFY_TIMEOUT, RunConfig};
use crate::handlers::cleanup::handle_cleanup;
use crate::paths::get_gradle_user_home;

/// Gradle cache cleanup utility.
///
/// Removes lock files, identity files, unzipped distributions and stale
/// Gradle versions from the Gradle user home, then verifies the checksums of
/// everything in caches/modules-2/files-2.1 and removes corrupted files.
#[derive(Parser, Debug)]
#[command(name = "gradle-cache-cleanup", version, about)]
pub struct Command {
    /// Print verbose output
    #[arg(long)]
    pub verbose: bool,

    /// Run as usual, however, avoid file removals
    #[arg(long)]
    pub dry_run: bool,

    /// Keep old Gradle distributions (by default, all are removed except the version in wrapper)
    #[arg(long)]
    pub keep_old_versions: bool,

    /// Keep journal-1.lock and modules-2.lock files
    #[arg(long)]
    pub keep_lock_files: bool,

    /// Keep user-id.txt and user-id.txt.lock files
    #[arg(long)]
    pub keep_user_id: bool,

    /// Keep transforms-2/.../unzipped-distribution directories
    #[arg(long)]
    pub keep_unzipped_distributions: bool,

    /// Verify checksums for files in caches/modules-2/files-2.1 (default: true)
    #[arg(long, overrides_with = "no_verify_checksums")]
    pub verify_checksums: bool,

    /// Skip checksum verification
    #[arg(long, overrides_with = "verify_checksums")]
    pub no_verify_checksums: bool,

    /// Seconds to wait for checksum verification before giving up on the rest
    #[arg(long, value_name = "SECONDS", default_value_t = DEFAULT_VERIFY_TIMEOUT.as_secs())]
    pub verify_timeout: u64,

    /// Gradle user home to clean [default: $GRADLE_USER_HOME or ~/.gradle]
    #[arg(long, value_name = "DIR")]
    pub gradle_user_home: Option<PathBuf>,

    /// Project whose gradle/wrapper/gradle-wrapper.properties pins the version to keep
    #[arg(long, value_name = "DIR", default_value = ".")]
    pub project_dir: PathBuf,
}

/// What to do after looking at the command line.
#[derive(Debug)]
pub enum Invocation {
    Run(Command),
    Exit(i32),
}

/// `-?`, `-h` and anything ending in `-help` ask for usage.
fn is_help_flag(arg: &OsString) -> bool {
    arg.to_str()
        .is_some_and(|arg| arg == "-?" || arg == "-h" || arg.ends_with("-help"))
}

/// Parses the command line. Help requests print usage and exit with 0; any
/// unrecognized option prints usage and exits with 1.
pub fn parse_invocation<I, T>(args: I) -> Invocation
where
    I: IntoIterator<Item = T>,
    T: Into<OsString>,
{
    let args: Vec<OsString> = args.into_iter().map(Into::into).collect();

    if args.iter().skip(1).any(is_help_flag) {
        // Printing can only fail on a closed stdout; nothing left to report then.
        let _ = Command::command().print_help();
        println!();
        return Invocation::Exit(0);
    }

    match Command::try_parse_from(args) {
        Ok(cmd) => Invocation::Run(cmd),
        Err(err) => {
            let _ = err.print();
            match err.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => Invocation::Exit(0),
                _ => Invocation::Exit(1),
            }
        }
    }
}

impl Command {
    pub fn run_config(&self) -> Result<RunConfig> {
        let gradle_user_home = match &self.gradle_user_home {
            Some(home) => home.clone(),
            None => get_gradle_user_home()?,
        };
        let project_dir = std::path::absolute(&self.project_dir).with_context(|| {
            format!("Cannot resolve project directory {}", self.project_dir.display())
        })?;

        Ok(RunConfig {
            gradle_user_home,
            project_dir,
            dry_run: self.dry_run,
            keep_old_versions: self.keep_old_versions,
            verify_checksums: !self.no_verify_checksums,
            keep_lock_files: self.keep_lock_files,
            keep_user_id: self.keep_user_id,
            keep_unzipped_distributions: self.keep_unzipped_distributions,
            verify_timeout: Duration::from_secs(self.verify_timeout),
        })
    }

    pub fn exec(&self) -> Result<()> {
        let config = self.run_config()?;
        handle_cleanup(config)?;
        Ok(())
    }
}
