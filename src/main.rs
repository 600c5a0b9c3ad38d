// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

use gradle_cache_cleanup::commands::{Invocation, parse_invocation};
use log::LevelFilter;

fn init_logging(verbose: bool) {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"));
    if verbose {
        builder.filter_module("gradle_cache_cleanup", LevelFilter::Debug);
    }
    builder.init();
}

fn main() -> anyhow::Result<()> {
    let cmd = match parse_invocation(std::env::args_os()) {
        Invocation::Run(cmd) => cmd,
        Invocation::Exit(code) => std::process::exit(code),
    };
    init_logging(cmd.verbose);

    if let Err(err) = cmd.exec() {
        eprintln!("Error: {err:#}");
        std::process::exit(1);
    }

    Ok(())
}
