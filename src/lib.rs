// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

pub mod checksum;
pub mod commands;
pub mod config;
pub mod fs_utils;
pub mod handlers;
pub mod paths;
pub mod properties;
pub mod verify;
pub mod wrapper;

/// Sets a process environment variable such as `GRADLE_USER_HOME`.
///
/// Setting variables is `unsafe` in edition 2024 because other threads may be
/// reading the environment; callers must not race with such reads.
///
/// ```
/// gradle_cache_cleanup::set_env_var!("GRADLE_USER_HOME", "/tmp/gradle-home");
/// ```
#[macro_export]
macro_rules! set_env_var {
    ($key:expr, $value:expr) => {
        unsafe { std::env::set_var($key, $value) }
    };
}

/// Removes a process environment variable. Same caveats as [`set_env_var!`].
///
/// ```
/// gradle_cache_cleanup::remove_env_var!("GRADLE_USER_HOME");
/// ```
#[macro_export]
macro_rules! remove_env_var {
    ($key:expr) => {
        unsafe { std::env::remove_var($key) }
    };
}
