// Copyright (c) The cargo-guppy Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test fixtures for chromium-tests.

pub mod config;
pub mod details;
pub mod step_api;

use chromium_tests::BuilderId;

/// Helper for creating `BuilderId` instances in test code, from `master:builder` strings.
pub fn builder_id(s: &str) -> BuilderId {
    s.parse()
        .unwrap_or_else(|err| panic!("invalid builder ID in test code: {}", err))
}
