// Copyright (c) The cargo-guppy Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

mod bot_spec_tests;
mod fake_api;
mod load_tests;
mod results_tests;
