// Copyright (c) The cargo-guppy Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Command-line checks for builder configurations.
//!
//! `botcfg` loads the same TOML builder tables a recipe loads, and answers the questions that
//! come up while editing them:
//!
//! ```text
//! # Do these tables load, and do all try builders mirror known builders?
//! botcfg verify -c chromium.linux.toml -c tryserver.toml
//!
//! # What does Linux Builder trigger, directly or transitively?
//! botcfg closure -c chromium.linux.toml "chromium.linux:Linux Builder"
//!
//! # What would linux-rel compile and run?
//! botcfg plan -c chromium.linux.toml -c tryserver.toml --specs testing/buildbot \
//!     --try tryserver.chromium.linux:linux-rel
//! ```
//!
//! `plan` exits with status 1 if any source-side test spec has problems that a build would
//! report as failing steps.

mod command;
mod output;
mod plan;
#[cfg(test)]
mod unit_tests;

pub use command::{closure, plan, verify, Args, PlanTarget};
pub use output::Color;
pub use plan::{BuildPlan, PlannedTest};
