// Copyright (c) The cargo-guppy Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::api::BuildProperties;
use serde::Serialize;
use std::hash::Hasher;
use twox_hash::XxHash64;

/// Runs a test on a percentage of builds without letting it fail them.
///
/// Whether a build is in the experiment is a stable function of the builder, the change or build
/// being tested, and the test name. Retries of the same change therefore make the same choice.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
pub struct Experiment {
    percentage: u8,
    in_experiment: bool,
}

impl Experiment {
    /// Decides whether the test named `test_name` is in the experiment for this build.
    ///
    /// `percentage` is clamped to `0..=100`.
    pub fn new(percentage: i64, properties: &BuildProperties, test_name: &str) -> Self {
        let percentage = percentage.clamp(0, 100) as u8;
        let in_experiment = is_in_experiment(percentage, properties, test_name);
        Self {
            percentage,
            in_experiment,
        }
    }

    /// Creates an experiment with a fixed decision.
    pub fn with_decision(percentage: u8, in_experiment: bool) -> Self {
        Self {
            percentage: percentage.min(100),
            in_experiment,
        }
    }

    /// Returns the clamped percentage of builds the test runs on.
    pub fn percentage(&self) -> u8 {
        self.percentage
    }

    /// Returns true if the test runs on this build.
    pub fn in_experiment(&self) -> bool {
        self.in_experiment
    }

    /// Returns the step label for a run with the given suffix label.
    pub fn label(suffix: &str) -> String {
        if suffix.is_empty() {
            "experimental".to_owned()
        } else {
            format!("{}, experimental", suffix)
        }
    }
}

fn is_in_experiment(percentage: u8, properties: &BuildProperties, test_name: &str) -> bool {
    let change = match (properties.patch_issue, properties.buildnumber) {
        (Some(issue), _) => issue.to_string(),
        (None, Some(buildnumber)) => buildnumber.to_string(),
        (None, None) => "0".to_owned(),
    };

    let mut hasher = XxHash64::default();
    hasher.write(properties.buildername.as_bytes());
    hasher.write(change.as_bytes());
    hasher.write(test_name.as_bytes());
    let short = hasher.finish() & 0xffff;

    u64::from(percentage) * 0xffff >= short * 100
}
