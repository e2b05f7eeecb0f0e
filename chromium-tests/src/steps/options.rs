// Copyright (c) The cargo-guppy Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::steps::Suffix;
use serde::{Deserialize, Serialize};

/// How many times failing tests are repeated when retried without the patch.
///
/// High enough that flaky tests produce both passes and failures, low enough to keep the retry
/// fast.
pub const REPEAT_COUNT_FOR_FAILING_TESTS: u32 = 10;

/// Retries with more failing tests than this run with the test's own options.
const MAX_TESTS_TO_REPEAT: usize = 100;

/// Command-line behavior requested from a test runner.
#[derive(Clone, Debug, Default, Eq, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct TestOptions {
    /// How many times to run each test.
    pub repeat_count: Option<u32>,
    /// Only run these tests.
    pub test_filter: Vec<String>,
    /// Also run tests that are disabled.
    pub run_disabled: bool,
    /// How many times to retry a failing test until it passes.
    pub retry_limit: Option<u32>,
    /// Run every test in a fresh process. Slower, but no state leaks between tests.
    pub force_independent_tests: bool,
}

impl TestOptions {
    /// Returns the options to use for a run with the given suffix.
    ///
    /// Retrying a small number of tests without the patch repeats each of them
    /// [`REPEAT_COUNT_FOR_FAILING_TESTS`] times, independently and without launcher retries,
    /// unless an explicit repeat count was requested.
    pub fn for_running(&self, suffix: Suffix, tests_to_retry: Option<&[String]>) -> TestOptions {
        let mut options = self.clone();
        let retrying_few = matches!(
            tests_to_retry,
            Some(tests) if !tests.is_empty() && tests.len() <= MAX_TESTS_TO_REPEAT
        );
        if !retrying_few {
            return options;
        }

        if options.repeat_count.is_none() && suffix == Suffix::WithoutPatch {
            options.repeat_count = Some(REPEAT_COUNT_FOR_FAILING_TESTS);
            options.retry_limit = Some(0);
            options.force_independent_tests = true;
        }
        options
    }

    /// Merges these options into gtest-style arguments.
    ///
    /// `--test-launcher-batch-limit` is only understood by gtest launchers, so it is added only if
    /// `is_gtest` is true.
    pub fn merge_into_args(&self, args: &[String], is_gtest: bool) -> Vec<String> {
        let mut args = args.to_vec();
        if !self.test_filter.is_empty() {
            args = merge_arg(args, "--gtest_filter", Some(&self.test_filter.join(":")));
        }
        if let Some(repeat_count) = self.repeat_count.filter(|&count| count > 1) {
            args = merge_arg(args, "--gtest_repeat", Some(&repeat_count.to_string()));
        }
        if let Some(retry_limit) = self.retry_limit {
            args = merge_arg(
                args,
                "--test-launcher-retry-limit",
                Some(&retry_limit.to_string()),
            );
        }
        if self.run_disabled {
            args = merge_arg(args, "--gtest_also_run_disabled_tests", None);
        }
        if self.force_independent_tests && is_gtest {
            args = merge_arg(args, "--test-launcher-batch-limit", Some("1"));
        }
        args
    }
}

/// Replaces every argument starting with `flag` with `flag=value`, or with the bare flag if
/// `value` is `None`.
pub fn merge_arg(args: Vec<String>, flag: &str, value: Option<&str>) -> Vec<String> {
    let mut args: Vec<String> = args
        .into_iter()
        .filter(|arg| !arg.starts_with(flag))
        .collect();
    match value {
        Some(value) => args.push(format!("{}={}", flag, value)),
        None => args.push(flag.to_owned()),
    }
    args
}
