// Copyright (c) The cargo-guppy Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::SortedSet;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};

/// Exit codes above this mean the test runner bailed out early, so its results can't be trusted.
///
/// Test runners that report the number of failures as their exit code cap it at this value.
pub const MAX_FAILURES_EXIT_STATUS: i32 = 101;

/// How many times a single test passed and failed within a run.
#[derive(Copy, Clone, Debug, Default, Eq, Hash, PartialEq, Deserialize, Serialize)]
pub struct PassFailCount {
    /// The number of passing runs.
    pub pass_count: u32,
    /// The number of failing runs. Skipped runs are not counted.
    pub fail_count: u32,
}

/// The canonical record of one run of a test suite.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize)]
pub struct TestRun {
    /// True if the suite produced well-formed, trustworthy results.
    pub valid: bool,
    /// Tests that failed at least once. Only meaningful if `valid` is true.
    pub failures: SortedSet<String>,
    /// The number of tests the suite ran, ignoring retries.
    pub total_tests_ran: usize,
    /// Pass and fail counts for every test.
    pub pass_fail_counts: BTreeMap<String, PassFailCount>,
    /// Tests for which every result was NOTRUN, UNKNOWN or SKIPPED.
    pub findit_notrun: BTreeSet<String>,
}

impl TestRun {
    /// Returns the canonical invalid record: no failures, no tests run.
    pub fn invalid() -> Self {
        Self::default()
    }

    /// Returns the tests that failed on every run.
    ///
    /// Flaky tests (at least one pass) are not included. A failing test without pass/fail
    /// counts is assumed to have never passed.
    pub fn deterministic_failures(&self) -> SortedSet<String> {
        if !self.valid {
            return SortedSet::default();
        }
        self.failures
            .iter()
            .filter(|test| {
                self.pass_fail_counts
                    .get(test.as_str())
                    .map_or(true, |counts| counts.pass_count == 0)
            })
            .cloned()
            .collect()
    }

    /// Parses the JSON summary written by a gtest launcher.
    ///
    /// Within each iteration the statuses of every test are counted. The results are invalid if
    /// there is no summary, or if the launcher tagged them as unreliable or interrupted.
    pub fn from_gtest_json(json: Option<&Value>) -> Self {
        #[derive(Deserialize)]
        struct GtestSummary {
            #[serde(default)]
            per_iteration_data: Vec<BTreeMap<String, Vec<GtestResult>>>,
            #[serde(default)]
            global_tags: Vec<String>,
        }

        #[derive(Deserialize)]
        struct GtestResult {
            status: String,
        }

        let summary = match json {
            Some(Value::Object(map)) if !map.is_empty() => {
                match serde_json::from_value::<GtestSummary>(Value::Object(map.clone())) {
                    Ok(summary) => summary,
                    Err(_) => return Self::invalid(),
                }
            }
            _ => return Self::invalid(),
        };

        let mut pass_fail_counts: BTreeMap<String, PassFailCount> = BTreeMap::new();
        let mut statuses: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        for iteration in summary.per_iteration_data {
            for (test, results) in iteration {
                let counts = pass_fail_counts.entry(test.clone()).or_default();
                let seen = statuses.entry(test).or_default();
                for result in results {
                    match result.status.as_str() {
                        "SUCCESS" => counts.pass_count += 1,
                        "SKIPPED" => counts.fail_count = 0,
                        _ => counts.fail_count += 1,
                    }
                    seen.insert(result.status);
                }
            }
        }

        let findit_notrun = statuses
            .into_iter()
            .filter(|(_, seen)| {
                seen.iter()
                    .all(|status| matches!(status.as_str(), "UNKNOWN" | "NOTRUN" | "SKIPPED"))
            })
            .map(|(test, _)| test)
            .collect();
        let failures = pass_fail_counts
            .iter()
            .filter(|(_, counts)| counts.fail_count >= 1)
            .map(|(test, _)| test.clone())
            .collect();

        let unreliable = summary
            .global_tags
            .iter()
            .any(|tag| tag == "UNRELIABLE_RESULTS" || tag == "CAUGHT_TERMINATION_SIGNAL");
        Self {
            valid: !unreliable,
            failures,
            total_tests_ran: pass_fail_counts.len(),
            pass_fail_counts,
            findit_notrun,
        }
    }

    /// Parses JSON test results: either the simplified format (`valid`, `failures`,
    /// `successes`) or the full version 3 format.
    ///
    /// In the full format only unexpected failures count as failures.
    pub fn from_json_test_results(json: Option<&Value>) -> Self {
        let raw = match json {
            Some(Value::Object(raw)) => raw,
            _ => return Self::invalid(),
        };
        match raw.get("version") {
            None => Self::from_simplified(raw),
            Some(version) => {
                let mut run = Self::from_full(raw);
                run.valid = run.valid && version.as_u64() == Some(3);
                run
            }
        }
    }

    /// Parses the output of a source-side script test: `{"valid": bool, "failures": [...]}`.
    ///
    /// Returns `None` if `failures` is missing, which makes the results invalid.
    pub fn from_script_json(json: Option<&Value>) -> Option<Self> {
        let raw = json?.as_object()?;
        let failures = string_list(raw.get("failures")?)?;
        let mut pass_fail_counts: BTreeMap<String, PassFailCount> = BTreeMap::new();
        for failure in &failures {
            pass_fail_counts.entry(failure.clone()).or_default().fail_count += 1;
        }
        Some(Self {
            valid: raw.get("valid").and_then(Value::as_bool).unwrap_or(false),
            total_tests_ran: failures.len(),
            failures: failures.into_iter().collect(),
            pass_fail_counts,
            findit_notrun: BTreeSet::new(),
        })
    }

    // ---
    // Helper methods
    // ---

    fn from_simplified(raw: &Map<String, Value>) -> Self {
        let failures = raw.get("failures").and_then(string_list).unwrap_or_default();
        let successes = raw
            .get("successes")
            .and_then(string_list)
            .unwrap_or_default();

        let mut pass_fail_counts: BTreeMap<String, PassFailCount> = BTreeMap::new();
        for success in &successes {
            pass_fail_counts.entry(success.clone()).or_default().pass_count += 1;
        }
        for failure in &failures {
            pass_fail_counts.entry(failure.clone()).or_default().fail_count += 1;
        }

        Self {
            valid: raw.get("valid").and_then(Value::as_bool).unwrap_or(false),
            total_tests_ran: successes.len() + failures.len(),
            failures: failures.into_iter().collect(),
            pass_fail_counts,
            findit_notrun: BTreeSet::new(),
        }
    }

    fn from_full(raw: &Map<String, Value>) -> Self {
        let delimiter = raw
            .get("path_delimiter")
            .and_then(Value::as_str)
            .unwrap_or("/");
        let mut tests = BTreeMap::new();
        if let Some(Value::Object(trie)) = raw.get("tests") {
            flatten_trie(trie, None, delimiter, &mut tests);
        }

        let mut failures = Vec::new();
        let mut pass_fail_counts = BTreeMap::new();
        let mut findit_notrun = BTreeSet::new();
        for (test, result) in &tests {
            let actual: Vec<&str> = result
                .get("actual")
                .and_then(Value::as_str)
                .unwrap_or("")
                .split_whitespace()
                .collect();
            let is_unexpected = result
                .get("is_unexpected")
                .and_then(Value::as_bool)
                .unwrap_or(false);

            let mut counts = PassFailCount::default();
            for status in &actual {
                match *status {
                    "PASS" => counts.pass_count += 1,
                    "SKIP" => {}
                    _ => counts.fail_count += 1,
                }
            }
            pass_fail_counts.insert(test.clone(), counts);

            if actual.iter().all(|status| *status == "SKIP") {
                findit_notrun.insert(test.clone());
            }
            let passed_last = actual.last() == Some(&"PASS");
            let skipped = actual == ["SKIP"];
            if is_unexpected && !passed_last && !skipped {
                failures.push(test.clone());
            }
        }

        Self {
            valid: true,
            failures: failures.into_iter().collect(),
            total_tests_ran: tests.len(),
            pass_fail_counts,
            findit_notrun,
        }
    }
}

/// How the results of an isolated script are interpreted.
#[derive(Copy, Clone, Debug, Eq, Hash, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResultsHandler {
    /// JSON test results, simplified or full.
    Default,
    /// Layout (web) test results. Parsed like `Default`, but the test also accepts test options.
    LayoutTests,
    /// Always valid with no failures. Only used for testing.
    Fake,
}

impl ResultsHandler {
    /// Looks up a handler by the name used in test specs: `default`, `layout tests` or `fake`.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "default" => Some(ResultsHandler::Default),
            "layout tests" => Some(ResultsHandler::LayoutTests),
            "fake" => Some(ResultsHandler::Fake),
            _ => None,
        }
    }

    /// Interprets the JSON written by an isolated script.
    pub fn validate(self, json: Option<&Value>) -> TestRun {
        match self {
            ResultsHandler::Default | ResultsHandler::LayoutTests => {
                TestRun::from_json_test_results(json)
            }
            ResultsHandler::Fake => TestRun {
                valid: true,
                ..TestRun::invalid()
            },
        }
    }
}

impl Default for ResultsHandler {
    fn default() -> Self {
        ResultsHandler::Default
    }
}

fn string_list(value: &Value) -> Option<Vec<String>> {
    value
        .as_array()?
        .iter()
        .map(|item| item.as_str().map(str::to_owned))
        .collect()
}

/// Flattens the nested `tests` trie of full JSON results into `{test name: leaf}`.
///
/// A node is a leaf if it has an `actual` or `expected` key.
fn flatten_trie<'a>(
    node: &'a Map<String, Value>,
    prefix: Option<&str>,
    delimiter: &str,
    out: &mut BTreeMap<String, &'a Map<String, Value>>,
) {
    for (key, value) in node {
        let name = match prefix {
            Some(prefix) => format!("{}{}{}", prefix, delimiter, key),
            None => key.clone(),
        };
        if let Value::Object(child) = value {
            if child.contains_key("actual") || child.contains_key("expected") {
                out.insert(name, child);
            } else if !child.is_empty() {
                flatten_trie(child, Some(&name), delimiter, out);
            }
        }
    }
}
