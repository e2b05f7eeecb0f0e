// Copyright (c) The cargo-guppy Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::{
    steps::{PassFailCount, ResultsHandler, TestRun},
    SortedSet,
};
use pretty_assertions::assert_eq;
use serde_json::json;

fn set(items: &[&str]) -> SortedSet<String> {
    items.iter().map(|item| item.to_string()).collect()
}

#[test]
fn gtest_json() {
    let json = json!({
        "per_iteration_data": [
            {
                "Suite.Pass": [{"status": "SUCCESS"}],
                "Suite.Flaky": [{"status": "FAILURE"}, {"status": "SUCCESS"}],
                "Suite.Fail": [{"status": "FAILURE"}, {"status": "CRASH"}],
                "Suite.NotRun": [{"status": "NOTRUN"}],
            }
        ],
        "global_tags": [],
    });
    let run = TestRun::from_gtest_json(Some(&json));
    assert!(run.valid);
    assert_eq!(run.total_tests_ran, 4);
    assert_eq!(
        run.failures,
        set(&["Suite.Fail", "Suite.Flaky", "Suite.NotRun"])
    );
    assert_eq!(
        run.pass_fail_counts["Suite.Flaky"],
        PassFailCount {
            pass_count: 1,
            fail_count: 1
        }
    );
    assert_eq!(
        run.findit_notrun.iter().collect::<Vec<_>>(),
        vec!["Suite.NotRun"]
    );
    assert_eq!(
        run.deterministic_failures(),
        set(&["Suite.Fail", "Suite.NotRun"]),
        "flaky tests are not deterministic failures"
    );
}

#[test]
fn gtest_json_invalid() {
    assert_eq!(TestRun::from_gtest_json(None), TestRun::invalid());
    assert_eq!(TestRun::from_gtest_json(Some(&json!({}))), TestRun::invalid());
    assert_eq!(
        TestRun::from_gtest_json(Some(&json!({"per_iteration_data": "nope"}))),
        TestRun::invalid()
    );

    for tag in ["UNRELIABLE_RESULTS", "CAUGHT_TERMINATION_SIGNAL"] {
        let json = json!({
            "per_iteration_data": [{"Suite.Test": [{"status": "FAILURE"}]}],
            "global_tags": [tag],
        });
        let run = TestRun::from_gtest_json(Some(&json));
        assert!(!run.valid, "{} invalidates results", tag);
        assert!(
            run.deterministic_failures().is_empty(),
            "invalid runs have no deterministic failures"
        );
    }
}

#[test]
fn simplified_json() {
    let json = json!({
        "valid": true,
        "failures": ["b", "a"],
        "successes": ["c"],
    });
    let run = TestRun::from_json_test_results(Some(&json));
    assert!(run.valid);
    assert_eq!(run.failures, set(&["a", "b"]));
    assert_eq!(run.total_tests_ran, 3);
    assert_eq!(run.pass_fail_counts["c"].pass_count, 1);

    let run = TestRun::from_json_test_results(Some(&json!({"failures": []})));
    assert!(!run.valid, "missing valid key means invalid");
}

#[test]
fn full_json() {
    let json = json!({
        "version": 3,
        "path_delimiter": "/",
        "tests": {
            "fast": {
                "a.html": {"expected": "PASS", "actual": "FAIL FAIL", "is_unexpected": true},
                "b.html": {"expected": "PASS", "actual": "FAIL PASS", "is_unexpected": true},
                "c.html": {"expected": "FAIL", "actual": "FAIL"},
            },
            "skipped.html": {"expected": "SKIP", "actual": "SKIP"},
        },
    });
    let run = TestRun::from_json_test_results(Some(&json));
    assert!(run.valid);
    assert_eq!(run.failures, set(&["fast/a.html"]));
    assert_eq!(run.total_tests_ran, 4);
    assert_eq!(
        run.pass_fail_counts["fast/b.html"],
        PassFailCount {
            pass_count: 1,
            fail_count: 1
        }
    );
    assert!(run.findit_notrun.contains("skipped.html"));

    let wrong_version = json!({"version": 2, "tests": {}});
    assert!(!TestRun::from_json_test_results(Some(&wrong_version)).valid);
}

#[test]
fn script_json() {
    let run = TestRun::from_script_json(Some(&json!({"valid": true, "failures": ["x"]})))
        .expect("failures key is present");
    assert!(run.valid);
    assert_eq!(run.failures, set(&["x"]));

    assert_eq!(TestRun::from_script_json(Some(&json!({"valid": true}))), None);
    assert_eq!(TestRun::from_script_json(None), None);
}

#[test]
fn results_handlers() {
    assert_eq!(
        ResultsHandler::from_name("default"),
        Some(ResultsHandler::Default)
    );
    assert_eq!(
        ResultsHandler::from_name("layout tests"),
        Some(ResultsHandler::LayoutTests)
    );
    assert_eq!(ResultsHandler::from_name("fake"), Some(ResultsHandler::Fake));
    assert_eq!(ResultsHandler::from_name("custom"), None);

    let fake = ResultsHandler::Fake.validate(None);
    assert!(fake.valid);
    assert!(fake.failures.is_empty());
    assert!(!ResultsHandler::Default.validate(None).valid);
}
