// Copyright (c) The cargo-guppy Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Drives try builds of the fixture configurations end to end.

use chromium_tests::{
    api::{LocalKind, StepApi},
    config::{BotConfig, BuildConfig},
    steps::{Suffix, Test, TestKind},
};
use fixtures::{
    builder_id,
    config::{self, ConfigFixture},
    step_api::FakeStepApi,
};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};

fn gtest_results(results: &[(&str, &str)]) -> Value {
    let iteration: serde_json::Map<String, Value> = results
        .iter()
        .map(|(test, statuses)| {
            let statuses: Vec<Value> = statuses
                .split_whitespace()
                .map(|status| json!({ "status": status }))
                .collect();
            (test.to_string(), Value::Array(statuses))
        })
        .collect();
    json!({ "per_iteration_data": [iteration], "global_tags": [] })
}

fn try_build_config<'db>(
    fixture: &'db ConfigFixture,
    try_builder: &str,
    api: &FakeStepApi,
) -> BuildConfig<'db> {
    let loaded = fixture.config();
    let bot_config = BotConfig::lookup(&loaded.bot_db, &loaded.try_db, &builder_id(try_builder))
        .expect("try builder resolves");
    let (build_config, diagnostics) = bot_config
        .create_build_config(&fixture.spec_provider(), api.properties())
        .expect("build config is created");
    assert!(diagnostics.is_empty(), "fixture specs are well-formed: {:?}", diagnostics);
    build_config
}

fn names<'a>(tests: impl IntoIterator<Item = &'a Test>) -> Vec<String> {
    tests.into_iter().map(Test::name).collect()
}

fn run_suffix(build_config: &mut BuildConfig<'_>, api: &mut FakeStepApi, suffix: Suffix) {
    for test in build_config.tests_in_scope_mut() {
        test.pre_run(api, suffix).expect("pre_run succeeds");
    }
    for test in build_config.tests_in_scope_mut() {
        test.run(api, suffix).expect("run succeeds");
    }
    for test in build_config.tests_in_scope_mut() {
        test.post_run(api, suffix).expect("post_run succeeds");
    }
}

fn find<'a>(build_config: &'a BuildConfig<'_>, name: &str) -> &'a Test {
    build_config
        .tests_in_scope()
        .into_iter()
        .find(|test| test.name() == name)
        .unwrap_or_else(|| panic!("test {} is in scope", name))
}

#[test]
fn linux_rel() {
    let fixture = ConfigFixture::chromium();
    let mut api = FakeStepApi::try_build("linux-rel", 1234)
        .with_isolates(vec!["browser_tests", "blink_web_tests"]);
    let mut build_config = try_build_config(fixture, config::CHROMIUM_TRY_LINUX_REL, &api);

    assert_eq!(
        names(build_config.tests_in_scope()),
        vec![
            "checkdeps".to_owned(),
            "webkit_layout_tests".to_owned(),
            "base_unittests".to_owned(),
            "browser_tests".to_owned(),
        ]
    );
    assert_eq!(
        names(build_config.all_tests()).len(),
        5,
        "the cross-master tester's tests are generated too"
    );

    let (compile_targets, reports) = build_config
        .get_compile_targets(build_config.tests_in_scope())
        .expect("mirrors are consistent");
    assert_eq!(
        compile_targets,
        vec![
            "base_unittests".to_owned(),
            "blink_web_tests".to_owned(),
            "browser_tests".to_owned(),
            "chrome".to_owned(),
            "chromedriver".to_owned(),
        ]
    );
    assert!(reports.iter().all(|report| report.is_complete()));

    api.set_outcome(
        "browser_tests (with patch)",
        1,
        Some(gtest_results(&[
            ("Suite.Pass", "SUCCESS"),
            ("Suite.Fail", "FAILURE FAILURE"),
        ])),
    );
    api.set_outcome(
        "base_unittests (with patch)",
        0,
        Some(gtest_results(&[("Base.Test", "SUCCESS")])),
    );
    api.set_outcome(
        "webkit_layout_tests (with patch)",
        0,
        Some(json!({ "valid": true, "failures": [], "successes": ["fast/a.html"] })),
    );
    api.set_outcome(
        "checkdeps (with patch)",
        0,
        Some(json!({ "valid": true, "failures": [] })),
    );
    run_suffix(&mut build_config, &mut api, Suffix::WithPatch);

    let triggered: Vec<_> = api.triggered().iter().map(|task| task.title.as_str()).collect();
    assert_eq!(
        triggered,
        vec!["webkit_layout_tests (with patch)", "browser_tests (with patch)"]
    );
    assert_eq!(api.collected(), &triggered[..], "every triggered task is collected");
    let local: Vec<_> = api
        .local_runs()
        .iter()
        .map(|invocation| (invocation.step_name.as_str(), invocation.kind))
        .collect();
    assert_eq!(
        local,
        vec![
            ("checkdeps (with patch)", LocalKind::Script),
            ("base_unittests (with patch)", LocalKind::Gtest),
        ]
    );

    let browser_task = &api.triggered()[1];
    assert_eq!(browser_task.shards, 4);
    assert_eq!(browser_task.priority, 200);
    assert_eq!(browser_task.isolated_hash, "browser_tests-hash");
    assert_eq!(
        browser_task.dimensions.get("pool").map(String::as_str),
        Some("chromium.tests")
    );
    assert!(browser_task
        .extra_args
        .contains(&"--builder=linux-rel".to_owned()));

    let browser_tests = find(&build_config, "browser_tests");
    assert!(browser_tests.has_valid_results(Suffix::WithPatch));
    assert_eq!(
        browser_tests
            .failures(Suffix::WithPatch)
            .expect("with patch ran")
            .to_vec(),
        vec!["Suite.Fail".to_owned()]
    );
    assert_eq!(
        browser_tests.tests_to_retry(Suffix::WithoutPatch),
        Some(vec!["Suite.Fail".to_owned()])
    );
    let metadata = browser_tests.step_metadata(Some(Suffix::WithPatch));
    assert_eq!(metadata.patched, Some(true));
    assert_eq!(metadata.canonical_step_name, "browser_tests");
    assert_eq!(metadata.isolate_target_name.as_deref(), Some("browser_tests"));
    assert_eq!(
        metadata.swarm_task_ids,
        Some(vec!["browser_tests (with patch)-task".to_owned()])
    );

    // Only the suite with failures is retried without the patch.
    api.set_outcome(
        "browser_tests (without patch)",
        1,
        Some(gtest_results(&[("Suite.Fail", "FAILURE")])),
    );
    let browser_tests = build_config
        .tests_in_scope_mut()
        .into_iter()
        .find(|test| test.name() == "browser_tests")
        .expect("browser_tests is in scope");
    browser_tests
        .pre_run(&mut api, Suffix::WithoutPatch)
        .expect("pre_run succeeds");
    browser_tests
        .post_run(&mut api, Suffix::WithoutPatch)
        .expect("post_run succeeds");

    let retry_task = api
        .triggered()
        .last()
        .expect("the retry was triggered");
    assert_eq!(retry_task.title, "browser_tests (without patch)");
    assert!(retry_task
        .extra_args
        .contains(&"--gtest_filter=Suite.Fail".to_owned()));
    assert_eq!(retry_task.shards, 1);
    assert_eq!(retry_task.priority, 199);

    let ignored = browser_tests
        .without_patch_failures_to_ignore()
        .expect("without patch results are valid");
    assert!(ignored.contains("Suite.Fail"));
    assert!(api.failing_steps().is_empty(), "{:?}", api.failing_steps());
}

#[test]
fn missing_isolates_fail_steps() {
    let fixture = ConfigFixture::chromium();
    let mut api = FakeStepApi::try_build("linux-dbg", 99);
    let mut build_config = try_build_config(fixture, config::CHROMIUM_TRY_LINUX_DBG, &api);
    assert_eq!(
        names(build_config.tests_in_scope()),
        vec!["base_unittests".to_owned()]
    );

    run_suffix(&mut build_config, &mut api, Suffix::WithPatch);
    let failing: Vec<_> = api
        .failing_steps()
        .iter()
        .map(|(name, _)| name.as_str())
        .collect();
    assert_eq!(failing, vec!["[error] base_unittests (with patch)"]);
    let base_unittests = find(&build_config, "base_unittests");
    assert!(!base_unittests.has_valid_results(Suffix::WithPatch));
    assert_eq!(base_unittests.tests_to_retry(Suffix::WithoutPatch), None);
}

#[test]
fn compile_only() {
    let fixture = ConfigFixture::chromium();
    let api = FakeStepApi::try_build("linux-compile", 7);
    let build_config = try_build_config(fixture, config::CHROMIUM_TRY_LINUX_COMPILE, &api);

    assert!(build_config.all_tests().is_empty());
    let (compile_targets, reports) = build_config
        .get_compile_targets(build_config.all_tests())
        .expect("single mirror is consistent");
    assert_eq!(
        compile_targets,
        vec!["chrome".to_owned(), "chromedriver".to_owned()]
    );
    assert_eq!(
        reports[0].needs_migration,
        vec!["chrome".to_owned(), "chromedriver".to_owned()],
        "there is no source-side spec for the builder"
    );
}

#[test]
fn experimental_fyi_tests() {
    let fixture = ConfigFixture::chromium();
    let mut api = FakeStepApi::try_build("linux-fyi", 5).with_isolates(vec!["gl_tests"]);
    let loaded = fixture.config();
    let bot_config = BotConfig::create(
        &loaded.bot_db,
        vec![builder_id(config::CHROMIUM_FYI_TESTS)],
    )
    .expect("builder is known");
    let (mut build_config, _) = bot_config
        .create_build_config(&fixture.spec_provider(), api.properties())
        .expect("build config is created");

    let name = "gl_tests on NVIDIA GPU on Linux";
    api.set_outcome(
        &format!("{} (with patch, experimental)", name),
        1,
        Some(gtest_results(&[("Gl.Fail", "FAILURE")])),
    );
    run_suffix(&mut build_config, &mut api, Suffix::WithPatch);

    let gl_tests = find(&build_config, name);
    assert!(gl_tests.has_valid_results(Suffix::WithPatch));
    assert!(gl_tests
        .failures(Suffix::WithPatch)
        .expect("experimental tests report no failures")
        .is_empty());
    assert_eq!(
        gl_tests
            .test_run(Suffix::WithPatch)
            .expect("the test ran")
            .failures
            .to_vec(),
        vec!["Gl.Fail".to_owned()]
    );
    assert_eq!(api.triggered()[0].priority, 35);
}

#[test]
fn android_tests() {
    let fixture = ConfigFixture::android();
    let loaded = fixture.config();
    let mut api = FakeStepApi::try_build("android-rel", 3).with_isolates(vec!["content_unittests"]);
    let bot_config = BotConfig::create(
        &loaded.bot_db,
        vec![builder_id(config::ANDROID_TESTS)],
    )
    .expect("builder is known");
    let (mut build_config, _) = bot_config
        .create_build_config(&fixture.spec_provider(), api.properties())
        .expect("build config is created");

    assert_eq!(
        names(build_config.tests_in_scope()),
        vec![
            "content_unittests on Android device Nexus 5X".to_owned(),
            "WebView CTS: L".to_owned(),
            "chrome_public_test_apk".to_owned(),
            "base_junit_tests".to_owned(),
        ]
    );
    assert!(matches!(
        build_config.tests_in_scope()[1].kind(),
        TestKind::WebViewCts { .. }
    ));

    api.properties_mut().is_tryserver = false;
    run_suffix(&mut build_config, &mut api, Suffix::Plain);
    let kinds: Vec<_> = api
        .local_runs()
        .iter()
        .map(|invocation| (invocation.kind, invocation.target.as_str()))
        .collect();
    assert_eq!(
        kinds,
        vec![
            (LocalKind::WebViewCts, "system_webview_apk"),
            (LocalKind::Instrumentation, "chrome_public_test_apk"),
            (LocalKind::AndroidJunit, "base_junit_tests"),
        ]
    );
    assert_eq!(api.triggered().len(), 1);
    assert_eq!(
        api.triggered()[0].dimensions.get("device_type").map(String::as_str),
        Some("bullhead")
    );
}
