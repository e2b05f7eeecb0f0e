// Copyright (c) The cargo-guppy Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use chromium_tests::{bot_spec::BotType, try_spec::ExecutionMode};
use fixtures::{
    builder_id,
    config::{self, ConfigFixture},
};
use pretty_assertions::assert_eq;

#[test]
fn all_fixtures_verify() {
    for (name, fixture) in ConfigFixture::all_fixtures() {
        assert_eq!(*name, fixture.name());
        assert!(
            ConfigFixture::by_name(name).is_some(),
            "fixture {} can be looked up by name",
            name
        );
        assert!(
            fixture.workspace_path().starts_with("fixtures/configs"),
            "fixture {} lives under fixtures/configs, found {}",
            name,
            fixture.workspace_path()
        );
        fixture.verify();
    }
}

#[test]
fn unknown_fixture() {
    assert!(ConfigFixture::by_name("chromium.unknown").is_none());
}

#[test]
fn sources_are_sorted() {
    let fixture = ConfigFixture::chromium();
    let names: Vec<_> = fixture
        .sources()
        .iter()
        .map(|source| {
            source
                .name()
                .rsplit('/')
                .next()
                .expect("rsplit always returns an item")
                .to_owned()
        })
        .collect();
    assert_eq!(
        names,
        vec!["chromium.fyi.toml", "chromium.linux.toml", "tryserver.toml"]
    );
}

#[test]
fn derived_builders() {
    let loaded = ConfigFixture::chromium().config();

    let tests_dbg = loaded
        .bot_db
        .spec(&builder_id(config::CHROMIUM_LINUX_TESTS_DBG))
        .expect("derived tester is loaded");
    assert_eq!(tests_dbg.bot_type(), BotType::Tester);
    assert_eq!(
        tests_dbg.parent_id(&builder_id(config::CHROMIUM_LINUX_TESTS_DBG)),
        Some(builder_id(config::CHROMIUM_LINUX_BUILDER_DBG))
    );
    assert_eq!(tests_dbg.fields().chromium_apply_config, vec!["mb".to_owned()]);

    let compile_only = loaded
        .bot_db
        .spec(&builder_id(config::CHROMIUM_FYI_COMPILE_ONLY))
        .expect("derived builder is loaded");
    assert!(compile_only.fields().disable_tests);
    assert_eq!(
        compile_only.fields().compile_targets,
        vec!["chrome".to_owned(), "chromedriver".to_owned()]
    );

    let graph = loaded.bot_db.bot_graph().expect("graph is acyclic");
    assert_eq!(
        graph
            .parent(&builder_id(config::CHROMIUM_FYI_TESTS))
            .expect("builder is known"),
        Some(&builder_id(config::CHROMIUM_LINUX_BUILDER)),
        "parents can be on other masters"
    );
}

#[test]
fn try_builders() {
    let loaded = ConfigFixture::chromium().config();

    let compile = loaded
        .try_db
        .get(&builder_id(config::CHROMIUM_TRY_LINUX_COMPILE))
        .expect("try builder is loaded");
    assert_eq!(compile.execution_mode, ExecutionMode::Compile);
    assert!(compile.retry_failed_shards);

    let dbg = loaded
        .try_db
        .get(&builder_id(config::CHROMIUM_TRY_LINUX_DBG))
        .expect("try builder is loaded");
    assert!(!dbg.retry_failed_shards);
    assert_eq!(
        dbg.mirrors[0].tester_id(),
        Some(&builder_id(config::CHROMIUM_LINUX_TESTS_DBG))
    );
}

#[test]
fn dummy_testers() {
    let loaded = ConfigFixture::android().config();
    let dummy = loaded
        .bot_db
        .spec(&builder_id(config::ANDROID_DUMMY_TESTS))
        .expect("dummy tester is loaded");
    assert_eq!(dummy.bot_type(), BotType::DummyTester);
    assert_eq!(
        dummy.fields().source_side_spec_file.as_deref(),
        Some("chromium.android.json")
    );
    assert!(!dummy.bot_type().is_compile());
}
