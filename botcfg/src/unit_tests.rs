// Copyright (c) The cargo-guppy Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::{
    command::{closure, plan, verify, Args, Command, ConfigOpts, PlanTarget},
    output::{OutputContext, Styles},
};
use camino::Utf8PathBuf;
use chromium_tests::{api::BuildProperties, config::SourceSpecDir, load::LoadedConfig};
use clap::Parser;
use fixtures::{
    builder_id,
    config::{self, ConfigFixture},
};
use indoc::indoc;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use std::fs;
use tempfile::TempDir;

static CONFIG: &str = indoc! {r#"
    [masters."chromium.test".builders."Builder"]
    bot-type = "builder"
    compile-targets = ["chrome"]

    [masters."chromium.test".builders."Tester"]
    bot-type = "tester"
    parent-buildername = "Builder"

    [try-masters."tryserver.test".builders."try-good"]
    mirrors = [{ mastername = "chromium.test", buildername = "Builder", tester = "Tester" }]
"#};

static SPECS: &str = indoc! {r#"
    {
        "Builder": {
            "additional_compile_targets": ["chrome"]
        },
        "Tester": {
            "gtest_tests": ["base_unittests"],
            "isolated_scripts": [{"args": ["--verbose"]}]
        }
    }
"#};

struct Workspace {
    // Held so the directory outlives the test.
    _dir: TempDir,
    root: Utf8PathBuf,
}

impl Workspace {
    fn new(config: &str) -> Self {
        let dir = tempfile::tempdir().expect("temp dir is created");
        let root = Utf8PathBuf::try_from(dir.path().to_path_buf()).expect("temp dir is UTF-8");
        fs::write(root.join("chromium.test.toml"), config).expect("config is written");
        fs::create_dir(root.join("specs")).expect("specs dir is created");
        fs::write(root.join("specs").join("chromium.test.json"), SPECS).expect("specs are written");
        Self { _dir: dir, root }
    }

    fn config_opts(&self) -> ConfigOpts {
        ConfigOpts {
            configs: vec![self.root.join("chromium.test.toml")],
        }
    }

    fn specs_dir(&self) -> Utf8PathBuf {
        self.root.join("specs")
    }

    fn load(&self) -> LoadedConfig {
        self.config_opts()
            .load(&OutputContext::default())
            .expect("config loads")
    }
}

fn exec(command: Command) -> (i32, String) {
    let mut out = Vec::new();
    let code = command
        .exec(&OutputContext::default(), &mut out)
        .expect("command succeeds");
    (code, String::from_utf8(out).expect("output is UTF-8"))
}

fn fixture_opts(fixture: &ConfigFixture) -> ConfigOpts {
    ConfigOpts {
        configs: fixture.source_paths(),
    }
}

#[test]
fn parse_args() {
    let args = Args::try_parse_from(vec![
        "botcfg",
        "plan",
        "-c",
        "a.toml",
        "--config",
        "b.toml",
        "--specs",
        "specs",
        "--try",
        "tryserver.test:try-good",
        "--json",
    ])
    .expect("plan arguments are valid");
    match args.command {
        Command::Plan {
            config,
            specs,
            try_builder,
            mirror,
            properties,
            json,
        } => {
            assert_eq!(
                config.configs,
                vec![Utf8PathBuf::from("a.toml"), Utf8PathBuf::from("b.toml")]
            );
            assert_eq!(specs, Utf8PathBuf::from("specs"));
            assert_eq!(try_builder, Some(builder_id("tryserver.test:try-good")));
            assert!(mirror.is_empty());
            assert_eq!(properties, None);
            assert!(json);
        }
        other => panic!("expected plan, found {:?}", other),
    }

    let args = Args::try_parse_from(vec![
        "botcfg",
        "closure",
        "-c",
        "a.toml",
        "chromium.test:Builder",
        "chromium.test:Name: with colon",
    ])
    .expect("closure arguments are valid");
    match args.command {
        Command::Closure { builders, .. } => assert_eq!(
            builders,
            vec![
                builder_id("chromium.test:Builder"),
                builder_id("chromium.test:Name: with colon"),
            ]
        ),
        other => panic!("expected closure, found {:?}", other),
    }

    let invalid: &[&[&str]] = &[
        // No config files.
        &["botcfg", "verify"],
        // No builders.
        &["botcfg", "closure", "-c", "a.toml"],
        // Not a builder ID.
        &["botcfg", "closure", "-c", "a.toml", "Builder"],
        // Neither a try builder nor mirrors.
        &["botcfg", "plan", "-c", "a.toml", "--specs", "specs"],
        // Both a try builder and mirrors.
        &[
            "botcfg", "plan", "-c", "a.toml", "--specs", "specs", "--try", "m:a", "--mirror",
            "m:b",
        ],
        &["botcfg", "--color", "sometimes", "verify", "-c", "a.toml"],
    ];
    for args in invalid {
        assert!(
            Args::try_parse_from(args.iter().copied()).is_err(),
            "{:?} should be rejected",
            args
        );
    }
}

#[test]
fn verify_fixtures() {
    for (name, fixture) in ConfigFixture::all_fixtures() {
        verify(fixture.config()).unwrap_or_else(|err| panic!("{} verifies: {}", name, err));
    }

    let (code, out) = exec(Command::Verify {
        config: fixture_opts(ConfigFixture::chromium()),
    });
    assert_eq!(code, 0);
    assert_eq!(
        out,
        "verified 6 builder(s) in 2 master(s) and 3 try builder(s)\n"
    );
}

#[test]
fn verify_errors() {
    let config = format!(
        "{}{}",
        CONFIG,
        indoc! {r#"

            [try-masters."tryserver.test".builders."try-bad"]
            mirrors = [{ mastername = "chromium.test", buildername = "Missing" }]
        "#}
    );
    let workspace = Workspace::new(&config);
    let err = verify(&workspace.load()).expect_err("try-bad mirrors an unknown builder");
    assert_eq!(
        err.to_string(),
        "try builder tryserver.test:try-bad has invalid mirrors"
    );

    let workspace = Workspace::new("[masters.\"chromium.test\".builders.\"Builder\"]\nbot-type = 3\n");
    let err = workspace
        .config_opts()
        .load(&OutputContext::default())
        .expect_err("bot-type must be a string");
    assert!(
        err.to_string().starts_with("failed to load configuration from "),
        "unexpected error: {}",
        err
    );
}

#[test]
fn closures() {
    let loaded = ConfigFixture::chromium().config();
    assert_eq!(
        closure(loaded, &[builder_id(config::CHROMIUM_LINUX_BUILDER)]).expect("builder is known"),
        vec![
            builder_id(config::CHROMIUM_FYI_TESTS),
            builder_id(config::CHROMIUM_LINUX_BUILDER),
            builder_id(config::CHROMIUM_LINUX_TESTS),
        ]
    );
    assert_eq!(
        closure(
            loaded,
            &[
                builder_id(config::CHROMIUM_FYI_COMPILE_ONLY),
                builder_id(config::CHROMIUM_LINUX_BUILDER_DBG),
            ]
        )
        .expect("builders are known"),
        vec![
            builder_id(config::CHROMIUM_FYI_COMPILE_ONLY),
            builder_id(config::CHROMIUM_LINUX_BUILDER_DBG),
            builder_id(config::CHROMIUM_LINUX_TESTS_DBG),
        ]
    );

    let err = closure(loaded, &[builder_id("chromium.linux:Missing")])
        .expect_err("unknown builders are rejected");
    assert_eq!(
        err.to_string(),
        "No configuration present for builder chromium.linux:Missing"
    );

    let (code, out) = exec(Command::Closure {
        config: fixture_opts(ConfigFixture::chromium()),
        builders: vec![builder_id(config::CHROMIUM_LINUX_BUILDER_DBG)],
    });
    assert_eq!(code, 0);
    assert_eq!(
        out,
        "chromium.linux:Linux Builder (dbg)\nchromium.linux:Linux Tests (dbg)\n"
    );
}

#[test]
fn plan_try_builder() {
    let fixture = ConfigFixture::chromium();
    let plan = plan(
        fixture.config(),
        PlanTarget::Builder(builder_id(config::CHROMIUM_TRY_LINUX_REL)),
        &fixture.spec_provider(),
        BuildProperties::default(),
    )
    .expect("plan is built");

    assert_eq!(
        plan.builder_ids,
        vec![builder_id(config::CHROMIUM_LINUX_BUILDER)]
    );
    let in_scope: Vec<_> = plan
        .tests_in_scope
        .iter()
        .map(|test| (test.name.as_str(), test.kind, test.swarmed))
        .collect();
    assert_eq!(
        in_scope,
        vec![
            ("checkdeps", "script", false),
            ("webkit_layout_tests", "isolated script", true),
            ("base_unittests", "gtest", false),
            ("browser_tests", "gtest", true),
        ]
    );
    assert_eq!(plan.tests_triggered.len(), 1);
    let gl_tests = &plan.tests_triggered[0];
    assert_eq!(gl_tests.name, "gl_tests on NVIDIA GPU on Linux");
    assert_eq!(gl_tests.builder_id, builder_id(config::CHROMIUM_FYI_TESTS));
    assert_eq!(gl_tests.experiment_percentage, Some(100));

    assert_eq!(
        plan.compile_targets,
        vec![
            "base_unittests".to_owned(),
            "blink_web_tests".to_owned(),
            "browser_tests".to_owned(),
            "chrome".to_owned(),
            "chromedriver".to_owned(),
        ]
    );
    assert!(plan.diagnostics.is_empty());
}

#[test]
fn plan_mirrors() {
    let workspace = Workspace::new(CONFIG);
    let loaded = workspace.load();
    let plan = plan(
        &loaded,
        PlanTarget::Mirrors(vec![builder_id("chromium.test:Builder")]),
        &SourceSpecDir::new(workspace.specs_dir()),
        BuildProperties::default(),
    )
    .expect("plan is built");

    assert!(plan.tests_in_scope.is_empty());
    let triggered: Vec<_> = plan
        .tests_triggered
        .iter()
        .map(|test| (test.name.as_str(), test.builder_id.to_string()))
        .collect();
    assert_eq!(
        triggered,
        vec![("base_unittests", "chromium.test:Tester".to_owned())]
    );
    assert_eq!(plan.compile_targets, vec!["chrome".to_owned()]);
    assert_eq!(plan.compile_targets_reports.len(), 1);
    assert!(plan.compile_targets_reports[0].is_complete());
    assert_eq!(plan.diagnostics.len(), 1);
    assert_eq!(
        plan.diagnostics[0].step_name,
        "test spec format error"
    );

    let mut text = Vec::new();
    plan.write_text(&Styles::default(), &mut text)
        .expect("writing to a Vec succeeds");
    let text = String::from_utf8(text).expect("output is UTF-8");
    assert!(
        text.starts_with(indoc! {"
            plan for chromium.test:Builder
            tests in scope (0):
            tests triggered (1):
              base_unittests [gtest] on chromium.test:Tester
            compile targets:
              chrome
            diagnostics:
              test spec format error: "}),
        "unexpected plan:\n{}",
        text
    );

    let err = crate::command::plan(
        &loaded,
        PlanTarget::Mirrors(vec![]),
        &SourceSpecDir::new(workspace.specs_dir()),
        BuildProperties::default(),
    )
    .expect_err("no mirrors");
    assert_eq!(err.to_string(), "at least one builder to mirror is required");
}

#[test]
fn plan_command() {
    let workspace = Workspace::new(CONFIG);
    let (code, out) = exec(Command::Plan {
        config: workspace.config_opts(),
        specs: workspace.specs_dir(),
        try_builder: Some(builder_id("tryserver.test:try-good")),
        mirror: vec![],
        properties: Some(r#"{"buildername": "try-good", "patch_issue": 1234}"#.to_owned()),
        json: true,
    });
    assert_eq!(code, 1, "spec diagnostics fail the command");

    let plan: Value = serde_json::from_str(&out).expect("output is JSON");
    assert_eq!(plan["execution_mode"], json!("compile-test"));
    assert_eq!(plan["compile_targets"], json!(["base_unittests", "chrome"]));
    assert_eq!(plan["tests_in_scope"][0]["name"], json!("base_unittests"));
    assert_eq!(plan["tests_in_scope"][0]["kind"], json!("gtest"));
    assert_eq!(plan["tests_triggered"], json!([]));
    assert_eq!(
        plan["diagnostics"][0]["step_name"],
        json!("test spec format error")
    );

    let workspace = Workspace::new(CONFIG);
    let err = Command::Plan {
        config: workspace.config_opts(),
        specs: workspace.specs_dir(),
        try_builder: Some(builder_id("tryserver.test:try-good")),
        mirror: vec![],
        properties: Some("[1, 2]".to_owned()),
        json: false,
    }
    .exec(&OutputContext::default(), &mut Vec::new())
    .expect_err("properties must be an object");
    assert_eq!(
        err.to_string(),
        "--properties is not a valid properties object"
    );
}
