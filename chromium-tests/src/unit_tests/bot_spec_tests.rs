// Copyright (c) The cargo-guppy Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::{
    bot_spec::{BotSpec, BotSpecExtension, BotSpecFields, BotType},
    errors::BotSpecErrorKind,
    BuilderId,
};
use pretty_assertions::assert_eq;
use serde_json::json;

fn tester(parent: &str) -> BotSpecFields {
    BotSpecFields {
        bot_type: BotType::Tester,
        parent_buildername: Some(parent.to_owned()),
        ..BotSpecFields::default()
    }
}

fn kind_of(fields: BotSpecFields) -> BotSpecErrorKind {
    BotSpec::create(fields)
        .expect_err("spec should be rejected")
        .kind()
        .clone()
}

#[test]
fn defaults() {
    let spec = BotSpec::default();
    assert_eq!(spec.bot_type(), BotType::BuilderTester);
    assert_eq!(spec.fields().luci_project, "chromium");
    assert_eq!(spec.fields().chromium_tests_config, "chromium");
    assert!(spec.fields().add_tests_as_compile_targets);
    assert!(spec.non_default_fields().is_empty());
}

#[test]
fn tester_requires_parent() {
    let fields = BotSpecFields {
        bot_type: BotType::Tester,
        ..BotSpecFields::default()
    };
    assert_eq!(
        kind_of(fields),
        BotSpecErrorKind::MissingRequired {
            field: "parent-buildername",
            because: "bot-type is tester",
        }
    );

    BotSpec::create(tester("Linux Builder")).expect("tester with a parent is valid");
}

#[test]
fn parent_master_requires_parent_builder() {
    let fields = BotSpecFields {
        parent_mastername: Some("chromium.linux".to_owned()),
        ..BotSpecFields::default()
    };
    assert_eq!(
        kind_of(fields),
        BotSpecErrorKind::MissingRequired {
            field: "parent-buildername",
            because: "parent-mastername is set",
        }
    );
}

#[test]
fn dummy_tester_fields() {
    let fields = BotSpecFields {
        bot_type: BotType::DummyTester,
        source_side_spec_file: Some("chromium.fyi.json".to_owned()),
        ..BotSpecFields::default()
    };
    BotSpec::create(fields.clone()).expect("source-side-spec-file is allowed");

    let fields = BotSpecFields {
        chromium_config: Some("chromium".to_owned()),
        clobber: true,
        ..fields
    };
    assert_eq!(
        kind_of(fields),
        BotSpecErrorKind::DummyTesterFields(vec![
            "chromium-config".to_owned(),
            "clobber".to_owned()
        ])
    );
}

#[test]
fn dummy_tester_keys_written_with_defaults() {
    // Written-out keys are rejected even when their values match the defaults.
    let err = BotSpec::normalize(json!({
        "bot-type": "dummy_tester",
        "clobber": false,
        "luci-project": "chromium",
    }))
    .expect_err("clobber is provided");
    assert_eq!(
        err.kind(),
        &BotSpecErrorKind::DummyTesterFields(vec!["clobber".to_owned()])
    );

    let table: toml::Value = toml::from_str(
        "bot-type = \"dummy_tester\"\nserialize-tests = false\n",
    )
    .expect("valid TOML");
    let err = BotSpec::normalize(table).expect_err("serialize-tests is provided");
    assert_eq!(
        err.kind(),
        &BotSpecErrorKind::DummyTesterFields(vec!["serialize-tests".to_owned()])
    );

    // Nulls don't count as provided.
    BotSpec::normalize(json!({
        "bot-type": "dummy_tester",
        "chromium-config": null,
        "source-side-spec-file": "chromium.fyi.json",
    }))
    .expect("only allowed keys are set");
}

#[test]
fn compile_targets_only_for_compiling_bots() {
    let fields = BotSpecFields {
        compile_targets: vec!["chrome".to_owned()],
        ..tester("Linux Builder")
    };
    assert_eq!(
        kind_of(fields),
        BotSpecErrorKind::CompileTargetsNotAllowed(BotType::Tester)
    );

    for bot_type in [BotType::Builder, BotType::BuilderTester] {
        let fields = BotSpecFields {
            bot_type,
            compile_targets: vec!["chrome".to_owned()],
            ..BotSpecFields::default()
        };
        BotSpec::create(fields).expect("compiling bots may have compile targets");
    }
}

#[test]
fn archive_groups() {
    let fields = BotSpecFields {
        gs_bucket: Some("bucket".to_owned()),
        gs_acl: Some("public-read".to_owned()),
        ..BotSpecFields::default()
    };
    assert_eq!(
        kind_of(fields),
        BotSpecErrorKind::ForbiddenWithout {
            enabling_field: "archive-build",
            fields: vec!["gs-bucket", "gs-acl"],
        }
    );

    let fields = BotSpecFields {
        archive_build: Some(true),
        ..BotSpecFields::default()
    };
    assert_eq!(
        kind_of(fields),
        BotSpecErrorKind::MissingRequired {
            field: "gs-bucket",
            because: "archive-build is set",
        }
    );

    let fields = BotSpecFields {
        cf_archive_name: Some("asan".to_owned()),
        ..BotSpecFields::default()
    };
    assert_eq!(
        kind_of(fields),
        BotSpecErrorKind::ForbiddenWithout {
            enabling_field: "cf-archive-build",
            fields: vec!["cf-archive-name"],
        }
    );

    let fields = BotSpecFields {
        bisect_archive_build: true,
        bisect_gs_bucket: Some("bisect".to_owned()),
        bisect_gs_extra: Some("extra".to_owned()),
        ..BotSpecFields::default()
    };
    BotSpec::create(fields).expect("bisect group is complete");
}

#[test]
fn evolve_skips_provided_checks() {
    let spec = BotSpec::create(BotSpecFields::default()).expect("default spec is valid");

    // Forbidden at creation, but only invariants are checked when evolving.
    let evolved = spec
        .evolve(|fields| fields.gs_bucket = Some("bucket".to_owned()))
        .expect("evolve only checks invariants");
    assert_eq!(evolved.fields().gs_bucket.as_deref(), Some("bucket"));
    assert_eq!(spec.fields().gs_bucket, None, "original spec is unchanged");

    let err = spec
        .evolve(|fields| fields.bot_type = BotType::Tester)
        .expect_err("invariants are checked");
    assert!(matches!(
        err.kind(),
        BotSpecErrorKind::MissingRequired { .. }
    ));
}

#[test]
fn extend_appends() {
    let spec = BotSpec::create(BotSpecFields {
        chromium_apply_config: vec!["mb".to_owned()],
        compile_targets: vec!["chrome".to_owned()],
        ..BotSpecFields::default()
    })
    .expect("spec is valid");

    let extended = spec
        .extend(BotSpecExtension {
            chromium_apply_config: vec!["goma_canary".to_owned()],
            compile_targets: vec!["content_shell".to_owned()],
            ..BotSpecExtension::default()
        })
        .expect("extension is valid");
    assert_eq!(
        extended.fields().chromium_apply_config,
        vec!["mb".to_owned(), "goma_canary".to_owned()]
    );
    assert_eq!(
        extended.fields().compile_targets,
        vec!["chrome".to_owned(), "content_shell".to_owned()]
    );
    assert!(BotSpecExtension::default().is_empty());
}

#[test]
fn mapping_access() {
    let spec = BotSpec::create(tester("Linux Builder")).expect("spec is valid");
    assert_eq!(spec.get("bot-type"), Some(&json!("tester")));
    assert_eq!(spec.get("parent-buildername"), Some(&json!("Linux Builder")));
    assert_eq!(spec.get("parent-mastername"), None, "null fields are hidden");
    assert_eq!(spec.get("luci-project"), Some(&json!("chromium")));
    assert!(spec.iter().all(|(_, value)| !value.is_null()));
    assert_eq!(spec.iter().count(), spec.len());
    assert_eq!(
        spec.non_default_fields(),
        vec!["bot-type".to_owned(), "parent-buildername".to_owned()]
    );
}

#[test]
fn normalize() {
    let spec = BotSpec::create(tester("Linux Builder")).expect("spec is valid");
    let same = BotSpec::normalize(spec.clone()).expect("specs normalize to themselves");
    assert_eq!(spec, same);

    let from_json = BotSpec::normalize(json!({
        "bot-type": "tester",
        "parent-buildername": "Linux Builder",
    }))
    .expect("JSON fields are valid");
    assert_eq!(spec, from_json);

    let err = BotSpec::normalize(json!({ "bot-type": "tester", "no-such-field": 1 }))
        .expect_err("unknown fields are rejected");
    assert!(matches!(err.kind(), BotSpecErrorKind::Deserialize(_)));

    let err = BotSpec::normalize(json!({ "bot-type": "compiler" }))
        .expect_err("unknown bot types are rejected");
    assert!(matches!(err.kind(), BotSpecErrorKind::Deserialize(_)));
}

#[test]
fn parent_id() {
    let builder_id = BuilderId::new("chromium.linux", "Linux Tests");
    let spec = BotSpec::create(tester("Linux Builder")).expect("spec is valid");
    assert_eq!(
        spec.parent_id(&builder_id),
        Some(BuilderId::new("chromium.linux", "Linux Builder"))
    );

    let spec = spec
        .evolve(|fields| fields.parent_mastername = Some("chromium.fyi".to_owned()))
        .expect("spec is valid");
    assert_eq!(
        spec.parent_id(&builder_id),
        Some(BuilderId::new("chromium.fyi", "Linux Builder"))
    );
    assert_eq!(BotSpec::default().parent_id(&builder_id), None);
}
