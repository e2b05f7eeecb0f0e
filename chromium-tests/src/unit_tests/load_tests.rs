// Copyright (c) The cargo-guppy Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::{
    bot_spec::BotType,
    load::{load_config, ConfigSource, LoadedConfig},
    BuilderId, Error,
};
use camino::Utf8PathBuf;
use indoc::indoc;
use pretty_assertions::assert_eq;
use std::fs;

fn load(sources: &[(&str, &str)]) -> Result<LoadedConfig, Error> {
    load_config(
        sources
            .iter()
            .map(|(name, contents)| ConfigSource::new(*name, *contents)),
    )
}

fn id(master: &str, builder: &str) -> BuilderId {
    BuilderId::new(master, builder)
}

fn config_error(result: Result<LoadedConfig, Error>) -> (String, String) {
    match result {
        Err(Error::Config { source, msg }) => (source, msg),
        Err(other) => panic!("expected a config error, got {}", other),
        Ok(_) => panic!("expected a config error, got a valid config"),
    }
}

#[test]
fn basic() {
    let config = load(&[(
        "linux.toml",
        indoc! {r#"
            [masters."chromium.linux".settings]
            luci-project = "chromium"

            [masters."chromium.linux".builders."Linux Tests"]
            bot-type = "tester"
            parent-buildername = "Linux Builder"

            [masters."chromium.linux".builders."Linux Builder"]
            bot-type = "builder"
            compile-targets = ["chrome"]
            swarming-dimensions = { os = "Ubuntu-16.04" }
        "#},
    )])
    .expect("config is valid");

    let master_spec = config
        .bot_db
        .master_spec("chromium.linux")
        .expect("master is loaded");
    assert_eq!(
        master_spec.builders().keys().collect::<Vec<_>>(),
        vec!["Linux Tests", "Linux Builder"],
        "builders keep their declaration order"
    );

    let builder = config
        .bot_db
        .spec(&id("chromium.linux", "Linux Builder"))
        .expect("builder is loaded");
    assert_eq!(builder.bot_type(), BotType::Builder);
    assert_eq!(builder.fields().compile_targets, vec!["chrome".to_owned()]);
    assert_eq!(
        builder.fields().swarming_dimensions.get("os").map(String::as_str),
        Some("Ubuntu-16.04")
    );
    assert!(config.try_db.is_empty());
}

#[test]
fn derive_from_and_extend() {
    let derived = indoc! {r#"
        [masters."chromium.fyi".builders."Linux Builder (clang)"]
        derive-from = { master = "chromium.linux", builder = "Linux Builder" }
        chromium-config = "chromium_clang"
        extend = { chromium-apply-config = ["goma_canary"], compile-targets = ["chromedriver"] }

        [masters."chromium.fyi".builders."Linux Builder (clang, again)"]
        derive-from = { master = "chromium.fyi", builder = "Linux Builder (clang)" }
    "#};
    let base = indoc! {r#"
        [masters."chromium.linux".builders."Linux Builder"]
        bot-type = "builder"
        chromium-config = "chromium"
        chromium-apply-config = ["mb"]
        compile-targets = ["chrome"]
    "#};
    let config = load(&[("fyi.toml", derived), ("linux.toml", base)]).expect("config is valid");

    let spec = config
        .bot_db
        .spec(&id("chromium.fyi", "Linux Builder (clang)"))
        .expect("derived builder is loaded");
    assert_eq!(spec.bot_type(), BotType::Builder);
    assert_eq!(spec.fields().chromium_config.as_deref(), Some("chromium_clang"));
    assert_eq!(
        spec.fields().chromium_apply_config,
        vec!["mb".to_owned(), "goma_canary".to_owned()]
    );
    assert_eq!(
        spec.fields().compile_targets,
        vec!["chrome".to_owned(), "chromedriver".to_owned()]
    );

    let again = config
        .bot_db
        .spec(&id("chromium.fyi", "Linux Builder (clang, again)"))
        .expect("chained builder is loaded");
    assert_eq!(again, spec, "derivation chains through derived builders");

    let original = config
        .bot_db
        .spec(&id("chromium.linux", "Linux Builder"))
        .expect("base builder is loaded");
    assert_eq!(original.fields().chromium_apply_config, vec!["mb".to_owned()]);
}

#[test]
fn derive_from_errors() {
    let (source, msg) = config_error(load(&[(
        "fyi.toml",
        indoc! {r#"
            [masters."chromium.fyi".builders."Orphan"]
            derive-from = { master = "chromium.linux", builder = "Missing" }
        "#},
    )]));
    assert_eq!(source, "fyi.toml");
    assert_eq!(
        msg,
        "builder chromium.fyi:Orphan derives from unknown builder chromium.linux:Missing"
    );

    let (_, msg) = config_error(load(&[(
        "fyi.toml",
        indoc! {r#"
            [masters."chromium.fyi".builders."A"]
            derive-from = { master = "chromium.fyi", builder = "B" }

            [masters."chromium.fyi".builders."B"]
            derive-from = { master = "chromium.fyi", builder = "A" }
        "#},
    )]));
    assert_eq!(
        msg,
        "derive-from references form a cycle among: chromium.fyi:A, chromium.fyi:B"
    );

    let (_, msg) = config_error(load(&[(
        "fyi.toml",
        indoc! {r#"
            [masters."chromium.fyi".builders."Bad"]
            derive-from = "chromium.linux:Linux Builder"
        "#},
    )]));
    assert!(msg.starts_with("invalid derive-from for builder chromium.fyi:Bad"), "{}", msg);
}

#[test]
fn duplicate_masters() {
    let master = indoc! {r#"
        [masters."chromium.linux".builders."Linux Builder"]
        bot-type = "builder"
    "#};
    let (source, msg) = config_error(load(&[("a.toml", master), ("b.toml", master)]));
    assert_eq!(source, "b.toml");
    assert_eq!(msg, "master 'chromium.linux' is already defined in 'a.toml'");

    let try_master = indoc! {r#"
        [try-masters."tryserver.chromium.linux".builders."linux-rel"]
        mirrors = []
    "#};
    let (_, msg) = config_error(load(&[("a.toml", try_master), ("b.toml", try_master)]));
    assert_eq!(
        msg,
        "try master 'tryserver.chromium.linux' is already defined in 'a.toml'"
    );
}

#[test]
fn try_masters() {
    let config = load(&[(
        "try.toml",
        indoc! {r#"
            [masters."chromium.linux".builders."Linux Builder"]
            bot-type = "builder"

            [masters."chromium.linux".builders."Linux Tests"]
            bot-type = "tester"
            parent-buildername = "Linux Builder"

            [try-masters."tryserver.chromium.linux".builders."linux-rel"]
            mirrors = [
                { mastername = "chromium.linux", buildername = "Linux Builder", tester = "Linux Tests" },
            ]
            analyze-names = ["chrome"]
            retry-failed-shards = false
        "#},
    )])
    .expect("config is valid");

    let try_spec = config
        .try_db
        .get(&id("tryserver.chromium.linux", "linux-rel"))
        .expect("try builder is loaded");
    assert_eq!(try_spec.mirrors.len(), 1);
    assert_eq!(
        try_spec.mirrors[0].builder_id(),
        &id("chromium.linux", "Linux Builder")
    );
    assert_eq!(
        try_spec.mirrors[0].tester_id(),
        Some(&id("chromium.linux", "Linux Tests"))
    );
    assert_eq!(try_spec.analyze_names, vec!["chrome".to_owned()]);
    assert!(!try_spec.retry_failed_shards);
}

#[test]
fn invalid_configs() {
    assert!(matches!(
        load(&[("bad.toml", "masters = [")]),
        Err(Error::ConfigParse { source, .. }) if source == "bad.toml"
    ));
    assert!(matches!(
        load(&[("bad.toml", "[unknown-section]\nkey = 1\n")]),
        Err(Error::ConfigParse { .. })
    ));

    let unknown_field = indoc! {r#"
        [masters."chromium.linux".builders."Linux Builder"]
        bot-type = "builder"
        no-such-field = true
    "#};
    assert!(matches!(
        load(&[("bad.toml", unknown_field)]),
        Err(Error::BotSpec { builder_id: Some(builder_id), .. })
            if builder_id == id("chromium.linux", "Linux Builder")
    ));

    let orphan_tester = indoc! {r#"
        [masters."chromium.linux".builders."Linux Tests"]
        bot-type = "tester"
    "#};
    assert!(matches!(
        load(&[("bad.toml", orphan_tester)]),
        Err(Error::BotSpec { builder_id: Some(_), .. })
    ));

    let not_a_table = indoc! {r#"
        [masters."chromium.linux".builders]
        "Linux Builder" = "builder"
    "#};
    let (_, msg) = config_error(load(&[("bad.toml", not_a_table)]));
    assert_eq!(
        msg,
        "builder chromium.linux:Linux Builder must be a table, found string"
    );
}

#[test]
fn trigger_cycles() {
    let cycle = indoc! {r#"
        [masters."chromium.linux".builders."A"]
        bot-type = "tester"
        parent-buildername = "B"

        [masters."chromium.linux".builders."B"]
        bot-type = "tester"
        parent-buildername = "A"
    "#};
    match load(&[("cycle.toml", cycle)]) {
        Err(Error::TriggerCycle(members)) => assert_eq!(
            members,
            vec![id("chromium.linux", "A"), id("chromium.linux", "B")]
        ),
        Err(other) => panic!("expected a trigger cycle, got {}", other),
        Ok(_) => panic!("expected a trigger cycle, got a valid config"),
    }
}

#[test]
fn sources_from_files() {
    let dir = tempfile::tempdir().expect("temp dir is created");
    let dir_path = Utf8PathBuf::try_from(dir.path().to_path_buf()).expect("temp dir is UTF-8");
    let path = dir_path.join("linux.toml");
    fs::write(
        &path,
        indoc! {r#"
            [masters."chromium.linux".builders."Linux Builder"]
            bot-type = "builder"
        "#},
    )
    .expect("file is written");

    let source = ConfigSource::from_path(&path).expect("file is read");
    assert_eq!(source.name(), path.as_str());
    assert!(source.contents().contains("Linux Builder"));
    let config = load_config(vec![source]).expect("config is valid");
    assert_eq!(config.bot_db.len(), 1);

    let missing = dir_path.join("missing.toml");
    assert!(matches!(
        ConfigSource::from_path(&missing),
        Err(Error::ConfigIo { source, .. }) if source == missing.as_str()
    ));
}
