// Copyright (c) The cargo-guppy Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::details::FixtureDetails;
use camino::{Utf8Path, Utf8PathBuf};
use chromium_tests::{
    config::SourceSpecDir,
    load::{load_config, ConfigSource, LoadedConfig},
};
use once_cell::sync::{Lazy, OnceCell};
use std::{collections::BTreeMap, fs};

// Fixture directories along with interesting builder names.
pub static CHROMIUM_PATH: &str = "configs/chromium";
pub static CHROMIUM_LINUX_BUILDER: &str = "chromium.linux:Linux Builder";
pub static CHROMIUM_LINUX_TESTS: &str = "chromium.linux:Linux Tests";
pub static CHROMIUM_LINUX_BUILDER_DBG: &str = "chromium.linux:Linux Builder (dbg)";
pub static CHROMIUM_LINUX_TESTS_DBG: &str = "chromium.linux:Linux Tests (dbg)";
pub static CHROMIUM_FYI_TESTS: &str = "chromium.fyi:Linux FYI Tests";
pub static CHROMIUM_FYI_COMPILE_ONLY: &str = "chromium.fyi:Linux Compile Only";
pub static CHROMIUM_TRY_LINUX_REL: &str = "tryserver.chromium.linux:linux-rel";
pub static CHROMIUM_TRY_LINUX_DBG: &str = "tryserver.chromium.linux:linux-dbg";
pub static CHROMIUM_TRY_LINUX_COMPILE: &str = "tryserver.chromium.linux:linux-compile";

pub static ANDROID_PATH: &str = "configs/android";
pub static ANDROID_BUILDER: &str = "chromium.android:Android Builder";
pub static ANDROID_TESTS: &str = "chromium.android:Android Tests";
pub static ANDROID_DUMMY_TESTS: &str = "chromium.android:Android Tests (dummy)";

macro_rules! define_fixtures {
    ($($name: ident => $path: ident,)*) => {
        impl ConfigFixture {
            // Access all fixtures.
            pub fn all_fixtures() -> &'static BTreeMap<&'static str, ConfigFixture> {
                static ALL_FIXTURES: Lazy<BTreeMap<&'static str, ConfigFixture>> = Lazy::new(|| {
                    let mut map = BTreeMap::new();

                    $(map.insert(
                        stringify!($name),
                        ConfigFixture::new(stringify!($name), $path, FixtureDetails::$name()),
                    );)*

                    map
                });

                &*ALL_FIXTURES
            }

            // Access individual fixtures if the name is known.
            $(pub fn $name() -> &'static Self {
                &ConfigFixture::all_fixtures()[stringify!($name)]
            })*
        }
    };
}

define_fixtures! {
    chromium => CHROMIUM_PATH,
    android => ANDROID_PATH,
}

/// A directory of TOML configuration sources, with source-side specs under `specs/`.
pub struct ConfigFixture {
    name: &'static str,
    workspace_path: Utf8PathBuf,
    abs_path: Utf8PathBuf,
    config: OnceCell<(Vec<ConfigSource>, LoadedConfig)>,
    details: FixtureDetails,
}

impl ConfigFixture {
    fn new(name: &'static str, rel_path: &'static str, details: FixtureDetails) -> Self {
        let fixtures_dir = Utf8Path::new(env!("CARGO_MANIFEST_DIR"));
        // rel_path is relative to this dir.
        let abs_path = Utf8PathBuf::from_path_buf(
            fixtures_dir
                .join(rel_path)
                .canonicalize()
                .expect("fixture path canonicalization succeeded"),
        )
        .expect("valid UTF-8 path");

        let workspace_root = fixtures_dir.parent().expect("up to workspace root");
        let workspace_path = Utf8PathBuf::from_path_buf(
            pathdiff::diff_paths(&abs_path, workspace_root)
                .expect("both abs_path and workspace root are absolute"),
        )
        .expect("diff of UTF-8 paths is UTF-8");

        Self {
            name,
            workspace_path,
            abs_path,
            config: OnceCell::new(),
            details,
        }
    }

    /// Lookup a fixture by name, or `None` if the name wasn't found.
    pub fn by_name(name: &str) -> Option<&'static Self> {
        Self::all_fixtures().get(name)
    }

    /// Returns the name of this fixture.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Returns the absolute path of this fixture.
    pub fn abs_path(&self) -> &Utf8Path {
        &self.abs_path
    }

    /// Returns the path of this fixture, relative to the workspace root.
    pub fn workspace_path(&self) -> &Utf8Path {
        &self.workspace_path
    }

    /// Returns the paths of the TOML sources in this fixture, sorted by name.
    pub fn source_paths(&self) -> Vec<Utf8PathBuf> {
        let mut paths: Vec<_> = fs::read_dir(&self.abs_path)
            .expect("fixture directory is readable")
            .map(|entry| {
                let path = entry.expect("directory entry is readable").path();
                Utf8PathBuf::from_path_buf(path).expect("valid UTF-8 path")
            })
            .filter(|path| path.extension() == Some("toml"))
            .collect();
        paths.sort();
        paths
    }

    /// Returns the unparsed sources for this fixture.
    pub fn sources(&self) -> &[ConfigSource] {
        &self.init_config().0
    }

    /// Returns the loaded configuration for this fixture.
    pub fn config(&self) -> &LoadedConfig {
        &self.init_config().1
    }

    /// Returns the directory holding this fixture's source-side specs.
    pub fn specs_dir(&self) -> Utf8PathBuf {
        self.abs_path.join("specs")
    }

    /// Returns a provider reading this fixture's source-side specs.
    pub fn spec_provider(&self) -> SourceSpecDir {
        SourceSpecDir::new(self.specs_dir())
    }

    /// Returns the test details for this fixture.
    pub fn details(&self) -> &FixtureDetails {
        &self.details
    }

    /// Verifies that the loaded configuration matches known details.
    pub fn verify(&self) {
        let config = self.config();
        config
            .bot_db
            .verify()
            .expect("database verification should succeed");

        self.details.assert_counts(config);
        self.details.assert_closures(config);
        self.details.assert_try_builders_resolve(config);
    }

    fn init_config(&self) -> &(Vec<ConfigSource>, LoadedConfig) {
        self.config.get_or_init(|| {
            let sources: Vec<_> = self
                .source_paths()
                .into_iter()
                .map(|path| ConfigSource::from_path(&path).expect("fixture source is readable"))
                .collect();
            let config = load_config(sources.clone())
                .unwrap_or_else(|err| panic!("fixture {} should load: {}", self.name, err));
            (sources, config)
        })
    }
}

impl FixtureDetails {
    pub(crate) fn chromium() -> Self {
        Self::new(6, 3)
            .with_closure(
                CHROMIUM_LINUX_BUILDER,
                vec![
                    CHROMIUM_FYI_TESTS,
                    CHROMIUM_LINUX_BUILDER,
                    CHROMIUM_LINUX_TESTS,
                ],
            )
            .with_closure(
                CHROMIUM_LINUX_BUILDER_DBG,
                vec![CHROMIUM_LINUX_BUILDER_DBG, CHROMIUM_LINUX_TESTS_DBG],
            )
            .with_closure(CHROMIUM_FYI_COMPILE_ONLY, vec![CHROMIUM_FYI_COMPILE_ONLY])
    }

    pub(crate) fn android() -> Self {
        Self::new(3, 0).with_closure(ANDROID_BUILDER, vec![ANDROID_BUILDER, ANDROID_TESTS])
    }
}
