// Copyright (c) The cargo-guppy Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The serialized form of test specs.
//!
//! Source-side specs are JSON files checked into the source tree, keyed by builder name. Field
//! names are in snake_case, and unknown fields are ignored so that the source tree can add
//! fields before every consumer understands them.

use crate::api::{CipdPackage, ScriptHook};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

/// The tests a single builder runs, as written in a source-side spec.
#[derive(Clone, Debug, Default, Eq, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SourceSideBuilderSpec {
    /// Gtest binaries. Each entry is either a target name or a full entry.
    #[serde(deserialize_with = "deserialize_gtests")]
    pub gtest_tests: Vec<GtestEntry>,
    /// Isolated scripts.
    pub isolated_scripts: Vec<IsolatedScriptEntry>,
    /// Scripts in `testing/scripts`.
    pub scripts: Vec<ScriptEntry>,
    /// Android JUnit suites.
    pub junit_tests: Vec<JunitEntry>,
    /// WebView CTS runs.
    pub cts_tests: Vec<CtsEntry>,
    /// Android instrumentation tests.
    pub instrumentation_tests: Vec<InstrumentationEntry>,
    /// Targets compiled in addition to the targets of the tests.
    pub additional_compile_targets: Vec<String>,
}

impl SourceSideBuilderSpec {
    /// Returns true if the spec has no tests and no additional compile targets.
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

/// A test spec written alongside a builder's configuration.
///
/// The `kind` key selects the entry type; the remaining keys are the same as in source-side
/// specs.
#[derive(Clone, Debug, Eq, PartialEq, Deserialize, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
#[allow(missing_docs)]
pub enum TestSpec {
    Gtest(GtestEntry),
    IsolatedScript(IsolatedScriptEntry),
    Script(ScriptEntry),
    Junit(JunitEntry),
    Cts(CtsEntry),
    Instrumentation(InstrumentationEntry),
}

/// Fields shared by gtest and isolated script entries.
#[derive(Clone, Debug, Default, Eq, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct TestEntryCommon {
    /// The target that builds the test.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub test: Option<String>,
    /// The isolate to run, for entries without a `test`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub isolate_name: Option<String>,
    /// The displayed name of the test. Defaults to the target.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Arguments passed on every builder.
    pub args: Vec<String>,
    /// Arguments passed only on try builders.
    pub precommit_args: Vec<String>,
    /// Arguments passed only on continuous builders.
    pub non_precommit_args: Vec<String>,
    /// Arguments passed depending on the value of a build property.
    pub conditional_args: Vec<ConditionalArgs>,
    /// How the test runs on swarming.
    pub swarming: SwarmingEntry,
    /// The script that merges shard results.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub merge: Option<ScriptHook>,
    /// The script that triggers the shards.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trigger_script: Option<ScriptHook>,
    /// Scripts run before the test.
    pub setup: Vec<ScriptHook>,
    /// Scripts run after the test.
    pub teardown: Vec<ScriptHook>,
    /// Replaces the compile targets of the test.
    pub override_compile_targets: Vec<String>,
    /// Collect clang coverage profiles.
    pub isolate_coverage_data: bool,
    /// Run the test as an experiment on this percentage of builds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub experiment_percentage: Option<i64>,
}

impl TestEntryCommon {
    /// Returns the target the entry builds.
    pub fn target(&self) -> Option<&str> {
        self.test.as_deref().or(self.isolate_name.as_deref())
    }

    /// Returns the displayed name of the test.
    pub fn display_name(&self) -> Option<&str> {
        self.name.as_deref().or_else(|| self.target())
    }
}

/// A gtest binary.
#[derive(Clone, Debug, Eq, PartialEq, Deserialize, Serialize)]
pub struct GtestEntry {
    /// Fields shared with other entry types.
    #[serde(flatten)]
    pub common: TestEntryCommon,
    /// The shard of the suite this entry runs.
    #[serde(default)]
    pub shard_index: u32,
    /// The number of shards the suite is split into.
    #[serde(default = "default_total_shards")]
    pub total_shards: u32,
    /// Run under a virtual X framebuffer when run locally.
    #[serde(default = "default_true")]
    pub use_xvfb: bool,
}

impl GtestEntry {
    /// Creates an entry for a target with no other configuration.
    pub fn new(test: impl Into<String>) -> Self {
        Self {
            common: TestEntryCommon {
                test: Some(test.into()),
                ..TestEntryCommon::default()
            },
            shard_index: 0,
            total_shards: default_total_shards(),
            use_xvfb: true,
        }
    }
}

/// An isolated script.
#[derive(Clone, Debug, Eq, PartialEq, Deserialize, Serialize)]
pub struct IsolatedScriptEntry {
    /// Fields shared with other entry types.
    #[serde(flatten)]
    pub common: TestEntryCommon,
    /// The name of the results handler: `default`, `layout tests` or `fake`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub results_handler: Option<String>,
}

/// Swarming settings of an entry.
#[derive(Clone, Debug, Eq, PartialEq, Deserialize, Serialize)]
#[serde(default)]
#[allow(missing_docs)]
pub struct SwarmingEntry {
    /// Run on swarming rather than on the bot.
    pub can_use_on_swarming_builders: bool,
    pub shards: u32,
    /// One test is generated per set. A `null` value removes a builder default.
    pub dimension_sets: Vec<BTreeMap<String, Option<String>>>,
    /// Fallback dimensions, keyed by expiration in seconds.
    pub optional_dimensions: BTreeMap<String, OptionalDimensions>,
    /// Added to the builder's default priority.
    pub priority_adjustment: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expiration: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hard_timeout: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub io_timeout: Option<u64>,
    pub idempotent: bool,
    pub ignore_task_failure: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_account: Option<String>,
    pub cipd_packages: Vec<CipdPackage>,
}

impl Default for SwarmingEntry {
    fn default() -> Self {
        Self {
            can_use_on_swarming_builders: false,
            shards: 1,
            dimension_sets: Vec::new(),
            optional_dimensions: BTreeMap::new(),
            priority_adjustment: 0,
            expiration: None,
            hard_timeout: None,
            io_timeout: None,
            idempotent: true,
            ignore_task_failure: false,
            service_account: None,
            cipd_packages: Vec::new(),
        }
    }
}

/// Optional dimensions for one expiration: a single set or a list of sets.
#[derive(Clone, Debug, Eq, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
#[allow(missing_docs)]
pub enum OptionalDimensions {
    Many(Vec<BTreeMap<String, String>>),
    One(BTreeMap<String, String>),
}

impl OptionalDimensions {
    /// Returns the dimension sets as a list.
    pub fn to_vec(&self) -> Vec<BTreeMap<String, String>> {
        match self {
            OptionalDimensions::Many(sets) => sets.clone(),
            OptionalDimensions::One(set) => vec![set.clone()],
        }
    }
}

/// Arguments added if a build property has (or, if inverted, doesn't have) a value.
#[derive(Clone, Debug, Eq, PartialEq, Deserialize, Serialize)]
pub struct ConditionalArgs {
    /// The name of a substitution variable.
    pub variable: String,
    /// The value to compare against. Unset variables compare equal to the empty string.
    #[serde(default)]
    pub value: String,
    /// Add the arguments if the value does *not* match.
    #[serde(default)]
    pub invert: bool,
    /// The arguments to add.
    #[serde(default)]
    pub args: Vec<String>,
}

/// A script in the checkout's `testing/scripts` directory.
#[derive(Clone, Debug, Eq, PartialEq, Deserialize, Serialize)]
pub struct ScriptEntry {
    /// The displayed name of the test.
    pub name: String,
    /// The script to run.
    pub script: String,
    /// Arguments passed to the script.
    #[serde(default)]
    pub args: Vec<String>,
    /// Replaces the compile targets of the script.
    #[serde(default)]
    pub override_compile_targets: Vec<String>,
}

/// An Android JUnit suite.
#[derive(Clone, Debug, Eq, PartialEq, Deserialize, Serialize)]
pub struct JunitEntry {
    /// The suite to run.
    pub test: String,
}

/// A WebView CTS run.
#[derive(Clone, Debug, Eq, PartialEq, Deserialize, Serialize)]
pub struct CtsEntry {
    /// The Android platform release.
    pub platform: String,
    /// The device architecture.
    #[serde(default = "default_cts_arch")]
    pub arch: String,
    /// Extra arguments passed to WebView.
    #[serde(default)]
    pub command_line_args: Vec<String>,
}

/// An Android instrumentation test.
#[derive(Clone, Debug, Eq, PartialEq, Deserialize, Serialize)]
pub struct InstrumentationEntry {
    /// The target that builds the test APK.
    pub test: String,
    /// The displayed name of the test. Defaults to the target.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Arguments passed to the test runner.
    #[serde(default)]
    pub args: Vec<String>,
}

fn default_total_shards() -> u32 {
    1
}

fn default_true() -> bool {
    true
}

fn default_cts_arch() -> String {
    "arm64".to_owned()
}

fn deserialize_gtests<'de, D>(deserializer: D) -> Result<Vec<GtestEntry>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum GtestItem {
        Name(String),
        Entry(GtestEntry),
    }

    let items = Vec::<GtestItem>::deserialize(deserializer)?;
    Ok(items
        .into_iter()
        .map(|item| match item {
            GtestItem::Name(test) => GtestEntry::new(test),
            GtestItem::Entry(entry) => entry,
        })
        .collect())
}
