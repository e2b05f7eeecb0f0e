// Copyright (c) The cargo-guppy Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The boundary between test orchestration and the engine that actually runs steps.
//!
//! Nothing in this crate executes a process or talks to a remote service. Instead, tests describe
//! the work they need done as [`SwarmingTask`] and [`LocalInvocation`] values and hand them to a
//! [`StepApi`] implementation.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Properties of the build being executed.
///
/// These are deserialized from the build's input properties, so field names are in snake_case.
#[derive(Clone, Debug, Default, Eq, PartialEq, Deserialize, Serialize)]
#[serde(default)]
#[allow(missing_docs)]
pub struct BuildProperties {
    /// The name of the builder running this build.
    pub buildername: String,
    /// The master (builder group) of the builder running this build.
    pub mastername: Option<String>,
    /// The build number.
    pub buildnumber: Option<u64>,
    /// The buildbucket build ID.
    pub buildbucket_build_id: Option<u64>,
    /// The buildbucket project.
    pub buildbucket_project: Option<String>,
    /// The builder group.
    pub builder_group: Option<String>,
    /// The change being tested, for try builds.
    pub patch_issue: Option<u64>,
    /// The patchset being tested, for try builds.
    pub patch_set: Option<u64>,
    pub got_revision: Option<String>,
    pub got_src_revision: Option<String>,
    pub got_cr_revision: Option<String>,
    pub got_angle_revision: Option<String>,
    pub xcode_build_version: Option<String>,
    /// True if this build is testing a pending change.
    pub is_tryserver: bool,
}

impl BuildProperties {
    /// Returns the values available for substitution into test arguments.
    ///
    /// Properties that aren't set are left out, so that placeholders referring to them are left
    /// intact.
    pub fn substitutions(&self) -> BTreeMap<&'static str, String> {
        let got_revision = self
            .got_revision
            .as_ref()
            .or(self.got_src_revision.as_ref());
        let entries: [(&'static str, Option<String>); 13] = [
            (
                "buildbucket_build_id",
                self.buildbucket_build_id.map(|id| id.to_string()),
            ),
            ("buildbucket_project", self.buildbucket_project.clone()),
            ("builder_group", self.builder_group.clone()),
            ("buildername", Some(self.buildername.clone())),
            ("buildnumber", self.buildnumber.map(|n| n.to_string())),
            ("got_revision", got_revision.cloned()),
            ("got_src_revision", self.got_src_revision.clone()),
            ("got_cr_revision", self.got_cr_revision.clone()),
            ("got_angle_revision", self.got_angle_revision.clone()),
            ("mastername", self.mastername.clone()),
            ("patch_issue", self.patch_issue.map(|n| n.to_string())),
            ("patch_set", self.patch_set.map(|n| n.to_string())),
            ("xcode_build_version", self.xcode_build_version.clone()),
        ];
        entries
            .into_iter()
            .filter_map(|(name, value)| value.map(|value| (name, value)))
            .collect()
    }

    /// Returns the names of every variable [`substitutions`](Self::substitutions) can produce.
    pub fn substitution_names() -> &'static [&'static str] {
        &[
            "buildbucket_build_id",
            "buildbucket_project",
            "builder_group",
            "buildername",
            "buildnumber",
            "got_revision",
            "got_src_revision",
            "got_cr_revision",
            "got_angle_revision",
            "mastername",
            "patch_issue",
            "patch_set",
            "xcode_build_version",
        ]
    }
}

/// A script run around a test, or used to trigger or merge its swarming shards.
///
/// Script paths are relative to the root of the checkout and start with `//`.
#[derive(Clone, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd, Deserialize, Serialize)]
#[serde(default)]
pub struct ScriptHook {
    /// A display name for the hook.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// The script to run.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub script: Option<String>,
    /// Arguments passed to the script.
    pub args: Vec<String>,
}

/// A CIPD package installed on the bot before a swarming task runs.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Deserialize, Serialize)]
pub struct CipdPackage {
    /// Where the package is installed, relative to the task's working directory.
    pub location: String,
    /// The name of the package.
    pub cipd_package: String,
    /// The version of the package.
    pub revision: String,
}

/// The kind of swarming task, which determines how its output is interpreted.
#[derive(Copy, Clone, Debug, Eq, Hash, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskKind {
    /// A gtest binary, producing gtest JSON results.
    Gtest,
    /// An isolated script, producing JSON test results.
    IsolatedScript,
}

/// A fully specified swarming task, ready to be triggered.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[allow(missing_docs)]
pub struct SwarmingTask {
    /// The title of the task, which is also the name of its collect step.
    pub title: String,
    pub kind: TaskKind,
    /// The hash of the isolated bundle to run.
    pub isolated_hash: String,
    /// Arguments passed to the test.
    pub extra_args: Vec<String>,
    pub shards: u32,
    /// The task priority. Lower values are more urgent.
    pub priority: u32,
    pub dimensions: BTreeMap<String, String>,
    /// Fallback dimensions, keyed by the expiration in seconds after which they apply.
    pub optional_dimensions: BTreeMap<String, Vec<BTreeMap<String, String>>>,
    pub expiration: Option<u64>,
    pub hard_timeout: Option<u64>,
    pub io_timeout: Option<u64>,
    pub cipd_packages: Vec<CipdPackage>,
    pub service_account: Option<String>,
    pub merge: Option<ScriptHook>,
    pub trigger_script: Option<ScriptHook>,
    pub idempotent: bool,
    /// If true, a failing task produces a warning rather than a failure.
    pub ignore_task_failure: bool,
    pub env: BTreeMap<String, String>,
}

/// The kind of test a [`LocalInvocation`] runs.
#[derive(Copy, Clone, Debug, Eq, Hash, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
#[allow(missing_docs)]
pub enum LocalKind {
    Gtest,
    IsolatedScript,
    Script,
    AndroidJunit,
    WebViewCts,
    Instrumentation,
}

/// A test run directly on the bot.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[allow(missing_docs)]
pub struct LocalInvocation {
    /// The name of the step that runs the test.
    pub step_name: String,
    pub kind: LocalKind,
    /// The target (or, for scripts, the script) to run.
    pub target: String,
    pub args: Vec<String>,
    /// Whether to run under a virtual X framebuffer. Only meaningful on Linux.
    pub use_xvfb: bool,
    pub env: BTreeMap<String, String>,
    pub set_up: Vec<ScriptHook>,
    pub tear_down: Vec<ScriptHook>,
}

/// The result of a step that ran a test.
#[derive(Clone, Debug, Default, Eq, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct StepOutcome {
    /// The name the engine gave the step.
    pub step_name: String,
    /// The exit code of the step.
    pub retcode: i32,
    /// The JSON results the test wrote, if any.
    pub json_output: Option<serde_json::Value>,
    /// The IDs of the swarming tasks that were collected, if any.
    pub task_ids: Vec<String>,
}

/// The operations a test needs from the engine executing the build.
///
/// Failures of the work itself are reported in [`StepOutcome`] values. `failing_step` is how
/// tests surface infrastructure problems (a missing isolate, malformed results) without aborting
/// the rest of the build.
pub trait StepApi {
    /// Returns the properties of the current build.
    fn properties(&self) -> &BuildProperties;

    /// Returns the hash of the isolated bundle for a target, or `None` if it wasn't isolated.
    fn isolated_hash(&self, target: &str) -> Option<String>;

    /// Triggers a swarming task without waiting for it.
    fn trigger_task(&mut self, task: &SwarmingTask);

    /// Waits for a previously triggered task and returns its merged output.
    fn collect_task(&mut self, task: &SwarmingTask) -> StepOutcome;

    /// Runs a test on the bot and returns its output.
    fn run_local(&mut self, invocation: &LocalInvocation) -> StepOutcome;

    /// Emits a step that fails with the given details.
    fn failing_step(&mut self, name: &str, details: &str);

    /// Returns the `os` dimension to use for tasks that don't specify one.
    fn preferred_os_dimension(&self) -> String;
}
