// Copyright (c) The cargo-guppy Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Executable tests.
//!
//! A [`Test`] is driven through three phases for each [`Suffix`] it runs with:
//!
//! 1. [`pre_run`](Test::pre_run) triggers swarming tasks without waiting for them.
//! 2. [`run`](Test::run) executes local tests.
//! 3. [`post_run`](Test::post_run) collects swarming tasks.
//!
//! Callers should call `pre_run` on every test before calling `run` or `post_run` on any, so that
//! all swarming tasks are in flight at once.
//!
//! Each phase records at most one result per suffix. Driving a suffix through a phase twice is an
//! [`Error::TestState`].

mod experimental;
mod options;
mod results;
mod suffix;
mod swarming;

pub use experimental::*;
pub use options::*;
pub use results::*;
pub use suffix::*;
pub use swarming::*;

use crate::{
    api::{LocalInvocation, LocalKind, ScriptHook, StepApi, StepOutcome, SwarmingTask, TaskKind},
    errors::TestStateError,
    Error, SortedSet,
};
use log::{debug, warn};
use once_cell::sync::Lazy;
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

/// Clang coverage profiles written by swarming tasks, one per process.
const SWARMING_PROFILE_FILE: &str = "${ISOLATED_OUTDIR}/profraw/default-%8m.profraw";
/// Clang coverage profile written by local tests.
const LOCAL_PROFILE_FILE: &str = "${ISOLATED_OUTDIR}/profraw/default-%1m.profraw";

static NO_FAILURES: Lazy<SortedSet<String>> = Lazy::new(SortedSet::default);
static NO_COUNTS: Lazy<BTreeMap<String, PassFailCount>> = Lazy::new(BTreeMap::new);
static NO_TESTS: Lazy<BTreeSet<String>> = Lazy::new(BTreeSet::new);

/// Configuration shared by every kind of test.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct TestCommon {
    /// The displayed name of the test.
    pub name: String,
    /// The target that builds the test, if different from the name.
    pub target_name: Option<String>,
    /// Replaces the compile targets the test would otherwise need.
    pub override_compile_targets: Vec<String>,
    /// Arguments passed to the test.
    pub args: Vec<String>,
    /// The continuous master whose configuration the test came from.
    pub waterfall_mastername: Option<String>,
    /// The continuous builder whose configuration the test came from.
    pub waterfall_buildername: Option<String>,
    /// Scripts run before the test.
    pub set_up: Vec<ScriptHook>,
    /// Scripts run after the test.
    pub tear_down: Vec<ScriptHook>,
}

impl TestCommon {
    /// Creates a configuration with just a name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

/// Parameters for a test run directly on the bot.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct LocalParams {
    /// Run under a virtual X framebuffer. Only meaningful on Linux.
    pub use_xvfb: bool,
    /// Collect clang coverage profiles.
    pub isolate_coverage_data: bool,
}

/// Where a gtest or isolated script runs.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Execution {
    /// On the bot, during [`Test::run`].
    Local(LocalParams),
    /// On swarming, triggered in [`Test::pre_run`] and collected in [`Test::post_run`].
    Swarmed(SwarmingParams),
}

/// What a test runs, and how.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum TestKind {
    /// A gtest binary.
    Gtest {
        /// Where the binary runs.
        execution: Execution,
    },
    /// A script wrapping a test harness, writing JSON test results.
    IsolatedScript {
        /// Where the script runs.
        execution: Execution,
        /// How the results are interpreted.
        results_handler: ResultsHandler,
    },
    /// A script in the checkout's `testing/scripts` directory. Always local.
    Script {
        /// The script, relative to `testing/scripts`.
        script: String,
        /// The compile targets the script needs, with `${name}` already substituted.
        script_compile_targets: Vec<String>,
    },
    /// An Android JUnit suite, run on the host.
    AndroidJunit,
    /// The WebView compatibility test suite, run on an attached device.
    WebViewCts {
        /// The Android platform release, for example `L` or `M`.
        platform: String,
        /// The device architecture.
        arch: String,
        /// Extra arguments passed to WebView.
        command_line_args: Vec<String>,
    },
    /// An Android instrumentation test, run on an attached device.
    Instrumentation,
}

/// Everything a test has recorded, per suffix.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct TestState {
    tasks: SuffixMap<SwarmingTask>,
    missing_isolates: SuffixMap<()>,
    runs: SuffixMap<TestRun>,
    step_names: SuffixMap<String>,
    task_ids: SuffixMap<Vec<String>>,
}

/// Metadata attached to a test's steps, for tools that analyze failures.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct StepMetadata {
    /// The continuous master the test came from.
    pub waterfall_mastername: Option<String>,
    /// The continuous builder the test came from.
    pub waterfall_buildername: Option<String>,
    /// The test's name without any suffix.
    pub canonical_step_name: String,
    /// The isolated target of the test, if it has one.
    pub isolate_target_name: Option<String>,
    /// Whether the pending change was applied. Only present if a suffix was requested.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub patched: Option<bool>,
    /// The name of the step that collected the test's results.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_step_name: Option<String>,
    /// The dimensions of the swarming task.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dimensions: Option<BTreeMap<String, String>>,
    /// The IDs of the collected swarming tasks.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub swarm_task_ids: Option<Vec<String>>,
}

/// An executable test.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Test {
    common: TestCommon,
    kind: TestKind,
    experiment: Option<Experiment>,
    options: TestOptions,
    state: TestState,
}

impl Test {
    /// Creates a new test.
    pub fn new(common: TestCommon, kind: TestKind) -> Self {
        Self {
            common,
            kind,
            experiment: None,
            options: TestOptions::default(),
            state: TestState::default(),
        }
    }

    /// Makes this test experimental.
    ///
    /// An experimental test only runs if the build is in the experiment, and never reports
    /// failures.
    pub fn with_experiment(mut self, experiment: Experiment) -> Self {
        self.experiment = Some(experiment);
        self
    }

    /// Returns the configuration shared by every kind of test.
    pub fn common(&self) -> &TestCommon {
        &self.common
    }

    /// Returns what this test runs.
    pub fn kind(&self) -> &TestKind {
        &self.kind
    }

    /// Returns the experiment this test is part of, if any.
    pub fn experiment(&self) -> Option<&Experiment> {
        self.experiment.as_ref()
    }

    /// Returns the displayed name of the test.
    ///
    /// Swarmed tests targeting a GPU or Android device have the hardware appended.
    pub fn name(&self) -> String {
        match self.swarming_params().and_then(SwarmingParams::name_suffix) {
            Some(suffix) => format!("{} {}", self.common.name, suffix),
            None => self.common.name.clone(),
        }
    }

    /// Returns the name of the test without any hardware suffix.
    pub fn canonical_name(&self) -> &str {
        &self.common.name
    }

    /// Returns the target that builds the test.
    pub fn target_name(&self) -> &str {
        self.common
            .target_name
            .as_deref()
            .unwrap_or(&self.common.name)
    }

    /// Returns the isolated target the test runs, or `None` if it doesn't run from an isolate.
    pub fn isolate_target(&self) -> Option<&str> {
        match &self.kind {
            TestKind::Gtest {
                execution: Execution::Swarmed(_),
            }
            | TestKind::IsolatedScript { .. } => Some(self.target_name()),
            _ => None,
        }
    }

    /// Returns the targets that must be compiled before the test can run.
    pub fn compile_targets(&self) -> Vec<String> {
        if !self.common.override_compile_targets.is_empty() {
            return self.common.override_compile_targets.clone();
        }
        match &self.kind {
            TestKind::Script {
                script_compile_targets,
                ..
            } => script_compile_targets.clone(),
            TestKind::WebViewCts { .. } => vec!["system_webview_apk".to_owned()],
            TestKind::Gtest { .. }
            | TestKind::IsolatedScript { .. }
            | TestKind::AndroidJunit
            | TestKind::Instrumentation => vec![self.target_name().to_owned()],
        }
    }

    /// Returns true if the test runs on swarming.
    pub fn runs_on_swarming(&self) -> bool {
        self.swarming_params().is_some()
    }

    /// Returns true if the test is a gtest binary.
    pub fn is_gtest(&self) -> bool {
        matches!(self.kind, TestKind::Gtest { .. })
    }

    /// Returns the options passed to the test runner.
    pub fn test_options(&self) -> &TestOptions {
        &self.options
    }

    /// Replaces the options passed to the test runner.
    pub fn set_test_options(&mut self, options: TestOptions) {
        self.options = options;
    }

    /// Returns the name of the step that runs the test with the given suffix.
    pub fn step_name(&self, suffix: Suffix) -> String {
        let label = match &self.experiment {
            Some(_) => Experiment::label(suffix.as_str()),
            None => suffix.as_str().to_owned(),
        };
        if label.is_empty() {
            self.name()
        } else {
            format!("{} ({})", self.name(), label)
        }
    }

    /// Returns the name the engine gave the step that best represents the run with the given
    /// suffix, if it ran.
    pub fn recorded_step_name(&self, suffix: Suffix) -> Option<&str> {
        self.state.step_names.get(suffix).map(String::as_str)
    }

    /// Returns metadata describing the test, and the run with the given suffix if one is
    /// provided.
    pub fn step_metadata(&self, suffix: Option<Suffix>) -> StepMetadata {
        let mut metadata = StepMetadata {
            waterfall_mastername: self.common.waterfall_mastername.clone(),
            waterfall_buildername: self.common.waterfall_buildername.clone(),
            canonical_step_name: self.canonical_name().to_owned(),
            isolate_target_name: self.isolate_target().map(str::to_owned),
            patched: None,
            full_step_name: None,
            dimensions: None,
            swarm_task_ids: None,
        };
        if let Some(suffix) = suffix {
            metadata.patched = Some(suffix.is_patched());
            if self.runs_on_swarming() {
                metadata.full_step_name = self.recorded_step_name(suffix).map(str::to_owned);
                metadata.dimensions = self.state.tasks.get(suffix).map(|t| t.dimensions.clone());
                metadata.swarm_task_ids = self.state.task_ids.get(suffix).cloned();
            }
        }
        metadata
    }

    /// Returns the swarming task triggered for a suffix, if any.
    pub fn task(&self, suffix: Suffix) -> Option<&SwarmingTask> {
        self.state.tasks.get(suffix)
    }

    /// Returns the results recorded for a suffix, if any.
    ///
    /// Unlike the other result accessors, this returns what the test actually recorded even for
    /// experimental tests.
    pub fn test_run(&self, suffix: Suffix) -> Option<&TestRun> {
        self.state.runs.get(suffix)
    }

    /// Returns true if the run with the given suffix produced trustworthy results.
    ///
    /// Experimental tests always have valid results.
    pub fn has_valid_results(&self, suffix: Suffix) -> bool {
        if self.experiment.is_some() {
            return true;
        }
        self.state.runs.get(suffix).map_or(false, |run| run.valid)
    }

    /// Returns the tests that failed at least once, or `None` if the suffix didn't run.
    ///
    /// Only meaningful if [`has_valid_results`](Self::has_valid_results) is true.
    pub fn failures(&self, suffix: Suffix) -> Option<&SortedSet<String>> {
        if self.experiment.is_some() {
            return Some(&*NO_FAILURES);
        }
        self.state.runs.get(suffix).map(|run| &run.failures)
    }

    /// Returns the tests that failed on every run.
    pub fn deterministic_failures(&self, suffix: Suffix) -> SortedSet<String> {
        if self.experiment.is_some() {
            return SortedSet::default();
        }
        self.state
            .runs
            .get(suffix)
            .map(TestRun::deterministic_failures)
            .unwrap_or_default()
    }

    /// Returns pass and fail counts for every test, or `None` if the suffix didn't run.
    pub fn pass_fail_counts(&self, suffix: Suffix) -> Option<&BTreeMap<String, PassFailCount>> {
        if self.experiment.is_some() {
            return Some(&*NO_COUNTS);
        }
        self.state.runs.get(suffix).map(|run| &run.pass_fail_counts)
    }

    /// Returns the tests that never produced a result, or `None` if the suffix didn't run.
    pub fn findit_notrun(&self, suffix: Suffix) -> Option<&BTreeSet<String>> {
        if self.experiment.is_some() {
            return Some(&*NO_TESTS);
        }
        self.state.runs.get(suffix).map(|run| &run.findit_notrun)
    }

    /// Returns the tests to run for a suffix, or `None` to run every test.
    ///
    /// Runs without the patch are narrowed to the tests that failed deterministically with the
    /// patch. If the results with the patch aren't valid, every test runs.
    pub fn tests_to_retry(&self, suffix: Suffix) -> Option<Vec<String>> {
        if self.experiment.is_some() || suffix != Suffix::WithoutPatch {
            return None;
        }
        let with_patch = self.state.runs.get(Suffix::WithPatch)?;
        if !with_patch.valid {
            return None;
        }
        Some(with_patch.deterministic_failures().into_inner().into_vec())
    }

    /// Returns the tests that failed at least once without the patch. Failures of these tests
    /// with the patch are not caused by the patch.
    ///
    /// Returns `None` if the results without the patch aren't valid.
    pub fn without_patch_failures_to_ignore(&self) -> Option<BTreeSet<String>> {
        if !self.has_valid_results(Suffix::WithoutPatch) {
            return None;
        }
        let counts = self.pass_fail_counts(Suffix::WithoutPatch)?;
        Some(
            counts
                .iter()
                .filter(|(_, counts)| counts.fail_count > 0)
                .map(|(test, _)| test.clone())
                .collect(),
        )
    }

    /// Returns the number of shards to use when retrying `num_tests_to_retry` tests, based on how
    /// many tests ran with the patch.
    pub fn shards_to_retry_with(&self, original_shards: u32, num_tests_to_retry: usize) -> u32 {
        let total_tests_ran = self
            .state
            .runs
            .get(Suffix::WithPatch)
            .map_or(0, |run| run.total_tests_ran);
        shards_to_retry_with(original_shards, num_tests_to_retry, total_tests_ran)
    }

    /// Triggers the test if it runs on swarming. Does nothing for local tests.
    ///
    /// A missing isolate is reported as a failing step, and the test is left untriggered. Collecting
    /// it afterwards reports nothing further.
    pub fn pre_run(&mut self, api: &mut dyn StepApi, suffix: Suffix) -> Result<(), Error> {
        if !self.in_experiment() {
            return Ok(());
        }
        let params = match self.swarming_params() {
            Some(params) => params.clone(),
            None => return Ok(()),
        };
        if self.state.tasks.contains(suffix) {
            return Err(self.state_error(suffix, TestStateError::AlreadyTriggered));
        }

        let isolate_target = self.target_name().to_owned();
        let isolated_hash = match api.isolated_hash(&isolate_target) {
            Some(hash) => hash,
            None => {
                api.failing_step(
                    &format!("[error] {}", self.step_name(suffix)),
                    &format!("*.isolated file for target {} is missing", isolate_target),
                );
                self.state.missing_isolates.insert(suffix, ());
                return Ok(());
            }
        };

        let task = self.create_task(api, suffix, &params, isolated_hash);
        debug!("triggering swarming task '{}'", task.title);
        api.trigger_task(&task);
        if self.state.tasks.insert_new(suffix, task).is_err() {
            return Err(self.state_error(suffix, TestStateError::AlreadyTriggered));
        }
        Ok(())
    }

    /// Runs the test if it runs locally. Does nothing for swarmed tests.
    pub fn run(&mut self, api: &mut dyn StepApi, suffix: Suffix) -> Result<(), Error> {
        if !self.in_experiment() || self.runs_on_swarming() {
            return Ok(());
        }
        if self.state.runs.contains(suffix) {
            return Err(self.state_error(suffix, TestStateError::AlreadyCollected));
        }

        let invocation = self.local_invocation(suffix);
        let outcome = api.run_local(&invocation);
        let run = self.local_results(api, suffix, &outcome);
        self.record(suffix, outcome, run)
    }

    /// Collects the test's results if it runs on swarming. Does nothing for local tests.
    ///
    /// A test that was never triggered is reported as a failing step, and no results are
    /// recorded. A test whose isolate was missing has already been reported by
    /// [`pre_run`](Self::pre_run).
    pub fn post_run(&mut self, api: &mut dyn StepApi, suffix: Suffix) -> Result<(), Error> {
        if !self.in_experiment() || !self.runs_on_swarming() {
            return Ok(());
        }
        if self.state.runs.contains(suffix) {
            return Err(self.state_error(suffix, TestStateError::AlreadyCollected));
        }

        let task = match self.state.tasks.get(suffix) {
            Some(task) => task,
            None if self.state.missing_isolates.contains(suffix) => return Ok(()),
            None => {
                api.failing_step(
                    &format!("[collect error] {}", self.step_name(suffix)),
                    &format!("{} wasn't triggered", self.target_name()),
                );
                return Ok(());
            }
        };
        let outcome = api.collect_task(task);
        let run = match &self.kind {
            TestKind::IsolatedScript {
                results_handler, ..
            } => isolated_script_results(*results_handler, &outcome),
            _ => TestRun::from_gtest_json(outcome.json_output.as_ref()),
        };
        self.record(suffix, outcome, run)
    }

    // ---
    // Helper methods
    // ---

    fn swarming_params(&self) -> Option<&SwarmingParams> {
        match &self.kind {
            TestKind::Gtest {
                execution: Execution::Swarmed(params),
            }
            | TestKind::IsolatedScript {
                execution: Execution::Swarmed(params),
                ..
            } => Some(params),
            _ => None,
        }
    }

    fn in_experiment(&self) -> bool {
        self.experiment
            .as_ref()
            .map_or(true, Experiment::in_experiment)
    }

    fn state_error(&self, suffix: Suffix, err: TestStateError) -> Error {
        Error::TestState {
            step_name: self.step_name(suffix),
            err,
        }
    }

    /// Returns true if test options are understood by the test.
    ///
    /// Only gtests and the layout test harness accept them.
    fn accepts_test_options(&self) -> bool {
        match &self.kind {
            TestKind::Gtest { .. } => true,
            TestKind::IsolatedScript {
                results_handler, ..
            } => {
                *results_handler == ResultsHandler::LayoutTests
                    || self.target_name().contains("webkit_layout_tests")
                    || self.target_name().contains("blink_web_tests")
            }
            _ => false,
        }
    }

    fn args_for_running(&self, suffix: Suffix, tests_to_retry: Option<&[String]>) -> Vec<String> {
        if !self.accepts_test_options() {
            return self.common.args.clone();
        }
        self.options
            .for_running(suffix, tests_to_retry)
            .merge_into_args(&self.common.args, self.is_gtest())
    }

    fn create_task(
        &self,
        api: &dyn StepApi,
        suffix: Suffix,
        params: &SwarmingParams,
        isolated_hash: String,
    ) -> SwarmingTask {
        let tests_to_retry = self.tests_to_retry(suffix);
        let mut args = self.args_for_running(suffix, tests_to_retry.as_deref());
        let (kind, filter_flag, delimiter) = if self.is_gtest() {
            (TaskKind::Gtest, "--gtest_filter", ":")
        } else {
            (
                TaskKind::IsolatedScript,
                "--isolated-script-test-filter",
                "::",
            )
        };

        let mut shards = params.shards;
        if let Some(tests) = tests_to_retry.filter(|tests| !tests.is_empty()) {
            // Very long filters don't fit on the command line, so all tests are run instead.
            let filter_len: usize = tests
                .iter()
                .map(|test| test.len() + delimiter.len())
                .sum();
            if filter_len < params.filter_char_limit() {
                args = merge_arg(args, filter_flag, Some(&tests.join(delimiter)));
                shards = self.shards_to_retry_with(shards, tests.len());
            }
        }

        let mut env = BTreeMap::new();
        if params.isolate_coverage_data {
            env.insert(
                "LLVM_PROFILE_FILE".to_owned(),
                SWARMING_PROFILE_FILE.to_owned(),
            );
        }

        let mut dimensions: BTreeMap<String, String> = params
            .dimensions
            .iter()
            .filter_map(|(key, value)| value.as_ref().map(|value| (key.clone(), value.clone())))
            .collect();
        if !dimensions.contains_key("os") {
            dimensions.insert("os".to_owned(), api.preferred_os_dimension());
        }

        let priority = match suffix {
            // Retries decide whether a failure is caused by the patch, so they are slightly more
            // urgent.
            Suffix::WithoutPatch => params.priority.saturating_sub(1),
            Suffix::Plain | Suffix::WithPatch => params.priority,
        };

        SwarmingTask {
            title: self.step_name(suffix),
            kind,
            isolated_hash,
            extra_args: args,
            shards,
            priority,
            dimensions,
            optional_dimensions: params.optional_dimensions.clone(),
            expiration: params.expiration,
            hard_timeout: params.hard_timeout,
            io_timeout: params.io_timeout,
            cipd_packages: params.cipd_packages.clone(),
            service_account: params.service_account.clone(),
            merge: params.merge.clone(),
            trigger_script: params.trigger_script.clone(),
            idempotent: params.idempotent,
            ignore_task_failure: params.ignore_task_failure,
            env,
        }
    }

    fn local_invocation(&self, suffix: Suffix) -> LocalInvocation {
        let tests_to_retry = self.tests_to_retry(suffix);
        let mut invocation = LocalInvocation {
            step_name: self.step_name(suffix),
            kind: LocalKind::Gtest,
            target: self.target_name().to_owned(),
            args: self.args_for_running(suffix, tests_to_retry.as_deref()),
            use_xvfb: false,
            env: BTreeMap::new(),
            set_up: self.common.set_up.clone(),
            tear_down: self.common.tear_down.clone(),
        };

        match &self.kind {
            TestKind::Gtest { execution } => {
                if let Some(tests) = tests_to_retry.filter(|tests| !tests.is_empty()) {
                    invocation.args = merge_arg(
                        invocation.args,
                        "--gtest_filter",
                        Some(&tests.join(":")),
                    );
                }
                if let Execution::Local(local) = execution {
                    invocation.use_xvfb = local.use_xvfb;
                }
            }
            TestKind::IsolatedScript { execution, .. } => {
                invocation.kind = LocalKind::IsolatedScript;
                if let Execution::Local(local) = execution {
                    if local.isolate_coverage_data {
                        invocation.env.insert(
                            "LLVM_PROFILE_FILE".to_owned(),
                            LOCAL_PROFILE_FILE.to_owned(),
                        );
                    }
                }
            }
            TestKind::Script { script, .. } => {
                invocation.kind = LocalKind::Script;
                let basename = script.rsplit('/').next().unwrap_or(script);
                invocation.target = format!("//testing/scripts/{}", basename);
                let mut args = Vec::new();
                if !self.common.args.is_empty() {
                    args.push("--args".to_owned());
                    args.push(Value::from(self.common.args.clone()).to_string());
                }
                args.push("run".to_owned());
                if let Some(tests) = tests_to_retry.filter(|tests| !tests.is_empty()) {
                    args.push("--filter-file".to_owned());
                    args.push(Value::from(tests).to_string());
                }
                invocation.args = args;
            }
            TestKind::AndroidJunit => {
                invocation.kind = LocalKind::AndroidJunit;
                invocation.target = self.common.name.clone();
            }
            TestKind::WebViewCts {
                platform,
                arch,
                command_line_args,
            } => {
                invocation.kind = LocalKind::WebViewCts;
                invocation.target = "system_webview_apk".to_owned();
                let mut args = vec![
                    format!("--platform={}", platform),
                    format!("--arch={}", arch),
                ];
                args.extend(command_line_args.iter().cloned());
                invocation.args = args;
            }
            TestKind::Instrumentation => {
                invocation.kind = LocalKind::Instrumentation;
            }
        }
        invocation
    }

    fn local_results(
        &self,
        api: &mut dyn StepApi,
        suffix: Suffix,
        outcome: &StepOutcome,
    ) -> TestRun {
        match &self.kind {
            TestKind::IsolatedScript {
                results_handler, ..
            } => {
                let run = isolated_script_results(*results_handler, outcome);
                if outcome.retcode == 0 && !run.valid {
                    // The step itself succeeded, so nothing else marks this run as broken.
                    api.failing_step(
                        &format!("{} had invalid results", self.step_name(suffix)),
                        "The test exited successfully but did not write valid results.",
                    );
                }
                run
            }
            TestKind::Script { .. } => {
                match TestRun::from_script_json(outcome.json_output.as_ref()) {
                    Some(run) => run,
                    None => {
                        let contents = outcome.json_output.clone().unwrap_or(Value::Null);
                        api.failing_step(
                            &format!(
                                "{} with suffix {} had an invalid result",
                                self.name(),
                                suffix.as_str()
                            ),
                            &format!(
                                "The recipe expected the result to contain the key 'failures'. \
                                 Contents are:\n{:#}",
                                contents
                            ),
                        );
                        TestRun::invalid()
                    }
                }
            }
            TestKind::Gtest { .. }
            | TestKind::AndroidJunit
            | TestKind::WebViewCts { .. }
            | TestKind::Instrumentation => {
                TestRun::from_gtest_json(outcome.json_output.as_ref())
            }
        }
    }

    /// Stores the results of a run. Each suffix may only be recorded once.
    pub(crate) fn record(
        &mut self,
        suffix: Suffix,
        outcome: StepOutcome,
        run: TestRun,
    ) -> Result<(), Error> {
        if self.state.runs.contains(suffix) {
            return Err(self.state_error(suffix, TestStateError::AlreadyCollected));
        }
        if self.experiment.is_some() && (!run.valid || !run.failures.is_empty()) {
            warn!(
                "ignoring results of experimental test '{}' (valid: {}, failures: {})",
                self.step_name(suffix),
                run.valid,
                run.failures.len()
            );
        }
        let step_name = if outcome.step_name.is_empty() {
            self.step_name(suffix)
        } else {
            outcome.step_name
        };
        let recorded = self.state.step_names.insert_new(suffix, step_name).is_ok()
            && self.state.task_ids.insert_new(suffix, outcome.task_ids).is_ok()
            && self.state.runs.insert_new(suffix, run).is_ok();
        if recorded {
            Ok(())
        } else {
            Err(self.state_error(suffix, TestStateError::AlreadyCollected))
        }
    }
}

/// Interprets the output of an isolated script.
///
/// Exit codes above [`MAX_FAILURES_EXIT_STATUS`] mean the script didn't finish, so its results are
/// invalid regardless of what it wrote.
fn isolated_script_results(handler: ResultsHandler, outcome: &StepOutcome) -> TestRun {
    let mut run = handler.validate(outcome.json_output.as_ref());
    if outcome.retcode > MAX_FAILURES_EXIT_STATUS {
        run.valid = false;
    }
    run
}
