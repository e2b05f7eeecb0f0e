// Copyright (c) The cargo-guppy Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Generating tests from test specs.
//!
//! [`generate_tests`] turns a builder's [`SourceSideBuilderSpec`] and the recipe-side
//! [`TestSpec`]s of its [`BotSpec`] into [`Test`] instances. Generation is a pure function of its
//! inputs: problems with individual entries are returned as [`Diagnostic`]s for the caller to
//! report, and the offending entry (or part of it) is skipped.

mod args;
mod entries;

pub use args::safe_substitute;
pub use entries::*;

use crate::{
    api::{BuildProperties, ScriptHook},
    bot_spec::BotSpec,
    steps::{
        Execution, Experiment, LocalParams, ResultsHandler, SwarmingParams, Test, TestCommon,
        TestKind, DEFAULT_TASK_PRIORITY,
    },
    BuilderId,
};
use serde::Serialize;
use std::collections::BTreeMap;

/// Everything test generation needs to know about the builder and the build.
#[derive(Clone, Copy, Debug)]
pub struct GeneratorContext<'a> {
    /// The builder whose tests are generated.
    pub builder_id: &'a BuilderId,
    /// The builder's spec.
    pub bot_spec: &'a BotSpec,
    /// The properties of the current build.
    pub properties: &'a BuildProperties,
    /// The compile targets of each script in `testing/scripts`, keyed by script name.
    pub scripts_compile_targets: &'a BTreeMap<String, Vec<String>>,
}

/// A problem with a test spec, to be reported as a failing step.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct Diagnostic {
    /// The name of the failing step.
    pub step_name: String,
    /// A description of the problem.
    pub details: String,
}

impl Diagnostic {
    pub(crate) fn new(step_name: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            step_name: step_name.into(),
            details: details.into(),
        }
    }
}

/// The result of test generation.
#[derive(Clone, Debug, Default)]
pub struct GeneratorOutput {
    /// The generated tests, in order.
    pub tests: Vec<Test>,
    /// Problems found along the way.
    pub diagnostics: Vec<Diagnostic>,
}

/// Generates the tests for a builder.
///
/// Recipe-side test specs come first, followed by the source-side entries: isolated scripts,
/// gtests, CTS tests, instrumentation tests, JUnit tests and scripts.
pub fn generate_tests(ctx: GeneratorContext<'_>, spec: &SourceSideBuilderSpec) -> GeneratorOutput {
    let mut generator = Generator {
        ctx,
        output: GeneratorOutput::default(),
    };

    for test_spec in &ctx.bot_spec.fields().test_specs {
        generator.test_spec(test_spec);
    }
    for entry in &spec.isolated_scripts {
        generator.isolated_script(entry);
    }
    for entry in &spec.gtest_tests {
        generator.gtest(entry);
    }
    for entry in &spec.cts_tests {
        generator.cts(entry);
    }
    for entry in &spec.instrumentation_tests {
        generator.instrumentation(entry);
    }
    for entry in &spec.junit_tests {
        generator.junit(entry);
    }
    for entry in &spec.scripts {
        generator.script(entry);
    }

    generator.output
}

struct Generator<'a> {
    ctx: GeneratorContext<'a>,
    output: GeneratorOutput,
}

impl<'a> Generator<'a> {
    fn test_spec(&mut self, test_spec: &TestSpec) {
        match test_spec {
            TestSpec::Gtest(entry) => self.gtest(entry),
            TestSpec::IsolatedScript(entry) => self.isolated_script(entry),
            TestSpec::Script(entry) => self.script(entry),
            TestSpec::Junit(entry) => self.junit(entry),
            TestSpec::Cts(entry) => self.cts(entry),
            TestSpec::Instrumentation(entry) => self.instrumentation(entry),
        }
    }

    fn gtest(&mut self, entry: &GtestEntry) {
        let mut common = match self.test_common(&entry.common) {
            Some(common) => common,
            None => return,
        };
        if entry.shard_index != 0 || entry.total_shards != 1 {
            common.args.push(format!(
                "--test-launcher-shard-index={}",
                entry.shard_index
            ));
            common.args.push(format!(
                "--test-launcher-total-shards={}",
                entry.total_shards
            ));
        }

        let local = LocalParams {
            use_xvfb: entry.use_xvfb,
            isolate_coverage_data: entry.common.isolate_coverage_data,
        };
        self.push_with_executions(&entry.common, common, local, |execution| {
            TestKind::Gtest { execution }
        });
    }

    fn isolated_script(&mut self, entry: &IsolatedScriptEntry) {
        let common = match self.test_common(&entry.common) {
            Some(common) => common,
            None => return,
        };

        let handler_name = entry.results_handler.as_deref().unwrap_or("default");
        let results_handler = match ResultsHandler::from_name(handler_name) {
            Some(handler) => handler,
            None => {
                self.diagnostic(
                    "isolated_scripts spec format error",
                    format!(
                        "The isolated_scripts target \"{}\" contains a custom results_handler \
                         \"{}\" but that result handler was not found.",
                        common.name, handler_name
                    ),
                );
                ResultsHandler::default()
            }
        };

        let local = LocalParams {
            use_xvfb: false,
            isolate_coverage_data: entry.common.isolate_coverage_data,
        };
        self.push_with_executions(&entry.common, common, local, |execution| {
            TestKind::IsolatedScript {
                execution,
                results_handler,
            }
        });
    }

    fn script(&mut self, entry: &ScriptEntry) {
        let mut substitutions = BTreeMap::new();
        substitutions.insert("name", entry.name.clone());
        let script_compile_targets = self
            .ctx
            .scripts_compile_targets
            .get(&entry.script)
            .map(|targets| {
                targets
                    .iter()
                    .map(|target| safe_substitute(target, &substitutions))
                    .collect()
            })
            .unwrap_or_default();

        let mut common = self.waterfall_common(&entry.name);
        common.args = entry.args.clone();
        common.override_compile_targets = entry.override_compile_targets.clone();
        self.output.tests.push(Test::new(
            common,
            TestKind::Script {
                script: entry.script.clone(),
                script_compile_targets,
            },
        ));
    }

    fn junit(&mut self, entry: &JunitEntry) {
        let common = self.waterfall_common(&entry.test);
        self.output
            .tests
            .push(Test::new(common, TestKind::AndroidJunit));
    }

    fn cts(&mut self, entry: &CtsEntry) {
        let common = self.waterfall_common(&format!("WebView CTS: {}", entry.platform));
        self.output.tests.push(Test::new(
            common,
            TestKind::WebViewCts {
                platform: entry.platform.clone(),
                arch: entry.arch.clone(),
                command_line_args: entry.command_line_args.clone(),
            },
        ));
    }

    fn instrumentation(&mut self, entry: &InstrumentationEntry) {
        let name = entry.name.as_deref().unwrap_or(&entry.test);
        let mut common = self.waterfall_common(name);
        common.target_name = Some(entry.test.clone());
        common.args = entry.args.clone();
        self.output
            .tests
            .push(Test::new(common, TestKind::Instrumentation));
    }

    // ---
    // Helper methods
    // ---

    fn diagnostic(&mut self, step_name: &str, details: String) {
        self.output
            .diagnostics
            .push(Diagnostic::new(step_name, details));
    }

    fn waterfall_common(&self, name: &str) -> TestCommon {
        TestCommon {
            waterfall_mastername: Some(self.ctx.builder_id.master().to_owned()),
            waterfall_buildername: Some(self.ctx.builder_id.builder().to_owned()),
            ..TestCommon::new(name)
        }
    }

    /// Builds the configuration shared by gtests and isolated scripts, or returns `None` if the
    /// entry names no target.
    fn test_common(&mut self, entry: &TestEntryCommon) -> Option<TestCommon> {
        let name = match entry.display_name() {
            Some(name) => name.to_owned(),
            None => {
                self.diagnostic(
                    "test spec format error",
                    "A test entry has none of \"test\", \"isolate_name\" or \"name\".".to_owned(),
                );
                return None;
            }
        };

        let args = args::args_for_test(
            entry,
            &name,
            self.ctx.properties,
            &mut self.output.diagnostics,
        );
        let set_up = self.checkout_hooks(&name, "set up script", &entry.setup);
        let tear_down = self.checkout_hooks(&name, "tear down script", &entry.teardown);

        let mut common = self.waterfall_common(&name);
        common.target_name = entry.target().map(str::to_owned);
        common.override_compile_targets = entry.override_compile_targets.clone();
        common.args = args;
        common.set_up = set_up;
        common.tear_down = tear_down;
        Some(common)
    }

    fn checkout_hooks(&mut self, name: &str, what: &str, hooks: &[ScriptHook]) -> Vec<ScriptHook> {
        hooks
            .iter()
            .filter_map(|hook| self.checkout_hook(name, what, hook))
            .collect()
    }

    /// Returns the hook if its script is relative to the checkout, and reports it otherwise.
    ///
    /// Hooks without a script are kept as they are.
    fn checkout_hook(&mut self, name: &str, what: &str, hook: &ScriptHook) -> Option<ScriptHook> {
        match hook.script.as_deref() {
            Some(script) if !script.starts_with("//") => {
                self.diagnostic(
                    "test spec format error",
                    format!(
                        "The test target \"{}\" contains a custom {} \"{}\" that doesn't match \
                         the expected format. Custom {} entries should be a path relative to the \
                         top-level chromium src directory and should start with \"//\".",
                        name, what, script, what
                    ),
                );
                None
            }
            _ => Some(hook.clone()),
        }
    }

    /// Pushes one swarmed test per dimension set, or a single local test.
    fn push_with_executions(
        &mut self,
        entry: &TestEntryCommon,
        common: TestCommon,
        local: LocalParams,
        make_kind: impl Fn(Execution) -> TestKind,
    ) {
        let executions = if entry.swarming.can_use_on_swarming_builders {
            let name = common.name.clone();
            self.swarming_params(&name, entry)
                .into_iter()
                .map(Execution::Swarmed)
                .collect()
        } else {
            vec![Execution::Local(local)]
        };

        for execution in executions {
            let mut test = Test::new(common.clone(), make_kind(execution));
            if let Some(percentage) = entry.experiment_percentage {
                let experiment = Experiment::new(percentage, self.ctx.properties, &test.name());
                test = test.with_experiment(experiment);
            }
            self.output.tests.push(test);
        }
    }

    /// Returns the swarming parameters for each dimension set of an entry.
    fn swarming_params(&mut self, name: &str, entry: &TestEntryCommon) -> Vec<SwarmingParams> {
        let ctx = self.ctx;
        let swarming = &entry.swarming;
        let fields = ctx.bot_spec.fields();

        let base_priority = i64::from(
            fields
                .swarming_default_priority
                .unwrap_or(DEFAULT_TASK_PRIORITY),
        );
        let priority = (base_priority + swarming.priority_adjustment).clamp(0, i64::from(u32::MAX));

        let merge = entry
            .merge
            .as_ref()
            .and_then(|hook| self.checkout_hook(name, "merge_script", hook));
        let trigger_script = entry
            .trigger_script
            .as_ref()
            .and_then(|hook| self.checkout_hook(name, "trigger_script", hook));

        let optional_dimensions = swarming
            .optional_dimensions
            .iter()
            .map(|(expiration, sets)| (expiration.clone(), sets.to_vec()))
            .collect();

        let template = SwarmingParams {
            shards: swarming.shards.max(1),
            dimensions: BTreeMap::new(),
            optional_dimensions,
            extra_suffix: None,
            expiration: swarming.expiration,
            hard_timeout: swarming.hard_timeout,
            io_timeout: swarming.io_timeout,
            priority: priority as u32,
            cipd_packages: swarming.cipd_packages.clone(),
            service_account: swarming.service_account.clone(),
            merge,
            trigger_script,
            idempotent: swarming.idempotent,
            ignore_task_failure: swarming.ignore_task_failure,
            isolate_coverage_data: entry.isolate_coverage_data,
        };

        let default_set = [BTreeMap::new()];
        let dimension_sets = if swarming.dimension_sets.is_empty() {
            &default_set[..]
        } else {
            &swarming.dimension_sets[..]
        };

        dimension_sets
            .iter()
            .map(|dimension_set| {
                let mut dimensions: BTreeMap<String, Option<String>> = fields
                    .swarming_dimensions
                    .iter()
                    .map(|(key, value)| (key.clone(), Some(value.clone())))
                    .collect();
                dimensions.extend(
                    dimension_set
                        .iter()
                        .map(|(key, value)| (key.clone(), value.clone())),
                );
                SwarmingParams {
                    dimensions,
                    ..template.clone()
                }
            })
            .collect()
    }
}
