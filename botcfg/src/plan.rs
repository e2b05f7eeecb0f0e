// Copyright (c) The cargo-guppy Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The build plan printed by `botcfg plan`.

use crate::output::Styles;
use chromium_tests::{
    config::{BuildConfig, CompileTargetsReport},
    generators::Diagnostic,
    steps::{Test, TestKind},
    try_spec::ExecutionMode,
    BuilderId, Error,
};
use owo_colors::OwoColorize;
use serde::Serialize;
use std::io::{self, Write};

/// Everything a build of a configuration would compile and run.
#[derive(Clone, Debug, Serialize)]
pub struct BuildPlan {
    /// The mirrored builders.
    pub builder_ids: Vec<BuilderId>,
    /// Whether tests are run after compiling.
    pub execution_mode: ExecutionMode,
    /// Tests run by the mirrored builders and testers.
    pub tests_in_scope: Vec<PlannedTest>,
    /// Tests run by builders triggered from the mirrored builders.
    pub tests_triggered: Vec<PlannedTest>,
    /// Sorted targets to compile.
    pub compile_targets: Vec<String>,
    /// Compile target migration status per mirrored builder.
    pub compile_targets_reports: Vec<CompileTargetsReport>,
    /// Test spec problems, which would be reported as failing steps.
    pub diagnostics: Vec<Diagnostic>,
}

/// A test in a [`BuildPlan`].
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct PlannedTest {
    /// The builder the test is generated for.
    pub builder_id: BuilderId,
    /// The display name, including any hardware suffix.
    pub name: String,
    /// What kind of test this is.
    pub kind: &'static str,
    /// The target the test runs.
    pub target_name: String,
    /// True if the test runs as swarming tasks.
    pub swarmed: bool,
    /// The percentage of builds the test runs on, for experimental tests.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub experiment_percentage: Option<u8>,
}

impl PlannedTest {
    fn new(builder_id: &BuilderId, test: &Test) -> Self {
        Self {
            builder_id: builder_id.clone(),
            name: test.name(),
            kind: kind_label(test.kind()),
            target_name: test.target_name().to_owned(),
            swarmed: test.runs_on_swarming(),
            experiment_percentage: test.experiment().map(|experiment| experiment.percentage()),
        }
    }
}

impl BuildPlan {
    /// Collects the plan for a build configuration.
    pub fn new(build_config: &BuildConfig<'_>, diagnostics: Vec<Diagnostic>) -> Result<Self, Error> {
        let bot_config = build_config.bot_config();
        let root_keys = bot_config.root_keys();

        let planned = |builder_id: &BuilderId| {
            build_config
                .tests_on(builder_id)
                .iter()
                .map(move |test| PlannedTest::new(builder_id, test))
                .collect::<Vec<_>>()
        };
        let tests_in_scope = root_keys.iter().flat_map(planned).collect();
        let tests_triggered = bot_config
            .all_keys()
            .iter()
            .filter(|builder_id| !root_keys.contains(*builder_id))
            .flat_map(planned)
            .collect();

        let (compile_targets, compile_targets_reports) =
            build_config.get_compile_targets(build_config.tests_in_scope())?;

        Ok(Self {
            builder_ids: bot_config.builder_ids().to_vec(),
            execution_mode: bot_config.try_spec().execution_mode,
            tests_in_scope,
            tests_triggered,
            compile_targets,
            compile_targets_reports,
            diagnostics,
        })
    }

    /// Writes a human-readable rendition of the plan.
    pub(crate) fn write_text(&self, styles: &Styles, mut out: impl Write) -> io::Result<()> {
        write!(out, "plan for")?;
        for builder_id in &self.builder_ids {
            write!(out, " {}", builder_id.style(styles.builder_id))?;
        }
        if self.execution_mode == ExecutionMode::Compile {
            write!(out, " (compile only)")?;
        }
        writeln!(out)?;

        write_tests(&mut out, styles, "tests in scope", &self.tests_in_scope)?;
        write_tests(&mut out, styles, "tests triggered", &self.tests_triggered)?;

        writeln!(out, "{}:", "compile targets".style(styles.heading))?;
        for target in &self.compile_targets {
            writeln!(out, "  {}", target)?;
        }

        for report in &self.compile_targets_reports {
            if report.is_complete() {
                continue;
            }
            writeln!(
                out,
                "{} {}: {}",
                "needs migration for".style(styles.heading),
                report.builder_id.style(styles.builder_id),
                report.needs_migration.join(", "),
            )?;
        }

        if !self.diagnostics.is_empty() {
            writeln!(out, "{}:", "diagnostics".style(styles.heading))?;
            for diagnostic in &self.diagnostics {
                writeln!(
                    out,
                    "  {}: {}",
                    diagnostic.step_name.style(styles.diagnostic),
                    diagnostic.details,
                )?;
            }
        }
        Ok(())
    }
}

fn write_tests(
    out: &mut impl Write,
    styles: &Styles,
    heading: &str,
    tests: &[PlannedTest],
) -> io::Result<()> {
    writeln!(out, "{} ({}):", heading.style(styles.heading), tests.len())?;
    for test in tests {
        write!(
            out,
            "  {} [{}",
            test.name.style(styles.test_name),
            test.kind
        )?;
        if test.swarmed {
            write!(out, ", swarmed")?;
        }
        write!(out, "] on {}", test.builder_id.style(styles.builder_id))?;
        if let Some(percentage) = test.experiment_percentage {
            write!(
                out,
                " {}",
                format!("(experimental, {}%)", percentage).style(styles.experimental)
            )?;
        }
        writeln!(out)?;
    }
    Ok(())
}

fn kind_label(kind: &TestKind) -> &'static str {
    match kind {
        TestKind::Gtest { .. } => "gtest",
        TestKind::IsolatedScript { .. } => "isolated script",
        TestKind::Script { .. } => "script",
        TestKind::AndroidJunit => "junit",
        TestKind::WebViewCts { .. } => "webview cts",
        TestKind::Instrumentation => "instrumentation",
    }
}
