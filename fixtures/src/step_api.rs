// Copyright (c) The cargo-guppy Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! A fake execution engine for driving tests end to end.

use chromium_tests::api::{
    BuildProperties, LocalInvocation, StepApi, StepOutcome, SwarmingTask,
};
use serde_json::Value;
use std::collections::BTreeMap;

/// A `StepApi` that records every call and answers from canned outcomes.
///
/// Steps without a canned outcome succeed with no JSON output.
#[derive(Debug, Default)]
pub struct FakeStepApi {
    properties: BuildProperties,
    isolated: BTreeMap<String, String>,
    // Keyed by swarming task title or local step name.
    outcomes: BTreeMap<String, StepOutcome>,
    triggered: Vec<SwarmingTask>,
    collected: Vec<String>,
    local_runs: Vec<LocalInvocation>,
    failing_steps: Vec<(String, String)>,
}

impl FakeStepApi {
    pub fn new(properties: BuildProperties) -> Self {
        Self {
            properties,
            ..Self::default()
        }
    }

    /// Creates an engine for a try build of `buildername`.
    pub fn try_build(buildername: &str, patch_issue: u64) -> Self {
        Self::new(BuildProperties {
            buildername: buildername.to_owned(),
            mastername: Some("tryserver.chromium.linux".to_owned()),
            patch_issue: Some(patch_issue),
            patch_set: Some(1),
            is_tryserver: true,
            ..BuildProperties::default()
        })
    }

    /// Marks targets as isolated, with the hash `<target>-hash`.
    pub fn with_isolates<'a>(mut self, targets: impl IntoIterator<Item = &'a str>) -> Self {
        for target in targets {
            self.isolated
                .insert(target.to_owned(), format!("{}-hash", target));
        }
        self
    }

    /// Sets the outcome of the next step named `step_name`.
    pub fn set_outcome(&mut self, step_name: &str, retcode: i32, json_output: Option<Value>) {
        self.outcomes.insert(
            step_name.to_owned(),
            StepOutcome {
                step_name: step_name.to_owned(),
                retcode,
                json_output,
                task_ids: vec![format!("{}-task", step_name)],
            },
        );
    }

    pub fn properties_mut(&mut self) -> &mut BuildProperties {
        &mut self.properties
    }

    pub fn triggered(&self) -> &[SwarmingTask] {
        &self.triggered
    }

    pub fn collected(&self) -> &[String] {
        &self.collected
    }

    pub fn local_runs(&self) -> &[LocalInvocation] {
        &self.local_runs
    }

    pub fn failing_steps(&self) -> &[(String, String)] {
        &self.failing_steps
    }

    fn outcome_for(&mut self, step_name: &str) -> StepOutcome {
        self.outcomes
            .remove(step_name)
            .unwrap_or_else(|| StepOutcome {
                step_name: step_name.to_owned(),
                ..StepOutcome::default()
            })
    }
}

impl StepApi for FakeStepApi {
    fn properties(&self) -> &BuildProperties {
        &self.properties
    }

    fn isolated_hash(&self, target: &str) -> Option<String> {
        self.isolated.get(target).cloned()
    }

    fn trigger_task(&mut self, task: &SwarmingTask) {
        self.triggered.push(task.clone());
    }

    fn collect_task(&mut self, task: &SwarmingTask) -> StepOutcome {
        self.collected.push(task.title.clone());
        self.outcome_for(&task.title)
    }

    fn run_local(&mut self, invocation: &LocalInvocation) -> StepOutcome {
        self.local_runs.push(invocation.clone());
        self.outcome_for(&invocation.step_name)
    }

    fn failing_step(&mut self, name: &str, details: &str) {
        self.failing_steps
            .push((name.to_owned(), details.to_owned()));
    }

    fn preferred_os_dimension(&self) -> String {
        "Ubuntu-16.04".to_owned()
    }
}
