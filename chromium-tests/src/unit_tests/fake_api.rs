// Copyright (c) The cargo-guppy Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::api::{BuildProperties, LocalInvocation, StepApi, StepOutcome, SwarmingTask};
use std::collections::BTreeMap;

/// A `StepApi` that records every call and answers from canned outcomes.
#[derive(Debug, Default)]
pub(super) struct FakeApi {
    pub(super) properties: BuildProperties,
    pub(super) isolated: BTreeMap<String, String>,
    /// Outcomes keyed by swarming task title or local step name.
    pub(super) outcomes: BTreeMap<String, StepOutcome>,
    pub(super) triggered: Vec<SwarmingTask>,
    pub(super) collected: Vec<String>,
    pub(super) local_runs: Vec<LocalInvocation>,
    pub(super) failing_steps: Vec<(String, String)>,
}

impl FakeApi {
    pub(super) fn new() -> Self {
        Self {
            properties: BuildProperties {
                buildername: "fake-builder".to_owned(),
                ..BuildProperties::default()
            },
            ..Self::default()
        }
    }

    pub(super) fn with_isolate(mut self, target: &str) -> Self {
        self.isolated
            .insert(target.to_owned(), format!("{}-hash", target));
        self
    }

    pub(super) fn set_outcome(&mut self, step_name: &str, retcode: i32, json: serde_json::Value) {
        self.outcomes.insert(
            step_name.to_owned(),
            StepOutcome {
                step_name: step_name.to_owned(),
                retcode,
                json_output: Some(json),
                task_ids: Vec::new(),
            },
        );
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

impl StepApi for FakeApi {
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
