// Copyright (c) The cargo-guppy Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::BuilderId;
use log::info;
use serde::Serialize;

/// Tracks moving a builder's compile targets from its recipe-side spec to its source-side spec.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct CompileTargetsReport {
    /// The builder the report is for.
    pub builder_id: BuilderId,
    /// Targets present in both specs. These can be dropped from the recipe-side spec.
    pub migrated: Vec<String>,
    /// Targets present only in the recipe-side spec.
    pub needs_migration: Vec<String>,
}

impl CompileTargetsReport {
    pub(super) fn new(builder_id: BuilderId, recipe_side: &[String], source_side: &[String]) -> Self {
        let (migrated, needs_migration) = recipe_side
            .iter()
            .cloned()
            .partition(|target| source_side.contains(target));
        Self {
            builder_id,
            migrated,
            needs_migration,
        }
    }

    /// Returns true if there is nothing left to migrate.
    pub fn is_complete(&self) -> bool {
        self.needs_migration.is_empty()
    }

    /// Logs the report at info level.
    pub fn log(&self) {
        if self.migrated.is_empty() && self.needs_migration.is_empty() {
            return;
        }
        info!(
            "compile targets for {}: migrated [{}], needs migration [{}]",
            self.builder_id,
            self.migrated.join(", "),
            self.needs_migration.join(", "),
        );
    }
}
