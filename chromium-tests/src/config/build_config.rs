// Copyright (c) The cargo-guppy Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::{
    bot_spec::BotSpec,
    config::{BotConfig, CompileTargetsReport},
    db::MasterSettings,
    generators::SourceSideBuilderSpec,
    steps::Test,
    BuilderId, Error,
};
use std::collections::{BTreeMap, BTreeSet};

/// A [`BotConfig`] together with the source-side specs read for a build and the tests generated
/// from them.
///
/// Source-side specs live in the source tree, so two builds of the same builder can produce
/// different `BuildConfig`s.
#[derive(Debug)]
pub struct BuildConfig<'db> {
    bot_config: BotConfig<'db>,
    source_side_specs: BTreeMap<String, BTreeMap<String, SourceSideBuilderSpec>>,
    tests: BTreeMap<BuilderId, Vec<Test>>,
}

impl<'db> BuildConfig<'db> {
    pub(super) fn new(
        bot_config: BotConfig<'db>,
        source_side_specs: BTreeMap<String, BTreeMap<String, SourceSideBuilderSpec>>,
        tests: BTreeMap<BuilderId, Vec<Test>>,
    ) -> Self {
        Self {
            bot_config,
            source_side_specs,
            tests,
        }
    }

    /// Returns the static configuration this was created from.
    pub fn bot_config(&self) -> &BotConfig<'db> {
        &self.bot_config
    }

    /// Returns the spec of any builder in the database.
    pub fn get_bot_config(&self, builder_id: &BuilderId) -> Result<&'db BotSpec, Error> {
        self.bot_config.bot_spec(builder_id)
    }

    /// Returns the settings of a master.
    pub fn get_master_settings(&self, master: &str) -> Result<&'db MasterSettings, Error> {
        self.bot_config
            .bot_db()
            .master_spec(master)
            .map(|master_spec| master_spec.settings())
            .ok_or_else(|| Error::UnknownMaster(master.to_owned()))
    }

    /// Returns the builders triggered by `parent_id`, with the LUCI project of each one's master.
    pub fn bot_configs_matching_parent_buildername(
        &self,
        parent_id: &BuilderId,
    ) -> Result<Vec<(&'db str, &'db BuilderId, &'db BotSpec)>, Error> {
        let bot_db = self.bot_config.bot_db();
        bot_db
            .bot_graph()?
            .children(parent_id)?
            .into_iter()
            .map(|child_id| {
                let luci_project = bot_db
                    .master_spec(child_id.master())
                    .ok_or_else(|| Error::UnknownMaster(child_id.master().to_owned()))?
                    .settings()
                    .luci_project
                    .as_str();
                Ok((luci_project, child_id, bot_db.spec(child_id)?))
            })
            .collect()
    }

    /// Returns the source-side spec of a builder, if its master's spec has an entry for it.
    pub fn get_source_side_spec(&self, builder_id: &BuilderId) -> Option<&SourceSideBuilderSpec> {
        self.source_side_specs
            .get(builder_id.master())
            .and_then(|specs| specs.get(builder_id.builder()))
    }

    /// Returns the tests of the mirrored builders and every builder they trigger.
    pub fn all_tests(&self) -> Vec<&Test> {
        self.tests_for(self.bot_config.all_keys())
    }

    /// Returns the tests of the mirrored builders and testers.
    pub fn tests_in_scope(&self) -> Vec<&Test> {
        self.tests_for(self.bot_config.root_keys())
    }

    /// Returns the tests of a single builder.
    pub fn tests_on(&self, builder_id: &BuilderId) -> &[Test] {
        self.tests
            .get(builder_id)
            .map_or(&[][..], |tests| tests.as_slice())
    }

    /// Returns the tests of the builders directly triggered by `builder_id`.
    pub fn tests_triggered_by(&self, builder_id: &BuilderId) -> Result<Vec<&Test>, Error> {
        let children = self.bot_config.bot_db().bot_graph()?.children(builder_id)?;
        Ok(self.tests_for(children))
    }

    /// Returns the tests of a single builder, for execution.
    pub fn tests_on_mut(&mut self, builder_id: &BuilderId) -> &mut [Test] {
        self.tests
            .get_mut(builder_id)
            .map_or(&mut [][..], |tests| tests.as_mut_slice())
    }

    /// Returns the tests of the mirrored builders and testers, for execution.
    pub fn tests_in_scope_mut(&mut self) -> Vec<&mut Test> {
        let root_keys = self.bot_config.root_keys();
        self.tests
            .iter_mut()
            .filter(|(builder_id, _)| root_keys.contains(builder_id))
            .flat_map(|(_, tests)| tests.iter_mut())
            .collect()
    }

    /// Returns the sorted targets to compile for the mirrored builders and `tests`.
    ///
    /// Also returns, for each mirrored builder, which of its recipe-side compile targets are
    /// repeated in its source-side spec.
    pub fn get_compile_targets<'a>(
        &self,
        tests: impl IntoIterator<Item = &'a Test>,
    ) -> Result<(Vec<String>, Vec<CompileTargetsReport>), Error> {
        let mut compile_targets = BTreeSet::new();
        let mut reports = Vec::new();
        for builder_id in self.bot_config.builder_ids() {
            let recipe_side = &self.get_bot_config(builder_id)?.fields().compile_targets;
            let source_side = self
                .get_source_side_spec(builder_id)
                .map_or(&[][..], |spec| spec.additional_compile_targets.as_slice());

            compile_targets.extend(recipe_side.iter().cloned());
            compile_targets.extend(source_side.iter().cloned());
            reports.push(CompileTargetsReport::new(
                builder_id.clone(),
                recipe_side,
                source_side,
            ));
        }

        if self.bot_config.add_tests_as_compile_targets()? {
            for test in tests {
                compile_targets.extend(test.compile_targets());
            }
        }

        Ok((compile_targets.into_iter().collect(), reports))
    }

    // ---
    // Helper methods
    // ---

    fn tests_for<'a>(&self, keys: impl IntoIterator<Item = &'a BuilderId>) -> Vec<&Test> {
        keys.into_iter()
            .flat_map(|builder_id| self.tests_on(builder_id))
            .collect()
    }
}
