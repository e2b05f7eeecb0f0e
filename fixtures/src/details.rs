// Copyright (c) The cargo-guppy Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::builder_id;
use chromium_tests::{config::BotConfig, load::LoadedConfig, BuilderId};
use pretty_assertions::assert_eq;
use std::collections::BTreeSet;

/// This captures configuration facts that are relevant for tests. Add more details as tests
/// need them.
pub struct FixtureDetails {
    builder_count: usize,
    try_builder_count: usize,
    closures: Vec<(BuilderId, BTreeSet<BuilderId>)>,
}

impl FixtureDetails {
    pub fn new(builder_count: usize, try_builder_count: usize) -> Self {
        Self {
            builder_count,
            try_builder_count,
            closures: vec![],
        }
    }

    /// Adds the expected set of builders triggered, directly or transitively, by `root`.
    pub fn with_closure<'a>(
        mut self,
        root: &str,
        closure: impl IntoIterator<Item = &'a str>,
    ) -> Self {
        self.closures.push((
            builder_id(root),
            closure.into_iter().map(builder_id).collect(),
        ));
        self
    }

    pub fn assert_counts(&self, config: &LoadedConfig) {
        assert_eq!(
            self.builder_count,
            config.bot_db.len(),
            "builder counts should match"
        );
        assert_eq!(
            self.try_builder_count,
            config.try_db.len(),
            "try builder counts should match"
        );
    }

    pub fn assert_closures(&self, config: &LoadedConfig) {
        let graph = config.bot_db.bot_graph().expect("graph is acyclic");
        for (root, expected) in &self.closures {
            let actual = graph.transitive_closure(std::iter::once(root));
            assert_eq!(expected, &actual, "closure for {} should match", root);
        }
        assert!(
            graph.dangling_parents().is_empty(),
            "fixtures should not have dangling parents: {:?}",
            graph.dangling_parents()
        );
    }

    /// Checks that every try builder resolves to a bot config.
    pub fn assert_try_builders_resolve(&self, config: &LoadedConfig) {
        for (try_id, try_spec) in config.try_db.iter() {
            let bot_config = BotConfig::lookup(&config.bot_db, &config.try_db, try_id)
                .unwrap_or_else(|err| panic!("try builder {} should resolve: {}", try_id, err));
            assert_eq!(
                try_spec,
                bot_config.try_spec(),
                "try spec for {} should be used as is",
                try_id
            );
        }
    }
}
