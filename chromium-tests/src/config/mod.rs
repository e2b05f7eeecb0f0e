// Copyright (c) The cargo-guppy Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Resolving a builder, or the builders a try builder mirrors, into a single configuration.
//!
//! A [`BotConfig`] is the static part: the specs of the mirrored builders, which must agree on
//! the fields read through it. A [`BuildConfig`] adds what is read from the source tree: the
//! source-side specs and the tests generated from them.

mod build_config;
mod report;
mod source_side;

pub use build_config::*;
pub use report::*;
pub use source_side::*;

use crate::{
    api::BuildProperties,
    bot_spec::BotSpec,
    db::BotDatabase,
    errors::ConsistencyError,
    generators::{generate_tests, Diagnostic, GeneratorContext, SourceSideBuilderSpec},
    config::source_side::{parse_builder_spec, parse_builder_specs},
    try_spec::{TryDatabase, TryMirror, TrySpec},
    BuilderId, Error,
};
use debug_ignore::DebugIgnore;
use log::debug;
use std::{
    collections::{BTreeMap, BTreeSet},
    fmt,
};

/// The static configuration of a build: the specs of one or more mirrored builders.
#[derive(Clone, Debug)]
pub struct BotConfig<'db> {
    bot_db: DebugIgnore<&'db BotDatabase>,
    try_spec: TrySpec,
    builder_ids: Vec<BuilderId>,
    root_keys: Vec<BuilderId>,
    all_keys: BTreeSet<BuilderId>,
}

impl<'db> BotConfig<'db> {
    /// Creates a configuration for a set of mirrors, with default try settings.
    ///
    /// Returns an error if no mirrors are given, or if a mirrored master or builder isn't in the
    /// database.
    pub fn create(
        bot_db: &'db BotDatabase,
        mirrors: impl IntoIterator<Item = impl Into<TryMirror>>,
    ) -> Result<Self, Error> {
        let try_spec = TrySpec::create(
            mirrors,
            Default::default(),
            Vec::<String>::new(),
            true,
        );
        Self::from_try_spec(bot_db, try_spec)
    }

    /// Creates a configuration for the mirrors of a try spec.
    pub fn from_try_spec(bot_db: &'db BotDatabase, try_spec: TrySpec) -> Result<Self, Error> {
        if try_spec.mirrors.is_empty() {
            return Err(Error::NoMirrors);
        }

        let mut builder_ids = Vec::with_capacity(try_spec.mirrors.len());
        let mut root_keys = Vec::new();
        for mirror in &try_spec.mirrors {
            check_known(bot_db, mirror.builder_id())?;
            push_unique(&mut builder_ids, mirror.builder_id());
            push_unique(&mut root_keys, mirror.builder_id());
        }
        for tester_id in try_spec.mirrors.iter().filter_map(TryMirror::tester_id) {
            check_known(bot_db, tester_id)?;
            push_unique(&mut root_keys, tester_id);
        }

        let all_keys = bot_db.bot_graph()?.transitive_closure(&root_keys);
        debug!(
            "bot config for {} mirror(s) covers {} builder(s)",
            try_spec.mirrors.len(),
            all_keys.len()
        );

        Ok(Self {
            bot_db: DebugIgnore(bot_db),
            try_spec,
            builder_ids,
            root_keys,
            all_keys,
        })
    }

    /// Looks up the configuration for the builder running a build.
    ///
    /// Try builders use their try spec. Any other builder mirrors only itself.
    pub fn lookup(
        bot_db: &'db BotDatabase,
        try_db: &TryDatabase,
        builder_id: &BuilderId,
    ) -> Result<Self, Error> {
        match try_db.get(builder_id) {
            Some(try_spec) => Self::from_try_spec(bot_db, try_spec.clone()),
            None => Self::create(bot_db, vec![builder_id.clone()]),
        }
    }

    /// Returns the database this configuration was created from.
    pub fn bot_db(&self) -> &'db BotDatabase {
        *self.bot_db
    }

    /// Returns the try spec this configuration was created from.
    pub fn try_spec(&self) -> &TrySpec {
        &self.try_spec
    }

    /// Returns the mirrored builders, not including testers.
    pub fn builder_ids(&self) -> &[BuilderId] {
        &self.builder_ids
    }

    /// Returns the mirrored builders and testers.
    pub fn root_keys(&self) -> &[BuilderId] {
        &self.root_keys
    }

    /// Returns the mirrored builders and testers, and every builder they trigger.
    pub fn all_keys(&self) -> &BTreeSet<BuilderId> {
        &self.all_keys
    }

    /// Returns the spec of a builder in the database.
    pub fn bot_spec(&self, builder_id: &BuilderId) -> Result<&'db BotSpec, Error> {
        self.bot_db().spec(builder_id)
    }

    /// Returns the value of a field, which must be the same for every mirrored builder.
    ///
    /// `field` is used for error reporting. Returns a [`ConsistencyError`] listing every
    /// builder's value if the builders disagree.
    pub fn uniform<T, F>(&self, field: &'static str, accessor: F) -> Result<T, Error>
    where
        T: PartialEq + fmt::Debug,
        F: Fn(&BotSpec) -> T,
    {
        let mut values = Vec::with_capacity(self.builder_ids.len());
        for builder_id in &self.builder_ids {
            values.push((builder_id, accessor(self.bot_spec(builder_id)?)));
        }

        let consistent = values.windows(2).all(|pair| pair[0].1 == pair[1].1);
        if !consistent {
            let rendered = values
                .iter()
                .map(|(builder_id, value)| ((*builder_id).clone(), format!("{:?}", value)))
                .collect();
            return Err(Error::Consistency(ConsistencyError::new(field, rendered)));
        }
        match values.into_iter().next() {
            Some((_, value)) => Ok(value),
            None => Err(Error::NoMirrors),
        }
    }

    /// Returns the `chromium-config` of the mirrored builders.
    pub fn chromium_config(&self) -> Result<Option<String>, Error> {
        self.uniform("chromium-config", |spec| spec.fields().chromium_config.clone())
    }

    /// Returns the `gclient-config` of the mirrored builders.
    pub fn gclient_config(&self) -> Result<Option<String>, Error> {
        self.uniform("gclient-config", |spec| spec.fields().gclient_config.clone())
    }

    /// Returns the `chromium-tests-config` of the mirrored builders.
    pub fn chromium_tests_config(&self) -> Result<String, Error> {
        self.uniform("chromium-tests-config", |spec| {
            spec.fields().chromium_tests_config.clone()
        })
    }

    /// Returns whether the mirrored builders disable tests.
    pub fn disable_tests(&self) -> Result<bool, Error> {
        self.uniform("disable-tests", |spec| spec.fields().disable_tests)
    }

    /// Returns whether the mirrored builders compile the targets of their tests.
    pub fn add_tests_as_compile_targets(&self) -> Result<bool, Error> {
        self.uniform("add-tests-as-compile-targets", |spec| {
            spec.fields().add_tests_as_compile_targets
        })
    }

    /// Returns the LUCI project of the mirrored builders.
    pub fn luci_project(&self) -> Result<String, Error> {
        self.uniform("luci-project", |spec| spec.fields().luci_project.clone())
    }

    /// Returns the swarming server of the mirrored builders.
    pub fn swarming_server(&self) -> Result<Option<String>, Error> {
        self.uniform("swarming-server", |spec| {
            spec.fields().swarming_server.clone()
        })
    }

    /// Returns the isolate server of the mirrored builders.
    pub fn isolate_server(&self) -> Result<Option<String>, Error> {
        self.uniform("isolate-server", |spec| spec.fields().isolate_server.clone())
    }

    /// Returns whether the mirrored builders clobber their checkouts.
    pub fn clobber(&self) -> Result<bool, Error> {
        self.uniform("clobber", |spec| spec.fields().clobber)
    }

    /// Returns the platform the mirrored builders simulate.
    pub fn simulation_platform(&self) -> Result<Option<String>, Error> {
        self.uniform("simulation-platform", |spec| {
            spec.fields().simulation_platform.clone()
        })
    }

    /// Reads source-side specs and generates tests for every builder on every master this
    /// configuration covers.
    ///
    /// Problems with individual test entries don't fail the call. They are returned as
    /// diagnostics to be reported as failing steps.
    pub fn create_build_config(
        self,
        provider: &dyn SourceSpecProvider,
        properties: &BuildProperties,
    ) -> Result<(BuildConfig<'db>, Vec<Diagnostic>), Error> {
        let scripts_compile_targets = if self.disable_tests()? {
            BTreeMap::new()
        } else {
            provider.compile_targets_for_scripts()?
        };

        let masters: BTreeSet<&str> = self.all_keys.iter().map(BuilderId::master).collect();
        let mut source_side_specs = BTreeMap::new();
        for master in masters {
            let specs = self.source_side_specs_for(provider, master)?;
            source_side_specs.insert(master.to_owned(), specs);
        }

        let empty_spec = SourceSideBuilderSpec::default();
        let mut tests = BTreeMap::new();
        let mut diagnostics = Vec::new();
        for (master, specs) in &source_side_specs {
            let master_spec = self
                .bot_db
                .master_spec(master)
                .ok_or_else(|| Error::UnknownMaster(master.clone()))?;
            for (builder, bot_spec) in master_spec.builders() {
                let builder_id = BuilderId::new(master.as_str(), builder.as_str());
                let ctx = GeneratorContext {
                    builder_id: &builder_id,
                    bot_spec,
                    properties,
                    scripts_compile_targets: &scripts_compile_targets,
                };
                let output = generate_tests(ctx, specs.get(builder).unwrap_or(&empty_spec));
                diagnostics.extend(output.diagnostics);
                tests.insert(builder_id, output.tests);
            }
        }

        Ok((
            BuildConfig::new(self, source_side_specs, tests),
            diagnostics,
        ))
    }

    // ---
    // Helper methods
    // ---

    /// Returns the source-side specs of every builder on a master.
    fn source_side_specs_for(
        &self,
        provider: &dyn SourceSpecProvider,
        master: &str,
    ) -> Result<BTreeMap<String, SourceSideBuilderSpec>, Error> {
        if let [builder_id] = self.builder_ids.as_slice() {
            let fields = self.bot_spec(builder_id)?.fields();
            let inline_file = format!("<inline spec for {}>", builder_id);
            if let Some(spec) = &fields.source_side_spec {
                let mut specs = BTreeMap::new();
                specs.insert(
                    builder_id.builder().to_owned(),
                    parse_builder_spec(&inline_file, builder_id.builder(), spec.clone())?,
                );
                return Ok(specs);
            }
            if let Some(downstream) = &fields.downstream_spec {
                return parse_builder_specs(&inline_file, downstream.clone());
            }
        }

        if self.disable_tests()? {
            return Ok(BTreeMap::new());
        }

        let file = self
            .uniform("source-side-spec-file", |spec| {
                spec.fields().source_side_spec_file.clone()
            })?
            .unwrap_or_else(|| format!("{}.json", master));
        debug!("reading source-side spec '{}' for master '{}'", file, master);
        let raw = provider.read_source_side_spec(&file)?;
        parse_builder_specs(&file, raw)
    }
}

fn check_known(bot_db: &BotDatabase, builder_id: &BuilderId) -> Result<(), Error> {
    if bot_db.master_spec(builder_id.master()).is_none() {
        return Err(Error::UnknownMaster(builder_id.master().to_owned()));
    }
    if !bot_db.contains(builder_id) {
        return Err(Error::UnknownBuilder(builder_id.clone()));
    }
    Ok(())
}

fn push_unique(ids: &mut Vec<BuilderId>, builder_id: &BuilderId) {
    if !ids.contains(builder_id) {
        ids.push(builder_id.clone());
    }
}
