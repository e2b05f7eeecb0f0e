// Copyright (c) The cargo-guppy Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The database of builder specs, and the trigger graph derived from it.

mod graph;

pub use graph::*;

use crate::{
    bot_spec::{BotSpec, IntoBotSpec},
    errors::BotSpecErrorKind,
    BuilderId, Error,
};
use indexmap::IndexMap;
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Settings that apply to every builder on a master.
#[derive(Clone, Debug, Eq, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields, rename_all = "kebab-case")]
pub struct MasterSettings {
    /// The LUCI project the master's builders belong to.
    pub luci_project: String,
}

impl Default for MasterSettings {
    fn default() -> Self {
        Self {
            luci_project: "chromium".to_owned(),
        }
    }
}

/// The specs for every builder on one master (waterfall).
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize)]
pub struct MasterSpec {
    settings: MasterSettings,
    builders: IndexMap<String, BotSpec>,
}

impl MasterSpec {
    /// Creates a new `MasterSpec`, normalizing every builder's spec.
    ///
    /// Errors are annotated with the ID of the builder whose spec failed validation.
    pub fn create<K, S>(
        master: &str,
        settings: MasterSettings,
        builders: impl IntoIterator<Item = (K, S)>,
    ) -> Result<Self, Error>
    where
        K: Into<String>,
        S: IntoBotSpec,
    {
        let builders = builders
            .into_iter()
            .map(|(name, spec)| {
                let name = name.into();
                match BotSpec::normalize(spec) {
                    Ok(spec) => Ok((name, spec)),
                    Err(err) => Err(Error::bot_spec(BuilderId::new(master, name), err)),
                }
            })
            .collect::<Result<_, _>>()?;
        Ok(Self { settings, builders })
    }

    /// Normalizes a dictionary of the form `{settings?: {...}, builders: {name: spec}}`.
    pub fn from_value(master: &str, value: serde_json::Value) -> Result<Self, Error> {
        #[derive(Deserialize)]
        #[serde(deny_unknown_fields)]
        struct RawMasterSpec {
            #[serde(default)]
            settings: MasterSettings,
            #[serde(default)]
            builders: IndexMap<String, serde_json::Value>,
        }

        let raw: RawMasterSpec = serde_json::from_value(value).map_err(|err| {
            Error::bot_spec(
                None,
                crate::errors::BotSpecError::new(BotSpecErrorKind::Deserialize(format!(
                    "master '{}': {}",
                    master, err
                ))),
            )
        })?;
        Self::create(master, raw.settings, raw.builders)
    }

    /// Returns the settings for this master.
    pub fn settings(&self) -> &MasterSettings {
        &self.settings
    }

    /// Returns the builders on this master, in the order they were declared.
    pub fn builders(&self) -> &IndexMap<String, BotSpec> {
        &self.builders
    }
}

/// Builder specs indexed by [`BuilderId`].
///
/// The trigger graph is derived on first use and cached.
#[derive(Clone, Debug, Default)]
pub struct BotDatabase {
    db: BTreeMap<BuilderId, BotSpec>,
    master_specs: BTreeMap<String, MasterSpec>,
    bot_graph: OnceCell<BotGraph>,
}

static_assertions::assert_impl_all!(BotDatabase: Send, Sync);

impl BotDatabase {
    /// Creates a database from master specs, flattening every `(master, builder)` pair into a
    /// single index.
    ///
    /// Returns an error if a master appears more than once.
    pub fn create(
        master_specs: impl IntoIterator<Item = (String, MasterSpec)>,
    ) -> Result<Self, Error> {
        let mut db = BTreeMap::new();
        let mut specs = BTreeMap::new();
        for (master, master_spec) in master_specs {
            for (builder, spec) in &master_spec.builders {
                db.insert(BuilderId::new(master.clone(), builder.clone()), spec.clone());
            }
            if specs.insert(master.clone(), master_spec).is_some() {
                return Err(Error::config(
                    "<database>",
                    format!("master '{}' specified more than once", master),
                ));
            }
        }
        Ok(Self {
            db,
            master_specs: specs,
            bot_graph: OnceCell::new(),
        })
    }

    /// Creates a database from a nested dictionary of the form
    /// `{master: {settings?: {...}, builders: {name: spec}}}`.
    ///
    /// Errors are annotated with the offending master and builder.
    pub fn from_value(value: serde_json::Value) -> Result<Self, Error> {
        let masters: IndexMap<String, serde_json::Value> = serde_json::from_value(value)
            .map_err(|err| {
                Error::config("<database>", format!("expected a map of masters: {}", err))
            })?;
        let master_specs = masters
            .into_iter()
            .map(|(master, value)| {
                let spec = MasterSpec::from_value(&master, value)?;
                Ok((master, spec))
            })
            .collect::<Result<Vec<_>, Error>>()?;
        Self::create(master_specs)
    }

    /// Returns the spec for a builder, or `None` if it isn't known.
    pub fn get(&self, builder_id: &BuilderId) -> Option<&BotSpec> {
        self.db.get(builder_id)
    }

    /// Returns the spec for a builder, or an error if it isn't known.
    pub fn spec(&self, builder_id: &BuilderId) -> Result<&BotSpec, Error> {
        self.db
            .get(builder_id)
            .ok_or_else(|| Error::UnknownBuilder(builder_id.clone()))
    }

    /// Returns true if the database contains this builder.
    pub fn contains(&self, builder_id: &BuilderId) -> bool {
        self.db.contains_key(builder_id)
    }

    /// Iterates over all builders and their specs, ordered by ID.
    pub fn iter(&self) -> impl ExactSizeIterator<Item = (&BuilderId, &BotSpec)> {
        self.db.iter()
    }

    /// Returns the number of builders in the database.
    pub fn len(&self) -> usize {
        self.db.len()
    }

    /// Returns true if the database has no builders.
    pub fn is_empty(&self) -> bool {
        self.db.is_empty()
    }

    /// Returns the spec for a master, or `None` if it isn't known.
    pub fn master_spec(&self, master: &str) -> Option<&MasterSpec> {
        self.master_specs.get(master)
    }

    /// Iterates over all masters and their specs, ordered by name.
    pub fn master_specs(&self) -> impl ExactSizeIterator<Item = (&str, &MasterSpec)> {
        self.master_specs.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Returns the trigger graph for this database, computing it if necessary.
    ///
    /// Returns an error if the graph contains a cycle.
    pub fn bot_graph(&self) -> Result<&BotGraph, Error> {
        self.bot_graph.get_or_try_init(|| BotGraph::create(self))
    }

    /// Verifies internal invariants of this database.
    ///
    /// This is a sanity check; any error here is a bug in this crate.
    pub fn verify(&self) -> Result<(), Error> {
        let flattened: usize = self
            .master_specs
            .values()
            .map(|spec| spec.builders.len())
            .sum();
        if flattened != self.db.len() {
            return Err(Error::config(
                "<database>",
                format!(
                    "{} builders in master specs but {} in the index",
                    flattened,
                    self.db.len()
                ),
            ));
        }

        let graph = self.bot_graph()?;
        for builder_id in self.db.keys() {
            if !graph.contains(builder_id) {
                return Err(Error::config(
                    "<database>",
                    format!("builder {} missing from the bot graph", builder_id),
                ));
            }
        }
        Ok(())
    }
}
