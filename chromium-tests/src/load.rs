// Copyright (c) The cargo-guppy Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Loading builder and try builder tables from TOML.
//!
//! A configuration is built by [`load_config`] from any number of sources, each owning a disjoint
//! set of masters:
//!
//! ```toml
//! [masters."chromium.linux".settings]
//! luci-project = "chromium"
//!
//! [masters."chromium.linux".builders."Linux Builder"]
//! bot-type = "builder"
//! compile-targets = ["chrome"]
//!
//! [masters."chromium.linux".builders."Linux Builder (goma canary)"]
//! derive-from = { master = "chromium.linux", builder = "Linux Builder" }
//! extend = { chromium-apply-config = ["goma_canary"] }
//!
//! [try-masters."tryserver.chromium.linux".builders."linux-rel"]
//! mirrors = [{ mastername = "chromium.linux", buildername = "Linux Builder" }]
//! ```
//!
//! A builder with `derive-from` starts from the spec of another builder, in any source, with its
//! own keys overriding the other builder's. `extend` appends to sequence fields.

use crate::{
    bot_spec::{BotSpec, BotSpecExtension, BotSpecFields, IntoBotSpec},
    db::{BotDatabase, MasterSettings, MasterSpec},
    errors::{BotSpecError, BotSpecErrorKind},
    try_spec::{TryDatabase, TrySpec},
    BuilderId, Error,
};
use camino::Utf8Path;
use indexmap::IndexMap;
use log::debug;
use serde::Deserialize;
use std::{collections::BTreeMap, fs};

/// A named TOML document to load configuration from.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ConfigSource {
    name: String,
    contents: String,
}

impl ConfigSource {
    /// Creates a source from a name, used in error messages, and TOML contents.
    pub fn new(name: impl Into<String>, contents: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            contents: contents.into(),
        }
    }

    /// Reads a source from a file.
    pub fn from_path(path: impl AsRef<Utf8Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|err| Error::ConfigIo {
            source: path.to_string(),
            err,
        })?;
        Ok(Self::new(path.as_str(), contents))
    }

    /// Returns the name of this source.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the TOML contents of this source.
    pub fn contents(&self) -> &str {
        &self.contents
    }
}

/// The builder and try builder databases loaded from a set of sources.
#[derive(Clone, Debug)]
pub struct LoadedConfig {
    /// Every continuous builder.
    pub bot_db: BotDatabase,
    /// Every try builder.
    pub try_db: TryDatabase,
}

/// Loads configuration from `sources`.
///
/// Returns an error if a source can't be parsed, if a master or try master is defined by more
/// than one source, if a `derive-from` reference can't be resolved, if a spec is invalid, or if
/// builders trigger each other in a cycle.
pub fn load_config(sources: impl IntoIterator<Item = ConfigSource>) -> Result<LoadedConfig, Error> {
    let mut masters: IndexMap<String, (String, RawMaster)> = IndexMap::new();
    let mut try_masters: IndexMap<String, (String, RawTryMaster)> = IndexMap::new();

    for source in sources {
        let raw: RawConfig =
            toml::from_str(&source.contents).map_err(|err| Error::ConfigParse {
                source: source.name.clone(),
                err,
            })?;
        debug!(
            "config '{}': {} master(s), {} try master(s)",
            source.name,
            raw.masters.len(),
            raw.try_masters.len()
        );

        for (master, raw_master) in raw.masters {
            if let Some((other, _)) = masters.get(&master) {
                return Err(Error::config(
                    source.name.as_str(),
                    format!("master '{}' is already defined in '{}'", master, other),
                ));
            }
            masters.insert(master, (source.name.clone(), raw_master));
        }
        for (master, raw_master) in raw.try_masters {
            if let Some((other, _)) = try_masters.get(&master) {
                return Err(Error::config(
                    source.name.as_str(),
                    format!("try master '{}' is already defined in '{}'", master, other),
                ));
            }
            try_masters.insert(master, (source.name.clone(), raw_master));
        }
    }

    let mut resolver = Resolver::default();
    for (master, (source, raw_master)) in &masters {
        for (builder, value) in &raw_master.builders {
            let builder_id = BuilderId::new(master.as_str(), builder.as_str());
            let raw_builder = RawBuilder::parse(source, &builder_id, value.clone())?;
            resolver.pending.insert(builder_id, (source.clone(), raw_builder));
        }
    }
    let mut specs = resolver.resolve()?;

    let mut master_specs = Vec::with_capacity(masters.len());
    for (master, (_, raw_master)) in masters {
        let builders: Vec<(String, BotSpec)> = raw_master
            .builders
            .keys()
            .filter_map(|builder| {
                let builder_id = BuilderId::new(master.as_str(), builder.as_str());
                specs
                    .remove(&builder_id)
                    .map(|spec| (builder.clone(), spec))
            })
            .collect();
        let master_spec = MasterSpec::create(&master, raw_master.settings, builders)?;
        master_specs.push((master, master_spec));
    }
    let bot_db = BotDatabase::create(master_specs)?;

    let try_db = TryDatabase::create(
        try_masters
            .into_iter()
            .map(|(master, (_, raw_master))| (master, raw_master.builders)),
    )?;

    bot_db.bot_graph()?;
    Ok(LoadedConfig { bot_db, try_db })
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
struct RawConfig {
    #[serde(default)]
    masters: IndexMap<String, RawMaster>,
    #[serde(default)]
    try_masters: IndexMap<String, RawTryMaster>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawMaster {
    #[serde(default)]
    settings: MasterSettings,
    #[serde(default)]
    builders: IndexMap<String, toml::Value>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawTryMaster {
    #[serde(default)]
    builders: IndexMap<String, TrySpec>,
}

/// A builder table with `derive-from` and `extend` split out.
struct RawBuilder {
    derive_from: Option<BuilderId>,
    extend: BotSpecExtension,
    overrides: toml::value::Table,
}

impl RawBuilder {
    fn parse(source: &str, builder_id: &BuilderId, value: toml::Value) -> Result<Self, Error> {
        let mut overrides = match value {
            toml::Value::Table(table) => table,
            other => {
                return Err(Error::config(
                    source,
                    format!(
                        "builder {} must be a table, found {}",
                        builder_id,
                        other.type_str()
                    ),
                ))
            }
        };

        let derive_from = overrides
            .remove("derive-from")
            .map(|value| value.try_into::<BuilderId>())
            .transpose()
            .map_err(|err| {
                Error::config(
                    source,
                    format!("invalid derive-from for builder {}: {}", builder_id, err),
                )
            })?;
        let extend = overrides
            .remove("extend")
            .map(|value| value.try_into::<BotSpecExtension>())
            .transpose()
            .map_err(|err| {
                Error::config(
                    source,
                    format!("invalid extend for builder {}: {}", builder_id, err),
                )
            })?
            .unwrap_or_default();

        Ok(Self {
            derive_from,
            extend,
            overrides,
        })
    }

    /// Builds the spec, given the spec it derives from if any.
    fn build(self, base: Option<&BotSpec>) -> Result<BotSpec, BotSpecError> {
        let spec = match base {
            None => toml::Value::Table(self.overrides).into_bot_spec()?,
            Some(base) => {
                let fields = overlay(base.fields(), self.overrides)?;
                base.evolve(|base_fields| *base_fields = fields)?
            }
        };
        if self.extend.is_empty() {
            Ok(spec)
        } else {
            spec.extend(self.extend)
        }
    }
}

/// Applies the keys of a TOML table on top of existing fields.
fn overlay(
    base: &BotSpecFields,
    overrides: toml::value::Table,
) -> Result<BotSpecFields, BotSpecError> {
    let deserialize_err = |err: serde_json::Error| {
        BotSpecError::new(BotSpecErrorKind::Deserialize(err.to_string()))
    };

    let mut merged = match serde_json::to_value(base).map_err(deserialize_err)? {
        serde_json::Value::Object(map) => map,
        _ => serde_json::Map::new(),
    };
    for (key, value) in overrides {
        merged.insert(key, serde_json::to_value(value).map_err(deserialize_err)?);
    }
    serde_json::from_value(serde_json::Value::Object(merged)).map_err(deserialize_err)
}

#[derive(Default)]
struct Resolver {
    pending: BTreeMap<BuilderId, (String, RawBuilder)>,
    resolved: BTreeMap<BuilderId, BotSpec>,
}

impl Resolver {
    /// Builds every pending spec once the spec it derives from is built.
    fn resolve(mut self) -> Result<BTreeMap<BuilderId, BotSpec>, Error> {
        while !self.pending.is_empty() {
            let ready: Vec<BuilderId> = self
                .pending
                .iter()
                .filter(|(_, (_, raw))| match &raw.derive_from {
                    Some(base_id) => self.resolved.contains_key(base_id),
                    None => true,
                })
                .map(|(builder_id, _)| builder_id.clone())
                .collect();

            if ready.is_empty() {
                return Err(self.stuck_error());
            }

            for builder_id in ready {
                let (_, raw) = match self.pending.remove(&builder_id) {
                    Some(entry) => entry,
                    None => continue,
                };
                let base = raw
                    .derive_from
                    .as_ref()
                    .and_then(|base_id| self.resolved.get(base_id));
                let spec = raw
                    .build(base)
                    .map_err(|err| Error::bot_spec(builder_id.clone(), err))?;
                self.resolved.insert(builder_id, spec);
            }
        }
        Ok(self.resolved)
    }

    fn stuck_error(&self) -> Error {
        // Anything still pending derives from a builder that is either unknown or pending too.
        for (builder_id, (source, raw)) in &self.pending {
            if let Some(base_id) = &raw.derive_from {
                if !self.pending.contains_key(base_id) {
                    return Error::config(
                        source.as_str(),
                        format!(
                            "builder {} derives from unknown builder {}",
                            builder_id, base_id
                        ),
                    );
                }
            }
        }

        let members: Vec<String> = self.pending.keys().map(ToString::to_string).collect();
        let source = self
            .pending
            .values()
            .next()
            .map_or("<config>", |(source, _)| source.as_str());
        Error::config(
            source,
            format!("derive-from references form a cycle among: {}", members.join(", ")),
        )
    }
}
