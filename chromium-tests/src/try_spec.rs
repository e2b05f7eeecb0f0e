// Copyright (c) The cargo-guppy Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Try (CQ) builders and the continuous builders they mirror.

use crate::{BuilderId, Error};
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, fmt};

/// A continuous builder, and optionally its tester, that a try builder emulates.
///
/// The tester is never the same as the builder.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Deserialize, Serialize)]
#[serde(from = "TryMirrorFields", into = "TryMirrorFields")]
pub struct TryMirror {
    builder_id: BuilderId,
    tester_id: Option<BuilderId>,
}

impl TryMirror {
    /// Creates a new `TryMirror`, returning an error if `tester_id` is the same as `builder_id`.
    pub fn new(builder_id: BuilderId, tester_id: Option<BuilderId>) -> Result<Self, Error> {
        if tester_id.as_ref() == Some(&builder_id) {
            return Err(Error::InvalidMirror(builder_id));
        }
        Ok(Self {
            builder_id,
            tester_id,
        })
    }

    /// Creates a `TryMirror` from names.
    ///
    /// The tester's master defaults to the builder's master. A tester naming the builder itself
    /// is dropped.
    pub fn create(
        mastername: &str,
        buildername: &str,
        tester: Option<&str>,
        tester_mastername: Option<&str>,
    ) -> Self {
        let builder_id = BuilderId::new(mastername, buildername);
        let tester_id = tester
            .map(|tester| BuilderId::new(tester_mastername.unwrap_or(mastername), tester))
            .filter(|tester_id| tester_id != &builder_id);
        Self {
            builder_id,
            tester_id,
        }
    }

    /// Converts any mirror-like value into a `TryMirror`.
    pub fn normalize(mirror: impl Into<TryMirror>) -> Self {
        mirror.into()
    }

    /// Returns the mirrored builder.
    pub fn builder_id(&self) -> &BuilderId {
        &self.builder_id
    }

    /// Returns the mirrored tester, if any.
    pub fn tester_id(&self) -> Option<&BuilderId> {
        self.tester_id.as_ref()
    }
}

impl From<BuilderId> for TryMirror {
    fn from(builder_id: BuilderId) -> Self {
        Self {
            builder_id,
            tester_id: None,
        }
    }
}

impl From<TryMirrorFields> for TryMirror {
    fn from(fields: TryMirrorFields) -> Self {
        Self::create(
            &fields.mastername,
            &fields.buildername,
            fields.tester.as_deref(),
            fields.tester_mastername.as_deref(),
        )
    }
}

impl fmt::Display for TryMirror {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.tester_id {
            Some(tester_id) => write!(f, "{} (tester {})", self.builder_id, tester_id),
            None => write!(f, "{}", self.builder_id),
        }
    }
}

/// The dictionary form of a [`TryMirror`], as written in configuration.
#[derive(Clone, Debug, Eq, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct TryMirrorFields {
    /// The master of the mirrored builder.
    pub mastername: String,
    /// The mirrored builder.
    pub buildername: String,
    /// The mirrored tester.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tester: Option<String>,
    /// The master of the mirrored tester, if different from the builder's.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tester_mastername: Option<String>,
}

impl From<TryMirror> for TryMirrorFields {
    fn from(mirror: TryMirror) -> Self {
        let tester_mastername = mirror
            .tester_id
            .as_ref()
            .filter(|tester_id| tester_id.master() != mirror.builder_id.master())
            .map(|tester_id| tester_id.master().to_owned());
        Self {
            mastername: mirror.builder_id.master().to_owned(),
            buildername: mirror.builder_id.builder().to_owned(),
            tester: mirror
                .tester_id
                .as_ref()
                .map(|tester_id| tester_id.builder().to_owned()),
            tester_mastername,
        }
    }
}

/// What a try builder does with the mirrored configurations.
#[derive(Copy, Clone, Debug, Eq, Hash, PartialEq, Deserialize, Serialize)]
#[cfg_attr(feature = "proptest1", derive(proptest_derive::Arbitrary))]
#[serde(rename_all = "kebab-case")]
pub enum ExecutionMode {
    /// Compile, then run tests.
    CompileTest,
    /// Only compile.
    Compile,
}

impl Default for ExecutionMode {
    fn default() -> Self {
        ExecutionMode::CompileTest
    }
}

/// The configuration of a try builder.
#[derive(Clone, Debug, Eq, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct TrySpec {
    /// The configurations this try builder emulates.
    pub mirrors: Vec<TryMirror>,
    /// Whether tests are run.
    #[serde(default)]
    pub execution_mode: ExecutionMode,
    /// Extra names passed to analyze.
    #[serde(default)]
    pub analyze_names: Vec<String>,
    /// Whether failed shards are retried with the patch applied.
    #[serde(default = "default_retry_failed_shards")]
    pub retry_failed_shards: bool,
}

fn default_retry_failed_shards() -> bool {
    true
}

impl TrySpec {
    /// Creates a new `TrySpec`, normalizing each mirror.
    pub fn create(
        mirrors: impl IntoIterator<Item = impl Into<TryMirror>>,
        execution_mode: ExecutionMode,
        analyze_names: impl IntoIterator<Item = impl Into<String>>,
        retry_failed_shards: bool,
    ) -> Self {
        Self {
            mirrors: mirrors.into_iter().map(TryMirror::normalize).collect(),
            execution_mode,
            analyze_names: analyze_names.into_iter().map(Into::into).collect(),
            retry_failed_shards,
        }
    }

    /// Creates a `TrySpec` that mirrors a single builder, and optionally its tester, with
    /// defaults for everything else.
    pub fn create_for_single_mirror(builder_id: BuilderId, tester_id: Option<BuilderId>) -> Self {
        let mirror = TryMirror::create(
            builder_id.master(),
            builder_id.builder(),
            tester_id.as_ref().map(|id| id.builder()),
            tester_id.as_ref().map(|id| id.master()),
        );
        Self::create(
            vec![mirror],
            ExecutionMode::default(),
            Vec::<String>::new(),
            true,
        )
    }
}

/// Try specs indexed by the try builder's ID.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct TryDatabase {
    db: BTreeMap<BuilderId, TrySpec>,
}

impl TryDatabase {
    /// Creates a database from a nested `{master: {builder: spec}}` mapping.
    ///
    /// Returns an error if a try builder is specified more than once.
    pub fn create<M, B>(masters: M) -> Result<Self, Error>
    where
        M: IntoIterator<Item = (String, B)>,
        B: IntoIterator<Item = (String, TrySpec)>,
    {
        let mut db = BTreeMap::new();
        for (master, builders) in masters {
            for (builder, spec) in builders {
                let builder_id = BuilderId::new(master.clone(), builder);
                if db.contains_key(&builder_id) {
                    return Err(Error::config(
                        "<try database>",
                        format!("try builder {} specified more than once", builder_id),
                    ));
                }
                db.insert(builder_id, spec);
            }
        }
        Ok(Self { db })
    }

    /// Returns the spec for a try builder, or `None` if it isn't a known try builder.
    pub fn get(&self, builder_id: &BuilderId) -> Option<&TrySpec> {
        self.db.get(builder_id)
    }

    /// Returns true if this is a known try builder.
    pub fn contains(&self, builder_id: &BuilderId) -> bool {
        self.db.contains_key(builder_id)
    }

    /// Iterates over try builders and their specs, ordered by ID.
    pub fn iter(&self) -> impl ExactSizeIterator<Item = (&BuilderId, &TrySpec)> {
        self.db.iter()
    }

    /// Returns the number of try builders.
    pub fn len(&self) -> usize {
        self.db.len()
    }

    /// Returns true if there are no try builders.
    pub fn is_empty(&self) -> bool {
        self.db.is_empty()
    }
}
