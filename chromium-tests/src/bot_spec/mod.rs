// Copyright (c) The cargo-guppy Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Immutable, validated builder specifications.
//!
//! A [`BotSpec`] is created once from a [`BotSpecFields`] and never mutated afterwards. New specs
//! are derived from existing ones with [`BotSpec::evolve`] and [`BotSpec::extend`].

mod fields;
mod validate;

pub use fields::*;

use crate::{
    errors::{BotSpecError, BotSpecErrorKind},
    BuilderId,
};
use once_cell::sync::OnceCell;
use serde::{de::Error as _, Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use std::fmt;

/// The role a builder plays.
#[derive(Copy, Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Deserialize, Serialize)]
#[cfg_attr(feature = "proptest1", derive(proptest_derive::Arbitrary))]
#[serde(rename_all = "snake_case")]
pub enum BotType {
    /// Compiles, and triggers testers to run tests.
    Builder,
    /// Runs tests against artifacts produced by a parent builder.
    Tester,
    /// Compiles and runs tests.
    BuilderTester,
    /// Never executed. Only used as a try mirror's tester so that source-side information can be
    /// specified for it.
    DummyTester,
}

impl BotType {
    /// Returns true if builders of this type compile.
    pub fn is_compile(self) -> bool {
        matches!(self, BotType::Builder | BotType::BuilderTester)
    }

    /// Returns true if builders of this type run tests.
    pub fn is_test(self) -> bool {
        matches!(self, BotType::Tester | BotType::BuilderTester)
    }

    /// Returns the string this type is spelled as in configuration.
    pub fn as_str(self) -> &'static str {
        match self {
            BotType::Builder => "builder",
            BotType::Tester => "tester",
            BotType::BuilderTester => "builder_tester",
            BotType::DummyTester => "dummy_tester",
        }
    }
}

impl fmt::Display for BotType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An immutable, validated specification for a builder.
///
/// Field values are read through [`fields`](Self::fields). `BotSpec` also offers mapping-style
/// access to its non-null fields, keyed by their configuration names, through
/// [`get`](Self::get), [`iter`](Self::iter) and [`len`](Self::len).
#[derive(Clone)]
pub struct BotSpec {
    fields: BotSpecFields,
    mapping: OnceCell<Map<String, Value>>,
}

impl BotSpec {
    /// Validates `fields` and creates a spec from them.
    ///
    /// Returns an error if fields were provided that are meaningless for the spec (for example
    /// `gs-bucket` without `archive-build`), or if a cross-field invariant is violated (for
    /// example a tester without a parent).
    pub fn create(fields: BotSpecFields) -> Result<Self, BotSpecError> {
        validate::check_provided(&fields)?;
        validate::check_invariants(&fields)?;
        Ok(Self::new_unchecked(fields))
    }

    /// Converts `spec` into a `BotSpec`, returning it unchanged if it already is one.
    pub fn normalize(spec: impl IntoBotSpec) -> Result<Self, BotSpecError> {
        spec.into_bot_spec()
    }

    /// Returns a new spec with fields overridden by `f`, and all other fields kept the same.
    ///
    /// Only the invariants are checked again, not the provided-field checks of
    /// [`create`](Self::create).
    pub fn evolve(&self, f: impl FnOnce(&mut BotSpecFields)) -> Result<Self, BotSpecError> {
        let mut fields = self.fields.clone();
        f(&mut fields);
        validate::check_invariants(&fields)?;
        Ok(Self::new_unchecked(fields))
    }

    /// Returns a new spec with the values in `extension` appended to the corresponding sequence
    /// fields.
    pub fn extend(&self, extension: BotSpecExtension) -> Result<Self, BotSpecError> {
        self.evolve(|fields| extension.apply_to(fields))
    }

    /// Returns the fields of this spec.
    pub fn fields(&self) -> &BotSpecFields {
        &self.fields
    }

    /// Returns the type of this builder.
    pub fn bot_type(&self) -> BotType {
        self.fields.bot_type
    }

    /// Returns the ID of this builder's parent, given the ID of the builder itself.
    ///
    /// The parent is on the same master unless `parent-mastername` is set.
    pub fn parent_id(&self, builder_id: &BuilderId) -> Option<BuilderId> {
        let parent_builder = self.fields.parent_buildername.as_ref()?;
        let parent_master = self
            .fields
            .parent_mastername
            .as_deref()
            .unwrap_or_else(|| builder_id.master());
        Some(BuilderId::new(parent_master, parent_builder.clone()))
    }

    /// Returns the value of a non-null field by its configuration name.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.mapping().get(key)
    }

    /// Iterates over non-null fields and their values.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> + '_ {
        self.mapping().iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Returns the number of non-null fields.
    pub fn len(&self) -> usize {
        self.mapping().len()
    }

    /// Returns true if there are no non-null fields. This is never the case in practice since
    /// several fields have non-null defaults.
    pub fn is_empty(&self) -> bool {
        self.mapping().is_empty()
    }

    /// Returns the names of the fields that differ from their defaults.
    pub fn non_default_fields(&self) -> Vec<String> {
        validate::non_default_fields(&self.fields)
    }

    // ---
    // Helper methods
    // ---

    fn new_unchecked(fields: BotSpecFields) -> Self {
        Self {
            fields,
            mapping: OnceCell::new(),
        }
    }

    fn mapping(&self) -> &Map<String, Value> {
        self.mapping
            .get_or_init(|| validate::to_mapping(&self.fields))
    }
}

impl Default for BotSpec {
    fn default() -> Self {
        Self::new_unchecked(BotSpecFields::default())
    }
}

impl PartialEq for BotSpec {
    fn eq(&self, other: &Self) -> bool {
        self.fields == other.fields
    }
}

impl Eq for BotSpec {}

impl fmt::Debug for BotSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BotSpec")
            .field("fields", &self.fields)
            .finish()
    }
}

impl Serialize for BotSpec {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.fields.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for BotSpec {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let fields = BotSpecFields::deserialize(deserializer)?;
        BotSpec::create(fields).map_err(D::Error::custom)
    }
}

/// Conversion into a validated [`BotSpec`].
///
/// Implemented for `BotSpec` itself (returned unchanged), for [`BotSpecFields`] (validated through
/// [`BotSpec::create`]) and for dictionary-shaped JSON and TOML values.
pub trait IntoBotSpec {
    /// Performs the conversion.
    fn into_bot_spec(self) -> Result<BotSpec, BotSpecError>;
}

impl IntoBotSpec for BotSpec {
    fn into_bot_spec(self) -> Result<BotSpec, BotSpecError> {
        Ok(self)
    }
}

impl IntoBotSpec for BotSpecFields {
    fn into_bot_spec(self) -> Result<BotSpec, BotSpecError> {
        BotSpec::create(self)
    }
}

impl IntoBotSpec for Value {
    fn into_bot_spec(self) -> Result<BotSpec, BotSpecError> {
        let provided: Vec<String> = match &self {
            Value::Object(map) => map
                .iter()
                .filter(|(_, value)| !value.is_null())
                .map(|(key, _)| key.clone())
                .collect(),
            _ => Vec::new(),
        };
        let fields: BotSpecFields = serde_json::from_value(self).map_err(|err| {
            BotSpecError::new(BotSpecErrorKind::Deserialize(err.to_string()))
        })?;
        create_from_keys(fields, provided)
    }
}

impl IntoBotSpec for toml::Value {
    fn into_bot_spec(self) -> Result<BotSpec, BotSpecError> {
        let provided: Vec<String> = match &self {
            toml::Value::Table(table) => table.keys().cloned().collect(),
            _ => Vec::new(),
        };
        let fields: BotSpecFields = self.try_into().map_err(|err: toml::de::Error| {
            BotSpecError::new(BotSpecErrorKind::Deserialize(err.to_string()))
        })?;
        create_from_keys(fields, provided)
    }
}

/// Creates a spec from a dictionary, where `provided` are the keys that were written out.
fn create_from_keys(fields: BotSpecFields, provided: Vec<String>) -> Result<BotSpec, BotSpecError> {
    if fields.bot_type == BotType::DummyTester {
        validate::check_dummy_tester_keys(provided)?;
    }
    BotSpec::create(fields)
}
