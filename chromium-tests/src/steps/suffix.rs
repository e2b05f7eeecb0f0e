// Copyright (c) The cargo-guppy Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use serde::{Deserialize, Serialize};
use std::fmt;

/// Distinguishes the runs of a test within a single build.
#[derive(Copy, Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Suffix {
    /// A continuous build, with no patch involved.
    Plain,
    /// A try build with the pending change applied.
    WithPatch,
    /// A try build's baseline rerun without the pending change.
    WithoutPatch,
}

impl Suffix {
    /// All suffixes, in the order a try build runs them.
    pub const ALL: [Suffix; 3] = [Suffix::Plain, Suffix::WithPatch, Suffix::WithoutPatch];

    /// Returns the suffix as it appears in step names. `Plain` is the empty string.
    pub fn as_str(self) -> &'static str {
        match self {
            Suffix::Plain => "",
            Suffix::WithPatch => "with patch",
            Suffix::WithoutPatch => "without patch",
        }
    }

    /// Returns true if the pending change is applied for this suffix.
    pub fn is_patched(self) -> bool {
        matches!(self, Suffix::WithPatch)
    }

    fn index(self) -> usize {
        match self {
            Suffix::Plain => 0,
            Suffix::WithPatch => 1,
            Suffix::WithoutPatch => 2,
        }
    }
}

impl fmt::Display for Suffix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A fixed-size map with one optional slot per [`Suffix`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SuffixMap<T> {
    slots: [Option<T>; 3],
}

impl<T> SuffixMap<T> {
    /// Creates an empty map.
    pub fn new() -> Self {
        Self {
            slots: [None, None, None],
        }
    }

    /// Returns the value for a suffix.
    pub fn get(&self, suffix: Suffix) -> Option<&T> {
        self.slots[suffix.index()].as_ref()
    }

    /// Returns true if a value is present for the suffix.
    pub fn contains(&self, suffix: Suffix) -> bool {
        self.slots[suffix.index()].is_some()
    }

    /// Stores a value for a suffix if none is present.
    ///
    /// Returns the value back if the slot was already filled.
    pub fn insert_new(&mut self, suffix: Suffix, value: T) -> Result<&T, T> {
        let slot = &mut self.slots[suffix.index()];
        if slot.is_some() {
            return Err(value);
        }
        Ok(slot.get_or_insert(value))
    }

    /// Stores a value for a suffix, returning the value it replaces.
    pub fn insert(&mut self, suffix: Suffix, value: T) -> Option<T> {
        self.slots[suffix.index()].replace(value)
    }

    /// Iterates over the suffixes with values.
    pub fn iter(&self) -> impl Iterator<Item = (Suffix, &T)> + '_ {
        Suffix::ALL
            .iter()
            .filter_map(move |&suffix| self.get(suffix).map(|value| (suffix, value)))
    }
}

impl<T> Default for SuffixMap<T> {
    fn default() -> Self {
        Self::new()
    }
}
