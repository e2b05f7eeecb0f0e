// Copyright (c) The cargo-guppy Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use serde::{Deserialize, Serialize};
use std::{error, fmt, str::FromStr};

/// The universal key for a builder: the master (waterfall) it belongs to, and its name.
///
/// Builder IDs order by master first, then by builder name.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Deserialize, Serialize)]
#[cfg_attr(feature = "proptest1", derive(proptest_derive::Arbitrary))]
pub struct BuilderId {
    master: String,
    builder: String,
}

impl BuilderId {
    /// Creates a new `BuilderId`.
    pub fn new(master: impl Into<String>, builder: impl Into<String>) -> Self {
        Self {
            master: master.into(),
            builder: builder.into(),
        }
    }

    /// Returns the name of the master this builder belongs to.
    pub fn master(&self) -> &str {
        &self.master
    }

    /// Returns the name of the builder.
    pub fn builder(&self) -> &str {
        &self.builder
    }

    /// Returns a builder ID on the same master.
    pub fn sibling(&self, builder: impl Into<String>) -> Self {
        Self::new(self.master.clone(), builder)
    }
}

impl fmt::Display for BuilderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.master, self.builder)
    }
}

impl FromStr for BuilderId {
    type Err = ParseBuilderIdError;

    /// Parses a `master:builder` string. Builder names may contain `:`, masters may not.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once(':') {
            Some((master, builder)) if !master.is_empty() && !builder.is_empty() => {
                Ok(Self::new(master, builder))
            }
            _ => Err(ParseBuilderIdError {
                input: s.to_owned(),
            }),
        }
    }
}

/// An error returned while parsing a [`BuilderId`] from a string.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ParseBuilderIdError {
    input: String,
}

impl fmt::Display for ParseBuilderIdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "invalid builder ID '{}' (expected 'master:builder')",
            self.input
        )
    }
}

impl error::Error for ParseBuilderIdError {}
