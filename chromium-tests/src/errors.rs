// Copyright (c) The cargo-guppy Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Errors returned by this crate.
//!
//! Configuration problems (invalid specs, inconsistent mirrors, unknown builders) are returned as
//! [`Error`]. Problems with test *results* are not errors: they are reported through
//! [`StepApi::failing_step`](crate::api::StepApi::failing_step) and recorded as invalid results.

use crate::{bot_spec::BotType, BuilderId};
use std::{error, fmt, io};

use Error::*;

/// The error type for this crate.
#[derive(Debug)]
#[non_exhaustive]
pub enum Error {
    /// A builder spec failed validation.
    BotSpec {
        /// The builder the spec belongs to, if known.
        builder_id: Option<BuilderId>,
        /// The validation error.
        err: BotSpecError,
    },
    /// A master was referenced that has no configuration.
    UnknownMaster(String),
    /// A builder was referenced that has no configuration.
    UnknownBuilder(BuilderId),
    /// A bot config was requested for zero mirrors.
    NoMirrors,
    /// A try mirror's tester is the same as its builder.
    InvalidMirror(BuilderId),
    /// Mirrored builders disagree on a value.
    Consistency(ConsistencyError),
    /// The trigger graph contains a cycle through these builders.
    TriggerCycle(Vec<BuilderId>),
    /// A configuration source could not be read.
    ConfigIo {
        /// The name of the source.
        source: String,
        /// The underlying error.
        err: io::Error,
    },
    /// A configuration source could not be parsed.
    ConfigParse {
        /// The name of the source.
        source: String,
        /// The underlying error.
        err: toml::de::Error,
    },
    /// A configuration source was parsed but is semantically invalid.
    Config {
        /// The name of the source.
        source: String,
        /// A description of the problem.
        msg: String,
    },
    /// A source-side spec file could not be read.
    SourceSideSpecIo {
        /// The file that was requested.
        file: String,
        /// The underlying error.
        err: io::Error,
    },
    /// A source-side spec, or one builder's entry in it, could not be parsed.
    SourceSideSpecParse {
        /// The file the spec came from.
        file: String,
        /// The builder whose entry was being parsed, if any.
        builder: Option<String>,
        /// The underlying error.
        err: serde_json::Error,
    },
    /// A test was driven out of order for a suffix.
    TestState {
        /// The step name of the test.
        step_name: String,
        /// The protocol violation.
        err: TestStateError,
    },
}

impl Error {
    pub(crate) fn bot_spec(builder_id: impl Into<Option<BuilderId>>, err: BotSpecError) -> Self {
        BotSpec {
            builder_id: builder_id.into(),
            err,
        }
    }

    pub(crate) fn config(source: impl Into<String>, msg: impl Into<String>) -> Self {
        Config {
            source: source.into(),
            msg: msg.into(),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BotSpec {
                builder_id: Some(builder_id),
                ..
            } => write!(f, "invalid spec for builder {}", builder_id),
            BotSpec {
                builder_id: None, ..
            } => write!(f, "invalid builder spec"),
            UnknownMaster(master) => {
                write!(f, "No configuration present for master '{}'", master)
            }
            UnknownBuilder(builder_id) => {
                write!(f, "No configuration present for builder {}", builder_id)
            }
            NoMirrors => write!(f, "at least one mirror must be specified"),
            InvalidMirror(builder_id) => write!(
                f,
                "try mirror for {} names the same builder as its tester",
                builder_id
            ),
            Consistency(err) => write!(f, "{}", err),
            TriggerCycle(members) => {
                write!(f, "builders trigger each other in a cycle: ")?;
                for (idx, member) in members.iter().enumerate() {
                    if idx > 0 {
                        write!(f, " -> ")?;
                    }
                    write!(f, "{}", member)?;
                }
                Ok(())
            }
            ConfigIo { source, .. } => write!(f, "error reading config '{}'", source),
            ConfigParse { source, .. } => write!(f, "error parsing config '{}'", source),
            Config { source, msg } => write!(f, "invalid config '{}': {}", source, msg),
            SourceSideSpecIo { file, .. } => {
                write!(f, "error reading source-side spec '{}'", file)
            }
            SourceSideSpecParse {
                file,
                builder: Some(builder),
                ..
            } => write!(
                f,
                "error parsing source-side spec for '{}' in '{}'",
                builder, file
            ),
            SourceSideSpecParse {
                file,
                builder: None,
                ..
            } => write!(f, "error parsing source-side spec '{}'", file),
            TestState { step_name, err } => write!(f, "{}: {}", step_name, err),
        }
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            BotSpec { err, .. } => Some(err),
            UnknownMaster(_) | UnknownBuilder(_) | NoMirrors | InvalidMirror(_) => None,
            Consistency(err) => Some(err),
            TriggerCycle(_) => None,
            ConfigIo { err, .. } => Some(err),
            ConfigParse { err, .. } => Some(err),
            Config { .. } => None,
            SourceSideSpecIo { err, .. } => Some(err),
            SourceSideSpecParse { err, .. } => Some(err),
            TestState { err, .. } => Some(err),
        }
    }
}

/// A validation error for a single builder spec.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct BotSpecError {
    kind: BotSpecErrorKind,
}

impl BotSpecError {
    pub(crate) fn new(kind: BotSpecErrorKind) -> Self {
        Self { kind }
    }

    /// Returns the kind of error that occurred.
    pub fn kind(&self) -> &BotSpecErrorKind {
        &self.kind
    }
}

impl fmt::Display for BotSpecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)
    }
}

impl error::Error for BotSpecError {}

/// The kind of validation error that occurred for a builder spec.
///
/// Field names are reported as they are spelled in configuration files.
#[derive(Clone, Debug, Eq, PartialEq)]
#[non_exhaustive]
pub enum BotSpecErrorKind {
    /// A `dummy_tester` spec sets fields other than its type.
    DummyTesterFields(Vec<String>),

    /// A spec that does not compile lists compile targets.
    CompileTargetsNotAllowed(BotType),

    /// Fields in a group were set without enabling the group.
    ForbiddenWithout {
        /// The field that enables the group.
        enabling_field: &'static str,
        /// The fields that were set.
        fields: Vec<&'static str>,
    },

    /// A field required by another field is missing.
    MissingRequired {
        /// The missing field.
        field: &'static str,
        /// The field or condition that requires it.
        because: &'static str,
    },

    /// A field had a value of the wrong type, an unknown enum value, or was not recognized.
    Deserialize(String),
}

impl fmt::Display for BotSpecErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BotSpecErrorKind::DummyTesterFields(fields) => write!(
                f,
                "dummy_tester specs may not set: {}",
                fields.join(", ")
            ),
            BotSpecErrorKind::CompileTargetsNotAllowed(bot_type) => write!(
                f,
                "compile-targets may not be set for bot-type '{}'",
                bot_type
            ),
            BotSpecErrorKind::ForbiddenWithout {
                enabling_field,
                fields,
            } => write!(
                f,
                "{} may only be set when {} is set",
                fields.join(", "),
                enabling_field
            ),
            BotSpecErrorKind::MissingRequired { field, because } => {
                write!(f, "{} must be set when {}", field, because)
            }
            BotSpecErrorKind::Deserialize(msg) => write!(f, "{}", msg),
        }
    }
}

/// Mirrored builders disagree on the value of a field.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ConsistencyError {
    field: &'static str,
    values: Vec<(BuilderId, String)>,
}

impl ConsistencyError {
    pub(crate) fn new(field: &'static str, values: Vec<(BuilderId, String)>) -> Self {
        Self { field, values }
    }

    /// Returns the field that was accessed.
    pub fn field(&self) -> &'static str {
        self.field
    }

    /// Returns the value each builder has for the field, rendered for display.
    pub fn values(&self) -> &[(BuilderId, String)] {
        &self.values
    }
}

impl fmt::Display for ConsistencyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Inconsistent value for '{}':", self.field)?;
        for (builder_id, value) in &self.values {
            write!(f, "\n  {}: {}", builder_id, value)?;
        }
        Ok(())
    }
}

impl error::Error for ConsistencyError {}

/// A per-suffix protocol violation for a test.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[non_exhaustive]
pub enum TestStateError {
    /// The suffix was already triggered.
    AlreadyTriggered,
    /// Results for the suffix were already collected.
    AlreadyCollected,
}

impl fmt::Display for TestStateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TestStateError::AlreadyTriggered => write!(f, "test was already triggered"),
            TestStateError::AlreadyCollected => write!(f, "results were already collected"),
        }
    }
}

impl error::Error for TestStateError {}
