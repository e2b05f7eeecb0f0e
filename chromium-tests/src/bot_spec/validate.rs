// Copyright (c) The cargo-guppy Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::{
    bot_spec::{BotSpecFields, BotType},
    errors::{BotSpecError, BotSpecErrorKind},
};
use serde_json::{Map, Value};

/// Fields a `dummy_tester` spec may set.
const DUMMY_TESTER_FIELDS: &[&str] = &["bot-type", "luci-project", "source-side-spec-file"];

/// Checks that only apply to specs created from scratch.
///
/// These look at which fields were provided: a spec derived through `evolve` may legitimately
/// carry values that `create` would reject. A typed `BotSpecFields` doesn't record which fields
/// were written out, so a field counts as provided when its value differs from the default.
/// Dictionary inputs are checked by key as well, through [`check_dummy_tester_keys`].
pub(super) fn check_provided(fields: &BotSpecFields) -> Result<(), BotSpecError> {
    if fields.bot_type == BotType::DummyTester {
        check_dummy_tester_keys(non_default_fields(fields))?;
    } else if !fields.bot_type.is_compile() && !fields.compile_targets.is_empty() {
        return Err(BotSpecError::new(
            BotSpecErrorKind::CompileTargetsNotAllowed(fields.bot_type),
        ));
    }

    if !fields.archive_build.unwrap_or(false) {
        forbid(
            "archive-build",
            &[
                ("gs-bucket", fields.gs_bucket.is_some()),
                ("gs-acl", fields.gs_acl.is_some()),
                ("gs-build-name", fields.gs_build_name.is_some()),
            ],
        )?;
    }
    if !fields.cf_archive_build {
        forbid(
            "cf-archive-build",
            &[
                ("cf-gs-bucket", fields.cf_gs_bucket.is_some()),
                ("cf-archive-name", fields.cf_archive_name.is_some()),
                ("cf-gs-acl", fields.cf_gs_acl.is_some()),
                (
                    "cf-archive-subdir-suffix",
                    fields.cf_archive_subdir_suffix.is_some(),
                ),
            ],
        )?;
    }
    if !fields.bisect_archive_build {
        forbid(
            "bisect-archive-build",
            &[
                ("bisect-gs-bucket", fields.bisect_gs_bucket.is_some()),
                ("bisect-gs-extra", fields.bisect_gs_extra.is_some()),
            ],
        )?;
    }

    Ok(())
}

/// Rejects any key a `dummy_tester` spec may not set, whatever its value.
pub(super) fn check_dummy_tester_keys(
    keys: impl IntoIterator<Item = String>,
) -> Result<(), BotSpecError> {
    let invalid: Vec<_> = keys
        .into_iter()
        .filter(|name| !DUMMY_TESTER_FIELDS.contains(&name.as_str()))
        .collect();
    if invalid.is_empty() {
        Ok(())
    } else {
        Err(BotSpecError::new(BotSpecErrorKind::DummyTesterFields(
            invalid,
        )))
    }
}

/// Invariants that hold for every spec, however it was produced.
pub(super) fn check_invariants(fields: &BotSpecFields) -> Result<(), BotSpecError> {
    if fields.bot_type == BotType::Tester {
        require(
            fields.parent_buildername.is_some(),
            "parent-buildername",
            "bot-type is tester",
        )?;
    }
    if fields.parent_mastername.is_some() {
        require(
            fields.parent_buildername.is_some(),
            "parent-buildername",
            "parent-mastername is set",
        )?;
    }
    if fields.archive_build.unwrap_or(false) {
        require(
            fields.gs_bucket.is_some(),
            "gs-bucket",
            "archive-build is set",
        )?;
    }
    if fields.cf_archive_build {
        require(
            fields.cf_gs_bucket.is_some(),
            "cf-gs-bucket",
            "cf-archive-build is set",
        )?;
    }
    if fields.bisect_archive_build {
        require(
            fields.bisect_gs_bucket.is_some(),
            "bisect-gs-bucket",
            "bisect-archive-build is set",
        )?;
    }
    Ok(())
}

/// Returns the serialized form of the fields, with null values removed.
pub(super) fn to_mapping(fields: &BotSpecFields) -> Map<String, Value> {
    match serde_json::to_value(fields) {
        Ok(Value::Object(map)) => map.into_iter().filter(|(_, v)| !v.is_null()).collect(),
        _ => Map::new(),
    }
}

/// Returns the names of fields whose values differ from the defaults.
pub(super) fn non_default_fields(fields: &BotSpecFields) -> Vec<String> {
    let defaults = to_mapping(&BotSpecFields::default());
    to_mapping(fields)
        .into_iter()
        .filter(|(name, value)| defaults.get(name) != Some(value))
        .map(|(name, _)| name)
        .collect()
}

fn forbid(enabling_field: &'static str, fields: &[(&'static str, bool)]) -> Result<(), BotSpecError> {
    let set: Vec<_> = fields
        .iter()
        .filter_map(|&(name, is_set)| if is_set { Some(name) } else { None })
        .collect();
    if set.is_empty() {
        Ok(())
    } else {
        Err(BotSpecError::new(BotSpecErrorKind::ForbiddenWithout {
            enabling_field,
            fields: set,
        }))
    }
}

fn require(present: bool, field: &'static str, because: &'static str) -> Result<(), BotSpecError> {
    if present {
        Ok(())
    } else {
        Err(BotSpecError::new(BotSpecErrorKind::MissingRequired {
            field,
            because,
        }))
    }
}
