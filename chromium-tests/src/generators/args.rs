// Copyright (c) The cargo-guppy Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::{
    api::BuildProperties,
    generators::{entries::TestEntryCommon, Diagnostic},
};
use std::collections::BTreeMap;

/// Replaces `$name` and `${name}` placeholders in `template` with values from `vars`.
///
/// `$$` is an escaped `$`. Placeholders that aren't in `vars`, and `$` signs that don't start a
/// placeholder, are left as they are.
///
/// Names consist of ASCII letters, digits and underscores, and don't start with a digit.
pub fn safe_substitute(template: &str, vars: &BTreeMap<&str, String>) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(idx) = rest.find('$') {
        out.push_str(&rest[..idx]);
        let after = &rest[idx + 1..];

        if let Some(after_escape) = after.strip_prefix('$') {
            out.push('$');
            rest = after_escape;
            continue;
        }

        let (name, consumed) = if let Some(braced) = after.strip_prefix('{') {
            match braced.find('}') {
                Some(end) if is_identifier(&braced[..end]) => (&braced[..end], end + 2),
                _ => ("", 0),
            }
        } else {
            let len = identifier_len(after);
            (&after[..len], len)
        };

        match vars.get(name) {
            Some(value) if consumed > 0 => {
                out.push_str(value);
                rest = &after[consumed..];
            }
            _ => {
                out.push('$');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

/// Returns the arguments for an entry, with try- or continuous-only arguments and conditional
/// arguments added, and build properties substituted.
pub(super) fn args_for_test(
    entry: &TestEntryCommon,
    test_name: &str,
    properties: &BuildProperties,
    diagnostics: &mut Vec<Diagnostic>,
) -> Vec<String> {
    let mut args = entry.args.clone();
    if properties.is_tryserver {
        args.extend(entry.precommit_args.iter().cloned());
    } else {
        args.extend(entry.non_precommit_args.iter().cloned());
    }

    let substitutions = properties.substitutions();
    for conditional in &entry.conditional_args {
        let known = BuildProperties::substitution_names()
            .iter()
            .any(|name| *name == conditional.variable);
        if !known {
            diagnostics.push(Diagnostic::new(
                "Invalid conditional",
                format!(
                    "Test spec for \"{}\" has a conditional on unknown variable \"{}\". \
                     Known variables: {}",
                    test_name,
                    conditional.variable,
                    BuildProperties::substitution_names().join(", ")
                ),
            ));
            continue;
        }
        let actual = substitutions
            .get(conditional.variable.as_str())
            .map_or("", String::as_str);
        if (actual == conditional.value) != conditional.invert {
            args.extend(conditional.args.iter().cloned());
        }
    }

    args.iter()
        .map(|arg| safe_substitute(arg, &substitutions))
        .collect()
}

fn identifier_len(s: &str) -> usize {
    let mut len = 0;
    for (idx, c) in s.char_indices() {
        let valid = c == '_' || c.is_ascii_alphabetic() || (idx > 0 && c.is_ascii_digit());
        if !valid {
            break;
        }
        len = idx + c.len_utf8();
    }
    len
}

fn is_identifier(s: &str) -> bool {
    !s.is_empty() && identifier_len(s) == s.len()
}
