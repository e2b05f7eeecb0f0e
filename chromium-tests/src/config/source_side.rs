// Copyright (c) The cargo-guppy Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::{generators::SourceSideBuilderSpec, Error};
use camino::{Utf8Path, Utf8PathBuf};
use serde_json::Value;
use std::{collections::BTreeMap, fs, io};

/// The file mapping script names to the targets they need compiled.
pub const SCRIPTS_COMPILE_TARGETS_FILE: &str = "compile_targets_for_scripts.json";

/// A source of the specs checked into the source tree.
///
/// Each spec file maps builder names to the tests they run.
pub trait SourceSpecProvider {
    /// Reads a spec file, returning its top-level entries.
    fn read_source_side_spec(&self, file: &str) -> Result<BTreeMap<String, Value>, Error>;

    /// Returns, for each script test, the targets it needs compiled.
    fn compile_targets_for_scripts(&self) -> Result<BTreeMap<String, Vec<String>>, Error>;
}

/// Spec files in a directory on disk.
///
/// A missing scripts file is treated as empty. Any other missing file is an error.
#[derive(Clone, Debug)]
pub struct SourceSpecDir {
    dir: Utf8PathBuf,
}

impl SourceSpecDir {
    /// Creates a provider reading from `dir`.
    pub fn new(dir: impl Into<Utf8PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Returns the directory spec files are read from.
    pub fn dir(&self) -> &Utf8Path {
        &self.dir
    }

    fn read(&self, file: &str) -> Result<String, Error> {
        fs::read_to_string(self.dir.join(file)).map_err(|err| Error::SourceSideSpecIo {
            file: file.to_owned(),
            err,
        })
    }
}

impl SourceSpecProvider for SourceSpecDir {
    fn read_source_side_spec(&self, file: &str) -> Result<BTreeMap<String, Value>, Error> {
        let contents = self.read(file)?;
        parse_spec_file(file, &contents)
    }

    fn compile_targets_for_scripts(&self) -> Result<BTreeMap<String, Vec<String>>, Error> {
        let contents = match self.read(SCRIPTS_COMPILE_TARGETS_FILE) {
            Ok(contents) => contents,
            Err(Error::SourceSideSpecIo { err, .. }) if err.kind() == io::ErrorKind::NotFound => {
                return Ok(BTreeMap::new());
            }
            Err(err) => return Err(err),
        };
        serde_json::from_str(&contents).map_err(|err| Error::SourceSideSpecParse {
            file: SCRIPTS_COMPILE_TARGETS_FILE.to_owned(),
            builder: None,
            err,
        })
    }
}

/// Spec files held in memory.
#[derive(Clone, Debug, Default)]
pub struct InMemorySpecs {
    files: BTreeMap<String, BTreeMap<String, Value>>,
    scripts_compile_targets: BTreeMap<String, Vec<String>>,
}

impl InMemorySpecs {
    /// Creates an empty set of spec files.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a spec file.
    pub fn with_file(mut self, file: impl Into<String>, contents: BTreeMap<String, Value>) -> Self {
        self.files.insert(file.into(), contents);
        self
    }

    /// Adds a spec file from JSON text.
    pub fn with_json(self, file: impl Into<String>, json: &str) -> Result<Self, Error> {
        let file = file.into();
        let contents = parse_spec_file(&file, json)?;
        Ok(self.with_file(file, contents))
    }

    /// Sets the targets a script test needs compiled.
    pub fn with_script_targets(
        mut self,
        script: impl Into<String>,
        targets: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        self.scripts_compile_targets.insert(
            script.into(),
            targets.into_iter().map(Into::into).collect(),
        );
        self
    }
}

impl SourceSpecProvider for InMemorySpecs {
    fn read_source_side_spec(&self, file: &str) -> Result<BTreeMap<String, Value>, Error> {
        self.files
            .get(file)
            .cloned()
            .ok_or_else(|| Error::SourceSideSpecIo {
                file: file.to_owned(),
                err: io::Error::new(io::ErrorKind::NotFound, "no such spec file"),
            })
    }

    fn compile_targets_for_scripts(&self) -> Result<BTreeMap<String, Vec<String>>, Error> {
        Ok(self.scripts_compile_targets.clone())
    }
}

fn parse_spec_file(file: &str, contents: &str) -> Result<BTreeMap<String, Value>, Error> {
    serde_json::from_str(contents).map_err(|err| Error::SourceSideSpecParse {
        file: file.to_owned(),
        builder: None,
        err,
    })
}

/// Parses the entries of a spec file. Entries that aren't objects, such as the comments at the
/// top of generated files, are skipped.
pub(super) fn parse_builder_specs(
    file: &str,
    raw: BTreeMap<String, Value>,
) -> Result<BTreeMap<String, SourceSideBuilderSpec>, Error> {
    raw.into_iter()
        .filter(|(_, value)| value.is_object())
        .map(|(builder, value)| {
            let spec = parse_builder_spec(file, &builder, value)?;
            Ok((builder, spec))
        })
        .collect()
}

pub(super) fn parse_builder_spec(
    file: &str,
    builder: &str,
    value: Value,
) -> Result<SourceSideBuilderSpec, Error> {
    serde_json::from_value(value).map_err(|err| Error::SourceSideSpecParse {
        file: file.to_owned(),
        builder: Some(builder.to_owned()),
        err,
    })
}
