// Copyright (c) The cargo-guppy Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::{bot_spec::BotType, generators::TestSpec};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The raw field set of a builder spec.
///
/// `BotSpecFields` is what configuration files deserialize into. It carries no guarantees; a
/// [`BotSpec`](super::BotSpec) is created from it through validation.
///
/// Fields are spelled in kebab-case in configuration files.
#[derive(Clone, Debug, Eq, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields, rename_all = "kebab-case")]
#[allow(missing_docs)]
pub struct BotSpecFields {
    /// The LUCI project the builder belongs to.
    pub luci_project: String,
    pub bot_type: BotType,

    /// The master of the parent builder. Defaults to the builder's own master.
    pub parent_mastername: Option<String>,
    /// The parent builder, which triggers this one.
    pub parent_buildername: Option<String>,

    pub chromium_config: Option<String>,
    pub chromium_apply_config: Vec<String>,
    pub chromium_config_kwargs: BTreeMap<String, serde_json::Value>,
    pub chromium_tests_config: String,
    pub chromium_tests_apply_config: Vec<String>,
    pub gclient_config: Option<String>,
    pub gclient_apply_config: Vec<String>,
    pub gclient_config_kwargs: BTreeMap<String, serde_json::Value>,
    pub android_config: Option<String>,
    pub android_apply_config: Vec<String>,
    pub android_version: Option<String>,
    pub test_results_config: Option<String>,

    pub isolate_server: Option<String>,
    pub swarming_server: Option<String>,
    /// The priority of swarming tasks triggered by this builder. Lower is more urgent.
    pub swarming_default_priority: Option<u32>,
    /// Dimensions added to every swarming task triggered by this builder.
    pub swarming_dimensions: BTreeMap<String, String>,

    pub clobber: bool,
    pub set_component_rev: BTreeMap<String, String>,

    /// Targets compiled in addition to the targets of the builder's tests.
    pub compile_targets: Vec<String>,
    /// Whether the compile targets of tests are added to the compile.
    pub add_tests_as_compile_targets: bool,

    pub build_gs_bucket: Option<String>,
    pub enable_package_transfer: bool,

    pub disable_tests: bool,
    /// Tests defined alongside the builder rather than in a source-side spec.
    pub test_specs: Vec<TestSpec>,
    pub serialize_tests: bool,

    /// The source-side spec file for the builder's master, relative to the spec directory.
    pub source_side_spec_file: Option<String>,
    /// A source-side spec for this builder alone, used instead of reading a file.
    pub source_side_spec: Option<serde_json::Value>,
    /// A source-side spec for every builder on the master, used instead of reading a file.
    pub downstream_spec: Option<BTreeMap<String, serde_json::Value>>,

    pub perf_isolate_upload: bool,

    pub archive_build: Option<bool>,
    pub gs_bucket: Option<String>,
    pub gs_acl: Option<String>,
    pub gs_build_name: Option<String>,

    pub cf_archive_build: bool,
    pub cf_gs_bucket: Option<String>,
    pub cf_gs_acl: Option<String>,
    pub cf_archive_name: Option<String>,
    pub cf_archive_subdir_suffix: Option<String>,

    pub bisect_archive_build: bool,
    pub bisect_gs_bucket: Option<String>,
    pub bisect_gs_extra: Option<String>,

    pub simulation_platform: Option<String>,
}

impl Default for BotSpecFields {
    fn default() -> Self {
        Self {
            luci_project: "chromium".to_owned(),
            bot_type: BotType::BuilderTester,
            parent_mastername: None,
            parent_buildername: None,
            chromium_config: None,
            chromium_apply_config: Vec::new(),
            chromium_config_kwargs: BTreeMap::new(),
            chromium_tests_config: "chromium".to_owned(),
            chromium_tests_apply_config: Vec::new(),
            gclient_config: None,
            gclient_apply_config: Vec::new(),
            gclient_config_kwargs: BTreeMap::new(),
            android_config: None,
            android_apply_config: Vec::new(),
            android_version: None,
            test_results_config: None,
            isolate_server: None,
            swarming_server: None,
            swarming_default_priority: None,
            swarming_dimensions: BTreeMap::new(),
            clobber: false,
            set_component_rev: BTreeMap::new(),
            compile_targets: Vec::new(),
            add_tests_as_compile_targets: true,
            build_gs_bucket: None,
            enable_package_transfer: false,
            disable_tests: false,
            test_specs: Vec::new(),
            serialize_tests: false,
            source_side_spec_file: None,
            source_side_spec: None,
            downstream_spec: None,
            perf_isolate_upload: false,
            archive_build: None,
            gs_bucket: None,
            gs_acl: None,
            gs_build_name: None,
            cf_archive_build: false,
            cf_gs_bucket: None,
            cf_gs_acl: None,
            cf_archive_name: None,
            cf_archive_subdir_suffix: None,
            bisect_archive_build: false,
            bisect_gs_bucket: None,
            bisect_gs_extra: None,
            simulation_platform: None,
        }
    }
}

/// Additional values for the sequence fields of a spec, appended by
/// [`BotSpec::extend`](super::BotSpec::extend).
#[derive(Clone, Debug, Default, Eq, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields, rename_all = "kebab-case")]
#[allow(missing_docs)]
pub struct BotSpecExtension {
    pub chromium_apply_config: Vec<String>,
    pub chromium_tests_apply_config: Vec<String>,
    pub gclient_apply_config: Vec<String>,
    pub android_apply_config: Vec<String>,
    pub compile_targets: Vec<String>,
    pub test_specs: Vec<TestSpec>,
}

impl BotSpecExtension {
    /// Returns true if this extension adds nothing.
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    pub(super) fn apply_to(self, fields: &mut BotSpecFields) {
        fields
            .chromium_apply_config
            .extend(self.chromium_apply_config);
        fields
            .chromium_tests_apply_config
            .extend(self.chromium_tests_apply_config);
        fields.gclient_apply_config.extend(self.gclient_apply_config);
        fields.android_apply_config.extend(self.android_apply_config);
        fields.compile_targets.extend(self.compile_targets);
        fields.test_specs.extend(self.test_specs);
    }
}
