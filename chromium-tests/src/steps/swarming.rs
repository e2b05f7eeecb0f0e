// Copyright (c) The cargo-guppy Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::{
    api::{CipdPackage, ScriptHook},
    steps::REPEAT_COUNT_FOR_FAILING_TESTS,
};
use std::collections::BTreeMap;

/// The default swarming task priority, used when a builder doesn't set one.
pub const DEFAULT_TASK_PRIORITY: u32 = 200;

/// Filters longer than this are not passed to tests dispatched to Windows.
const WINDOWS_FILTER_CHAR_LIMIT: usize = 6000;
/// Filters longer than this are not passed to tests dispatched elsewhere.
const FILTER_CHAR_LIMIT: usize = 90000;

/// How a test runs on swarming.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SwarmingParams {
    /// The number of shards the test is split into.
    pub shards: u32,
    /// Task dimensions. A `None` value removes the dimension.
    pub dimensions: BTreeMap<String, Option<String>>,
    /// Fallback dimensions, keyed by expiration in seconds.
    pub optional_dimensions: BTreeMap<String, Vec<BTreeMap<String, String>>>,
    /// Appended to the test's name. Derived from the dimensions if not set.
    pub extra_suffix: Option<String>,
    pub expiration: Option<u64>,
    pub hard_timeout: Option<u64>,
    pub io_timeout: Option<u64>,
    /// The task priority, before per-suffix adjustments.
    pub priority: u32,
    pub cipd_packages: Vec<CipdPackage>,
    pub service_account: Option<String>,
    pub merge: Option<ScriptHook>,
    pub trigger_script: Option<ScriptHook>,
    pub idempotent: bool,
    pub ignore_task_failure: bool,
    /// Collect clang coverage profiles from the task.
    pub isolate_coverage_data: bool,
}

impl Default for SwarmingParams {
    fn default() -> Self {
        Self {
            shards: 1,
            dimensions: BTreeMap::new(),
            optional_dimensions: BTreeMap::new(),
            extra_suffix: None,
            expiration: None,
            hard_timeout: None,
            io_timeout: None,
            priority: DEFAULT_TASK_PRIORITY,
            cipd_packages: Vec::new(),
            service_account: None,
            merge: None,
            trigger_script: None,
            idempotent: true,
            ignore_task_failure: false,
            isolate_coverage_data: false,
        }
    }
}

impl SwarmingParams {
    /// Returns the suffix appended to the test's name: the explicit one if set, otherwise one
    /// describing the GPU or Android device the dimensions target.
    pub fn name_suffix(&self) -> Option<String> {
        if let Some(extra_suffix) = &self.extra_suffix {
            return Some(extra_suffix.clone());
        }
        let dimension = |key: &str| self.dimensions.get(key).and_then(|v| v.as_deref());
        if dimension("gpu").map_or(false, |gpu| !gpu.is_empty()) {
            return Some(gpu_suffix(dimension));
        }
        if dimension("os") == Some("Android") {
            if let Some(device_type) = dimension("device_type").filter(|d| !d.is_empty()) {
                return Some(android_suffix(device_type));
            }
        }
        None
    }

    /// Returns true if tasks will run on Windows bots.
    pub fn dispatches_to_windows(&self) -> bool {
        self.dimensions
            .get("os")
            .and_then(|os| os.as_deref())
            .map_or(false, |os| os.starts_with("Windows"))
    }

    /// Returns the maximum length of a test filter passed on the command line.
    pub fn filter_char_limit(&self) -> usize {
        if self.dispatches_to_windows() {
            WINDOWS_FILTER_CHAR_LIMIT
        } else {
            FILTER_CHAR_LIMIT
        }
    }
}

/// Returns the number of shards to use when retrying `num_tests_to_retry` tests of a suite that
/// originally ran `total_tests_ran` tests on `original_shards` shards.
///
/// The shard load is approximately preserved, accounting for each retried test being repeated.
/// The result is at least 1 and never more than the original shard count or the number of tests.
pub fn shards_to_retry_with(
    original_shards: u32,
    num_tests_to_retry: usize,
    total_tests_ran: usize,
) -> u32 {
    if total_tests_ran == 0 {
        return original_shards;
    }
    let scaled = f64::from(original_shards)
        * f64::from(REPEAT_COUNT_FOR_FAILING_TESTS)
        * (num_tests_to_retry as f64 / total_tests_ran as f64);
    let shards = scaled
        .max(1.0)
        .min(f64::from(original_shards))
        .min(num_tests_to_retry as f64);
    shards as u32
}

fn gpu_suffix<'a>(dimension: impl Fn(&str) -> Option<&'a str>) -> String {
    let vendor_id = dimension("gpu")
        .unwrap_or("")
        .split(':')
        .next()
        .unwrap_or("")
        .to_lowercase();
    let vendor = match vendor_id.as_str() {
        "8086" => "Intel".to_owned(),
        "10de" => "NVIDIA".to_owned(),
        "1002" => "ATI".to_owned(),
        other => format!("({})", other),
    };

    let os = dimension("os").unwrap_or("");
    let os_name = if os.starts_with("Mac") {
        if dimension("hidpi") == Some("1") {
            "Mac Retina"
        } else {
            "Mac"
        }
    } else if os.starts_with("Windows") {
        "Windows"
    } else {
        "Linux"
    };

    format!("on {} GPU on {}", vendor, os_name)
}

fn android_suffix(device_type: &str) -> String {
    let product = match device_type {
        "angler" => "Nexus 6P",
        "athene" => "Moto G4",
        "bullhead" => "Nexus 5X",
        "dragon" => "Pixel C",
        "flo" => "Nexus 7 [2013]",
        "flounder" => "Nexus 9",
        "foster" => "NVIDIA Shield",
        "fugu" => "Nexus Player",
        "goyawifi" => "Galaxy Tab 3",
        "grouper" => "Nexus 7 [2012]",
        "hammerhead" => "Nexus 5",
        "herolte" => "Galaxy S7 [Global]",
        "heroqlteatt" => "Galaxy S7 [AT&T]",
        "j5xnlte" => "Galaxy J5",
        "m0" => "Galaxy S3",
        "mako" => "Nexus 4",
        "manta" => "Nexus 10",
        "marlin" => "Pixel 1 XL",
        "sailfish" => "Pixel 1",
        "shamu" => "Nexus 6",
        "sprout" => "Android One",
        "taimen" => "Pixel 2 XL",
        "walleye" => "Pixel 2",
        "zerofltetmo" => "Galaxy S6",
        other => other,
    };
    format!("on Android device {}", product)
}
