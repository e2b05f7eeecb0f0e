// Copyright (c) The cargo-guppy Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Builder specifications, trigger graphs and test orchestration for Chromium CI recipes.
//!
//! This crate models the configuration layer that sits between static builder tables and a
//! recipe execution engine:
//!
//! * [`BotSpec`](bot_spec::BotSpec) is an immutable, validated per-builder record.
//! * [`BotDatabase`](db::BotDatabase) indexes specs by [`BuilderId`] and derives the
//!   [`BotGraph`](db::BotGraph) of parent to triggered-child relationships.
//! * [`TryDatabase`](try_spec::TryDatabase) maps try builders to the continuous builders they
//!   mirror.
//! * [`BotConfig`](config::BotConfig) and [`BuildConfig`](config::BuildConfig) resolve a set of
//!   mirrors into a consistent configuration and a concrete list of tests.
//! * [`Test`](steps::Test) is an executable test with local and swarmed strategies, driven
//!   through the [`StepApi`](api::StepApi) boundary.
//! * [`generators`] translate source-side JSON test specs into tests.
//!
//! Configuration is read from TOML through [`load_config`](load::load_config), which is a pure
//! function of its inputs.
//!
//! # Examples
//!
//! Compute everything a builder triggers:
//!
//! ```
//! use chromium_tests::{load::{load_config, ConfigSource}, BuilderId};
//!
//! let source = ConfigSource::new(
//!     "chromium.linux.toml",
//!     r#"
//!     [masters."chromium.linux".builders."Linux Builder"]
//!     bot-type = "builder"
//!
//!     [masters."chromium.linux".builders."Linux Tests"]
//!     bot-type = "tester"
//!     parent-buildername = "Linux Builder"
//!     "#,
//! );
//! let config = load_config(vec![source]).expect("config is valid");
//! let graph = config.bot_db.bot_graph().expect("graph is acyclic");
//!
//! let closure = graph.transitive_closure(&[BuilderId::new("chromium.linux", "Linux Builder")]);
//! assert_eq!(closure.len(), 2);
//! ```

#![warn(missing_docs)]
#![cfg_attr(doc_cfg, feature(doc_cfg))]

pub mod api;
pub mod bot_spec;
mod builder_id;
pub mod config;
pub mod db;
pub mod errors;
pub mod generators;
pub mod load;
pub(crate) mod petgraph_support;
mod sorted_set;
pub mod steps;
pub mod try_spec;
#[cfg(test)]
mod unit_tests;

pub use builder_id::*;
pub use errors::Error;
pub use sorted_set::*;
