// Copyright (c) The cargo-guppy Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::{
    output::{OutputContext, OutputOpts},
    plan::BuildPlan,
};
use camino::Utf8PathBuf;
use chromium_tests::{
    api::BuildProperties,
    config::{BotConfig, SourceSpecDir},
    load::{load_config, ConfigSource, LoadedConfig},
    BuilderId,
};
use clap::Parser;
use color_eyre::eyre::{bail, Result, WrapErr};
use itertools::Itertools;
use log::{debug, info, warn};
use owo_colors::OwoColorize;
use std::io::{self, Write};

/// Verify builder configurations and print build plans.
#[derive(Debug, Parser)]
#[clap(name = "botcfg", version)]
pub struct Args {
    #[clap(flatten)]
    pub(crate) output: OutputOpts,
    #[clap(subcommand)]
    pub(crate) command: Command,
}

impl Args {
    /// Executes this command, returning the exit code.
    pub fn exec(self) -> Result<i32> {
        let output = self.output.init();
        let stdout = io::stdout();
        let mut out = stdout.lock();
        self.command.exec(&output, &mut out)
    }
}

#[derive(Debug, Parser)]
pub(crate) struct ConfigOpts {
    /// Builder config files to load (TOML)
    #[clap(long = "config", short = 'c', required = true, number_of_values = 1)]
    pub(crate) configs: Vec<Utf8PathBuf>,
}

impl ConfigOpts {
    pub(crate) fn load(&self, output: &OutputContext) -> Result<LoadedConfig> {
        let mut sources = Vec::with_capacity(self.configs.len());
        for path in &self.configs {
            debug!("reading {}", path.style(output.styles.config_path));
            sources.push(ConfigSource::from_path(path)?);
        }
        let loaded = load_config(sources).wrap_err_with(|| {
            format!(
                "failed to load configuration from {}",
                self.configs.iter().join(", ")
            )
        })?;
        Ok(loaded)
    }
}

#[derive(Debug, Parser)]
pub(crate) enum Command {
    /// Load configs and check every builder and try builder in them
    Verify {
        #[clap(flatten)]
        config: ConfigOpts,
    },

    /// Print a set of builders and every builder they trigger
    Closure {
        #[clap(flatten)]
        config: ConfigOpts,

        /// Builders to start from, as master:builder
        #[clap(required = true)]
        builders: Vec<BuilderId>,
    },

    /// Print the tests and compile targets of a build
    Plan {
        #[clap(flatten)]
        config: ConfigOpts,

        /// Directory containing source-side test specs
        #[clap(long)]
        specs: Utf8PathBuf,

        /// The builder running the build, as master:builder
        #[clap(
            long = "try",
            conflicts_with = "mirror",
            required_unless_present = "mirror"
        )]
        try_builder: Option<BuilderId>,

        /// Builders to mirror instead of a try builder, as master:builder
        #[clap(long, number_of_values = 1)]
        mirror: Vec<BuilderId>,

        /// Build properties, as a JSON object
        #[clap(long)]
        properties: Option<String>,

        /// Print the plan as JSON
        #[clap(long)]
        json: bool,
    },
}

impl Command {
    pub(crate) fn exec(self, output: &OutputContext, out: &mut impl Write) -> Result<i32> {
        match self {
            Command::Verify { config } => {
                let loaded = config.load(output)?;
                verify(&loaded)?;
                if !output.quiet {
                    writeln!(
                        out,
                        "verified {} builder(s) in {} master(s) and {} try builder(s)",
                        loaded.bot_db.len(),
                        loaded.bot_db.master_specs().len(),
                        loaded.try_db.len(),
                    )?;
                }
                Ok(0)
            }
            Command::Closure { config, builders } => {
                let loaded = config.load(output)?;
                for builder_id in closure(&loaded, &builders)? {
                    writeln!(out, "{}", builder_id.style(output.styles.builder_id))?;
                }
                Ok(0)
            }
            Command::Plan {
                config,
                specs,
                try_builder,
                mirror,
                properties,
                json,
            } => {
                let loaded = config.load(output)?;
                let target = match try_builder {
                    Some(builder_id) => PlanTarget::Builder(builder_id),
                    None => PlanTarget::Mirrors(mirror),
                };
                let properties = match properties {
                    Some(json) => serde_json::from_str(&json)
                        .wrap_err("--properties is not a valid properties object")?,
                    None => BuildProperties::default(),
                };

                let plan = plan(&loaded, target, &SourceSpecDir::new(specs), properties)?;
                if json {
                    serde_json::to_writer_pretty(&mut *out, &plan)?;
                    writeln!(out)?;
                } else {
                    plan.write_text(&output.styles, &mut *out)?;
                }

                for diagnostic in &plan.diagnostics {
                    warn!("{}: {}", diagnostic.step_name, diagnostic.details);
                }
                Ok(if plan.diagnostics.is_empty() { 0 } else { 1 })
            }
        }
    }
}

/// Checks the invariants of a loaded configuration that loading alone doesn't.
pub fn verify(loaded: &LoadedConfig) -> Result<()> {
    loaded.bot_db.verify()?;
    let graph = loaded.bot_db.bot_graph()?;
    for (child, parent) in graph.dangling_parents() {
        warn!(
            "{} is triggered by {}, which has no configuration",
            child, parent
        );
    }

    for (try_builder, try_spec) in loaded.try_db.iter() {
        BotConfig::from_try_spec(&loaded.bot_db, try_spec.clone())
            .wrap_err_with(|| format!("try builder {} has invalid mirrors", try_builder))?;
    }
    Ok(())
}

/// Returns `builders` and every builder they trigger, sorted.
pub fn closure(loaded: &LoadedConfig, builders: &[BuilderId]) -> Result<Vec<BuilderId>> {
    for builder_id in builders {
        loaded.bot_db.spec(builder_id)?;
    }
    let graph = loaded.bot_db.bot_graph()?;
    Ok(graph.transitive_closure(builders).into_iter().collect())
}

/// What `botcfg plan` builds a plan for.
#[derive(Clone, Debug)]
pub enum PlanTarget {
    /// The builder running the build. Try builders use their mirrors, anything else mirrors
    /// itself.
    Builder(BuilderId),
    /// An explicit set of builders to mirror.
    Mirrors(Vec<BuilderId>),
}

/// Builds the plan for a build of `target`.
///
/// Properties that identify the running builder are filled in from the target when they're
/// unset.
pub fn plan(
    loaded: &LoadedConfig,
    target: PlanTarget,
    provider: &SourceSpecDir,
    mut properties: BuildProperties,
) -> Result<BuildPlan> {
    let bot_config = match &target {
        PlanTarget::Builder(builder_id) => {
            if loaded.try_db.contains(builder_id) {
                properties.is_tryserver = true;
            }
            fill_builder(&mut properties, builder_id);
            BotConfig::lookup(&loaded.bot_db, &loaded.try_db, builder_id)?
        }
        PlanTarget::Mirrors(mirrors) => {
            let first = match mirrors.first() {
                Some(first) => first,
                None => bail!("at least one builder to mirror is required"),
            };
            fill_builder(&mut properties, first);
            BotConfig::create(&loaded.bot_db, mirrors.iter().cloned())?
        }
    };

    let (build_config, diagnostics) = bot_config.create_build_config(provider, &properties)?;
    let plan = BuildPlan::new(&build_config, diagnostics)?;
    for report in &plan.compile_targets_reports {
        report.log();
    }
    info!(
        "{} test(s) in scope, {} triggered, {} compile target(s)",
        plan.tests_in_scope.len(),
        plan.tests_triggered.len(),
        plan.compile_targets.len(),
    );
    Ok(plan)
}

fn fill_builder(properties: &mut BuildProperties, builder_id: &BuilderId) {
    if properties.buildername.is_empty() {
        properties.buildername = builder_id.builder().to_owned();
    }
    if properties.mastername.is_none() {
        properties.mastername = Some(builder_id.master().to_owned());
    }
}
