//! # Init Command Implementation
//!
//! Bootstraps a project in two steps, each of which can be skipped:
//!
//! 1. Write `etc/odoo.cfg` from `odoo:options`. `PreInstall` hooks run
//!    first when the file does not exist yet.
//! 2. Synchronize every planned repository on a bounded worker pool.

use anyhow::Result;
use clap::Args;
use log::info;

use odoo_bootstrap::aggregate::{default_jobs, AdmissionPolicy, AggregationOptions};
use odoo_bootstrap::environment::Environment;
use odoo_bootstrap::error::Error;
use odoo_bootstrap::hooks::{Hooks, Stage};
use odoo_bootstrap::odoo_config::{self, ODOO_CONFIG};
use odoo_bootstrap::output::{aggregation_summary, failure, success};
use odoo_bootstrap::repository::GitAggregator;

use super::Context;

/// Generate etc/odoo.cfg and synchronize the repositories
#[derive(Args, Debug)]
pub struct InitArgs {
    /// Do not write etc/odoo.cfg
    #[arg(long)]
    pub skip_config: bool,

    /// Do not synchronize repositories
    #[arg(long)]
    pub skip_repos: bool,

    /// Number of repositories synchronized in parallel (defaults to the CPU count)
    #[arg(short, long, value_name = "N")]
    pub jobs: Option<usize>,

    /// Only synchronize repositories whose directory matches this glob
    #[arg(short, long, value_name = "GLOB")]
    pub dirmatch: Option<String>,

    /// Stash local changes instead of failing on a dirty repository
    #[arg(short, long)]
    pub force: bool,

    /// Keep starting repositories after one of them failed
    #[arg(long)]
    pub keep_going: bool,
}

pub fn execute(args: InitArgs, context: &Context) -> Result<()> {
    let env = context.load(false)?;
    let hooks = Hooks::new();

    if !args.skip_config {
        write_config(&env, &hooks, context)?;
    }
    if !args.skip_repos {
        sync_repositories(&env, &hooks, &args, context)?;
    }
    Ok(())
}

fn write_config(env: &Environment, hooks: &Hooks, context: &Context) -> Result<()> {
    let path = env.root().join(ODOO_CONFIG);
    if !path.exists() {
        hooks.run(Stage::PreInstall, &env.version())?;
    }

    info!("Writing {}", path.display());
    odoo_config::write(env.tree(), &path)?;
    println!(
        "{}",
        success(&context.output, &format!("Wrote {}", path.display()))
    );
    Ok(())
}

fn sync_repositories(
    env: &Environment,
    hooks: &Hooks,
    args: &InitArgs,
    context: &Context,
) -> Result<()> {
    let options = AggregationOptions {
        jobs: args.jobs.unwrap_or_else(default_jobs),
        dirmatch: args.dirmatch.clone(),
        force: args.force,
        policy: if args.keep_going {
            AdmissionPolicy::KeepGoing
        } else {
            AdmissionPolicy::StopOnError
        },
        root: env.root().to_path_buf(),
    };

    match env.bootstrap(GitAggregator, &options, hooks) {
        Ok(report) => {
            println!("{}", aggregation_summary(&context.output, &report));
            Ok(())
        }
        Err(Error::AggregationAbort { errors }) => {
            eprintln!(
                "{}",
                failure(
                    &context.output,
                    &format!("{} repositories failed to synchronize", errors.len())
                )
            );
            Err(Error::AggregationAbort { errors }.into())
        }
        Err(err) => Err(err.into()),
    }
}
