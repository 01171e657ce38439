//! # CLI Command Implementations
//!
//! Each subcommand of `odoo-bootstrap` lives in its own file with an `Args`
//! struct derived with `clap` and an `execute` function calling into the
//! `odoo_bootstrap` library.

pub mod config;
pub mod freeze;
pub mod init;

use std::path::PathBuf;

use anyhow::{anyhow, Result};
use odoo_bootstrap::config::{find_config_file, CONFIG_FILES};
use odoo_bootstrap::environment::{Environment, LoadOptions};
use odoo_bootstrap::output::OutputConfig;
use odoo_bootstrap::resolve::EnvVars;

/// Global options shared by every command.
#[derive(Debug)]
pub struct Context {
    pub config: Option<PathBuf>,
    pub output: OutputConfig,
}

impl Context {
    /// The explicit `--config`, or the first default file in the working directory.
    pub fn config_path(&self) -> Result<PathBuf> {
        if let Some(config) = &self.config {
            return Ok(config.clone());
        }
        let cwd = std::env::current_dir()?;
        find_config_file(&cwd).ok_or_else(|| {
            anyhow!(
                "No configuration file found in {} (looked for {})",
                cwd.display(),
                CONFIG_FILES.join(", ")
            )
        })
    }

    /// Load and resolve the project configuration.
    pub fn load(&self, skip_overlay: bool) -> Result<Environment> {
        let config = self.config_path()?;
        let options = LoadOptions {
            skip_overlay,
            env: EnvVars::from_process(),
            ..LoadOptions::default()
        };
        Ok(Environment::load(&config, &options)?)
    }
}
