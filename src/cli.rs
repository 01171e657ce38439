//! CLI argument parsing and command dispatch

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use env_logger::WriteStyle;

use crate::commands::{self, Context};
use odoo_bootstrap::output::OutputConfig;

/// Odoo Bootstrap - Assemble an Odoo project from a layered configuration
#[derive(Parser, Debug)]
#[command(name = "odoo-bootstrap")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (defaults to odoo.local.yaml, then odoo.project.yaml)
    #[arg(
        short,
        long,
        global = true,
        value_name = "FILE",
        env = "ODOO_BOOTSTRAP_CONFIG"
    )]
    config: Option<PathBuf>,

    /// Colorize output (always, never, auto)
    #[arg(long, global = true, value_name = "WHEN", default_value = "auto")]
    color: String,

    /// Set log level (error, warn, info, debug, trace)
    #[arg(long, global = true, value_name = "LEVEL", default_value = "info")]
    log_level: String,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the resolved configuration
    #[command(visible_alias = "c")]
    Config(commands::config::ConfigArgs),

    /// Generate etc/odoo.cfg and synchronize the repositories
    #[command(visible_alias = "i")]
    Init(commands::init::InitArgs),

    /// Pin the current repository heads in odoo.versions.yaml
    #[command(visible_alias = "f")]
    Freeze(commands::freeze::FreezeArgs),
}

fn init_logging(level: &str, color: &str) {
    let style = match color.to_lowercase().as_str() {
        "always" => WriteStyle::Always,
        "never" => WriteStyle::Never,
        _ => WriteStyle::Auto,
    };

    // A second initialization only happens in tests and is harmless
    let _ = env_logger::Builder::new()
        .parse_filters(level)
        .write_style(style)
        .format_timestamp(None)
        .format_target(false)
        .try_init();
}

impl Cli {
    /// Execute the CLI command
    pub fn execute(self) -> Result<()> {
        init_logging(&self.log_level, &self.color);

        let context = Context {
            config: self.config,
            output: OutputConfig::from_env_and_flag(&self.color),
        };

        match self.command {
            Commands::Config(args) => commands::config::execute(args, &context),
            Commands::Init(args) => commands::init::execute(args, &context),
            Commands::Freeze(args) => commands::freeze::execute(args, &context),
        }
    }
}
