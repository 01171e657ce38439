//! # Freeze Command Implementation
//!
//! Records the commit every merge target currently points to in
//! `odoo.versions.yaml`, next to the project configuration. The existing pin
//! file is ignored while collecting, so refreshing pins always starts from
//! the branch names in the configuration.

use anyhow::Result;
use clap::{Args, ValueEnum};
use dialoguer::{theme::ColorfulTheme, Confirm};
use log::{info, warn};
use std::path::Path;

use odoo_bootstrap::config::VERSIONS_FILE;
use odoo_bootstrap::freeze::{collect_pins, should_write, write_pins, FreezeMode};
use odoo_bootstrap::output::success;
use odoo_bootstrap::repository::GitAggregator;

use super::Context;

#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Mode {
    /// Overwrite an existing pin file
    All,
    /// Ask before overwriting
    #[default]
    Ask,
    /// Keep an existing pin file
    Skip,
}

impl From<Mode> for FreezeMode {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::All => FreezeMode::All,
            Mode::Ask => FreezeMode::Ask,
            Mode::Skip => FreezeMode::Skip,
        }
    }
}

/// Pin the current repository heads in odoo.versions.yaml
#[derive(Args, Debug)]
pub struct FreezeArgs {
    /// What to do when the pin file already exists
    #[arg(long, value_enum, default_value_t = Mode::Ask)]
    pub mode: Mode,
}

fn confirm_overwrite(file: &Path) -> bool {
    Confirm::with_theme(&ColorfulTheme::default())
        .with_prompt(format!("Do you want to overwrite the {}?", file.display()))
        .default(false)
        .interact()
        .unwrap_or_else(|err| {
            warn!("Cannot ask for confirmation: {}", err);
            false
        })
}

pub fn execute(args: FreezeArgs, context: &Context) -> Result<()> {
    let env = context.load(true)?;

    let Some(pins) = collect_pins(env.tree(), env.root(), &GitAggregator)? else {
        info!("Nothing to freeze");
        return Ok(());
    };

    let file = env.root().join(VERSIONS_FILE);
    if !should_write(&file, args.mode.into(), confirm_overwrite) {
        info!("Keeping {}", file.display());
        return Ok(());
    }

    write_pins(&file, &pins)?;
    println!(
        "{}",
        success(&context.output, &format!("Froze repositories into {}", file.display()))
    );
    Ok(())
}
