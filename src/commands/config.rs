//! # Config Command Implementation
//!
//! Prints the fully resolved configuration: the extend chain merged, the pin
//! overlay applied, environment variables overlaid and every `${a:b}`
//! placeholder substituted. With `--repos` it prints the planned repository
//! jobs instead.

use anyhow::Result;
use clap::{Args, ValueEnum};

use super::Context;

#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Format {
    #[default]
    Yaml,
    Json,
}

/// Print the resolved configuration
#[derive(Args, Debug)]
pub struct ConfigArgs {
    /// Output format
    #[arg(long, value_enum, default_value_t = Format::Yaml)]
    pub format: Format,

    /// Print the planned repositories instead of the configuration tree
    #[arg(long)]
    pub repos: bool,
}

pub fn execute(args: ConfigArgs, context: &Context) -> Result<()> {
    let env = context.load(false)?;

    let text = if args.repos {
        let specs = env.repositories()?;
        match args.format {
            Format::Yaml => serde_yaml::to_string(&specs)?,
            Format::Json => serde_json::to_string_pretty(&specs)?,
        }
    } else {
        match args.format {
            Format::Yaml => env.to_yaml()?,
            Format::Json => env.to_json()?,
        }
    };

    print!("{}", text);
    if !text.ends_with('\n') {
        println!();
    }
    Ok(())
}
