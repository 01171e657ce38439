//! # Odoo Bootstrap CLI
//!
//! This is the binary entry point for the `odoo-bootstrap` command-line tool.
//!
//! It parses the command line with `clap`, sets up logging and hands over to
//! the selected subcommand. Every error surfaces as a non-zero exit code. The
//! actual work lives in the `odoo_bootstrap` library crate.

mod cli;
mod commands;

use anyhow::Result;
use clap::Parser;

fn main() -> Result<()> {
    let cli = cli::Cli::parse();
    cli.execute()
}
