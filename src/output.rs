//! # Terminal Output
//!
//! Color and emoji decisions for the CLI, plus the status lines printed after
//! a command finishes.
//!
//! Colors follow `--color=always|never|auto`. In auto mode they are disabled
//! by `NO_COLOR` (any value), `CLICOLOR=0` or `TERM=dumb`, forced on by
//! `CLICOLOR_FORCE=1`, and otherwise follow the terminal capabilities.

use std::env;

use console::style;

use crate::aggregate::AggregationReport;

#[derive(Debug, Clone)]
pub struct OutputConfig {
    /// Whether colors and emojis should be used in output.
    pub use_color: bool,
}

impl OutputConfig {
    pub fn from_env_and_flag(color_flag: &str) -> Self {
        let use_color = match color_flag.to_lowercase().as_str() {
            "always" => true,
            "never" => false,
            _ => Self::detect_color_support(),
        };

        Self { use_color }
    }

    fn detect_color_support() -> bool {
        if env::var_os("NO_COLOR").is_some() {
            return false;
        }
        if env::var("CLICOLOR").is_ok_and(|v| v == "0") {
            return false;
        }
        if env::var("CLICOLOR_FORCE").is_ok_and(|v| v != "0" && !v.is_empty()) {
            return true;
        }
        if env::var("TERM").is_ok_and(|v| v == "dumb") {
            return false;
        }
        console::Term::stderr().features().colors_supported()
    }

    #[cfg(test)]
    pub fn with_color() -> Self {
        Self { use_color: true }
    }

    #[cfg(test)]
    pub fn without_color() -> Self {
        Self { use_color: false }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self::from_env_and_flag("auto")
    }
}

/// `emoji_str` when colors are enabled, `plain` otherwise.
pub fn emoji<'a>(config: &OutputConfig, emoji_str: &'a str, plain: &'a str) -> &'a str {
    if config.use_color {
        emoji_str
    } else {
        plain
    }
}

pub fn success(config: &OutputConfig, message: &str) -> String {
    let mark = emoji(config, "✅", "[OK]");
    if config.use_color {
        format!("{} {}", mark, style(message).green())
    } else {
        format!("{} {}", mark, message)
    }
}

pub fn failure(config: &OutputConfig, message: &str) -> String {
    let mark = emoji(config, "❌", "[FAILED]");
    if config.use_color {
        format!("{} {}", mark, style(message).red().bold())
    } else {
        format!("{} {}", mark, message)
    }
}

/// Summary of an aggregation run, one line per failed repository.
pub fn aggregation_summary(config: &OutputConfig, report: &AggregationReport) -> String {
    let mut counts = format!("{} synchronized", report.completed.len());
    if !report.skipped.is_empty() {
        counts.push_str(&format!(", {} skipped", report.skipped.len()));
    }
    if !report.not_started.is_empty() {
        counts.push_str(&format!(", {} not started", report.not_started.len()));
    }

    if report.is_success() {
        return success(config, &format!("Repositories: {}", counts));
    }

    let mut lines = vec![failure(
        config,
        &format!("Repositories: {}, {} failed", counts, report.errors.len()),
    )];
    for record in &report.errors {
        lines.push(format!("  {} {}", emoji(config, "•", "-"), record));
    }
    lines.join("\n")
}
