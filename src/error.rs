//! # Error Handling
//!
//! This module defines the centralized error type for `odoo-bootstrap`. It uses
//! `thiserror` to derive a single `Error` enum that covers every failure mode
//! of the configuration pipeline and the repository synchronization layer.
//!
//! ## Failure classes
//!
//! - **Pre-flight errors** (`ConfigSyntax`, `ConfigNotFound`, `CycleDetected`,
//!   `ConfigResolution`, `RepoConfig`): surfaced synchronously and stop the
//!   whole run before any repository is touched.
//! - **Synchronization errors** (`GitCommand`, `ShellCommand`,
//!   `DirtyWorkingTree`, `Panic`): produced by a single repository job. The
//!   orchestrator captures them into an [`ErrorRecord`] and never lets them
//!   reach sibling jobs.
//! - **Aggregate failure** (`AggregationAbort`): reported once every admitted
//!   job has finished, carrying every collected record.
//!
//! [`ErrorRecord`]: crate::aggregate::ErrorRecord

use thiserror::Error;

use crate::aggregate::ErrorRecord;

/// Main error type for odoo-bootstrap operations
#[derive(Error, Debug)]
pub enum Error {
    /// A configuration document is not well-formed, or one of its structural
    /// fields (such as `bootstrap:extend`) has the wrong type.
    #[error("Configuration syntax error: {message}{}", hint.as_ref().map(|h| format!("\n  hint: {}", h)).unwrap_or_default())]
    ConfigSyntax {
        message: String,
        /// Optional hint for how to fix the document
        hint: Option<String>,
    },

    /// A required configuration document does not exist.
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: String },

    /// The extend chain loops back onto a document that is still being loaded.
    #[error("Cycle detected in configuration inheritance: {cycle}")]
    CycleDetected { cycle: String },

    /// A placeholder could not be substituted.
    #[error("Cannot resolve ${{{variable}}}: {message}")]
    ConfigResolution { variable: String, message: String },

    /// A `repos` entry cannot be turned into a repository job.
    #[error("Invalid repository configuration for {repo}: {message}")]
    RepoConfig { repo: String, message: String },

    /// A git invocation exited unsuccessfully or could not be spawned.
    #[error("Git command failed in {repo}: git {command} - {stderr}")]
    GitCommand {
        command: String,
        repo: String,
        stderr: String,
    },

    /// A repository shell hook failed.
    #[error("Shell command failed in {repo}: {command} - {message}")]
    ShellCommand {
        command: String,
        repo: String,
        message: String,
    },

    /// Local changes would be discarded by the reset.
    #[error("Repository {repo} has local changes\n  hint: commit them or rerun with --force to stash them")]
    DirtyWorkingTree { repo: String },

    /// The sync collaborator panicked.
    #[error("Repository synchronization panicked: {message}")]
    Panic { message: String },

    /// One or more repository jobs failed.
    #[error("Aggregation failed for {} repositor{}: {}", errors.len(), if errors.len() == 1 { "y" } else { "ies" }, errors.iter().map(|r| r.path.display().to_string()).collect::<Vec<_>>().join(", "))]
    AggregationAbort { errors: Vec<ErrorRecord> },

    /// A registered migration hook failed.
    #[error("Migration hook failed during {stage}: {message}")]
    Hook { stage: String, message: String },

    /// An I/O error, wrapped from `std::io::Error`.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A YAML serialization error, wrapped from `serde_yaml::Error`.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// A JSON serialization error, wrapped from `serde_json::Error`.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A regular expression error, wrapped from `regex::Error`.
    #[error("Regex error: {0}")]
    Regex(#[from] regex::Error),

    /// A glob pattern error, wrapped from `glob::PatternError`.
    #[error("Glob pattern error: {0}")]
    Glob(#[from] glob::PatternError),

    /// The worker pool could not be built.
    #[error("Worker pool error: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

impl Error {
    /// Short, stable name of the failure kind, used when reporting records.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::ConfigSyntax { .. } => "config-syntax",
            Error::ConfigNotFound { .. } => "config-not-found",
            Error::CycleDetected { .. } => "cycle-detected",
            Error::ConfigResolution { .. } => "config-resolution",
            Error::RepoConfig { .. } => "repo-config",
            Error::GitCommand { .. } => "git",
            Error::ShellCommand { .. } => "shell",
            Error::DirtyWorkingTree { .. } => "dirty-working-tree",
            Error::Panic { .. } => "panic",
            Error::AggregationAbort { .. } => "aggregation-abort",
            Error::Hook { .. } => "hook",
            Error::Io(_) => "io",
            Error::Yaml(_) => "yaml",
            Error::Json(_) => "json",
            Error::Regex(_) => "regex",
            Error::Glob(_) => "glob",
            Error::ThreadPool(_) => "thread-pool",
        }
    }
}

/// A convenient type alias for `Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;
