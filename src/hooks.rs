//! Migration hooks.
//!
//! Code that embeds the bootstrap pipeline can register callbacks for the
//! [`Stage`]s of a run. A stage without hooks does nothing. Hooks of one stage
//! run in registration order and the first failure aborts the stage.
//!
//! ```
//! use odoo_bootstrap::error::Result;
//! use odoo_bootstrap::hooks::{Hooks, Stage, Version};
//!
//! let mut hooks = Hooks::new();
//! hooks.register(Stage::PostUpdate, |version: &Version| -> Result<()> {
//!     println!("updated to {}", version);
//!     Ok(())
//! });
//! hooks.run(Stage::PostUpdate, &Version::from("15.0")).unwrap();
//! ```

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

use log::debug;

use crate::error::{Error, Result};

/// Point in a run at which hooks fire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Stage {
    /// Before the first installation of the project.
    PreInstall,
    /// Before repositories are synchronized.
    PreUpdate,
    /// After every repository was synchronized successfully.
    PostUpdate,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::PreInstall => "pre_install",
            Stage::PreUpdate => "pre_update",
            Stage::PostUpdate => "post_update",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
enum Part {
    Number(u64),
    Text(String),
}

/// A dotted version such as `14.0` or `1.2.beta`.
///
/// Parts compare numerically when they are numbers. A number sorts before
/// text, and a version sorts before any longer version it is a prefix of.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Version {
    parts: Vec<Part>,
}

impl Version {
    pub fn parse(text: &str) -> Self {
        let text = text.trim();
        if text.is_empty() {
            return Self::default();
        }
        Self {
            parts: text
                .split('.')
                .map(|part| match part.parse::<u64>() {
                    Ok(n) if part.bytes().all(|b| b.is_ascii_digit()) => Part::Number(n),
                    _ => Part::Text(part.to_string()),
                })
                .collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }
}

impl From<&str> for Version {
    fn from(text: &str) -> Self {
        Self::parse(text)
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        self.parts.cmp(&other.parts)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .parts
            .iter()
            .map(|part| match part {
                Part::Number(n) => n.to_string(),
                Part::Text(s) => s.clone(),
            })
            .collect();
        f.write_str(&parts.join("."))
    }
}

/// A callback run at a [`Stage`].
pub trait MigrationHook: Send + Sync {
    fn run(&self, version: &Version) -> Result<()>;
}

impl<F> MigrationHook for F
where
    F: Fn(&Version) -> Result<()> + Send + Sync,
{
    fn run(&self, version: &Version) -> Result<()> {
        self(version)
    }
}

/// Registered hooks per stage.
#[derive(Default)]
pub struct Hooks {
    stages: BTreeMap<Stage, Vec<Box<dyn MigrationHook>>>,
}

impl fmt::Debug for Hooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let counts: BTreeMap<String, usize> = self
            .stages
            .iter()
            .map(|(stage, hooks)| (stage.to_string(), hooks.len()))
            .collect();
        f.debug_struct("Hooks").field("stages", &counts).finish()
    }
}

impl Hooks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, stage: Stage, hook: impl MigrationHook + 'static) -> &mut Self {
        self.stages.entry(stage).or_default().push(Box::new(hook));
        self
    }

    pub fn count(&self, stage: Stage) -> usize {
        self.stages.get(&stage).map_or(0, Vec::len)
    }

    /// Run every hook of `stage` in registration order.
    pub fn run(&self, stage: Stage, version: &Version) -> Result<()> {
        let Some(hooks) = self.stages.get(&stage) else {
            debug!("No {} hooks registered", stage);
            return Ok(());
        };

        for hook in hooks {
            hook.run(version).map_err(|e| match e {
                Error::Hook { .. } => e,
                other => Error::Hook {
                    stage: stage.to_string(),
                    message: other.to_string(),
                },
            })?;
        }
        Ok(())
    }
}
