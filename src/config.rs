//! # Configuration Loading
//!
//! This module turns a chain of YAML documents into a single configuration
//! tree.
//!
//! ## Inheritance
//!
//! A document may declare parents under `bootstrap:extend`, either as one path
//! or as an ordered list of paths. Parents are loaded first, each with its own
//! inheritance applied, and merged left to right. The declaring document is
//! merged last, on top of the combined parents. Relative parent paths are
//! resolved against the directory of the declaring document.
//!
//! Every merge uses the repository [`OverridePolicy`], so a repository's
//! `merges` list always comes from the most specific document.
//!
//! ## Cycles
//!
//! A document that (directly or transitively) extends itself is rejected with
//! [`Error::CycleDetected`]. The same parent reached through two different
//! branches is fine.
//!
//! ## Pinned overlay
//!
//! After the chain is resolved, an optional overlay (by default
//! `odoo.versions.yaml`, written by `freeze`) is merged on top. A missing
//! overlay is logged and skipped.

use std::fs;
use std::path::{Path, PathBuf};

use log::{info, warn};

use crate::error::{Error, Result};
use crate::merge::{merge, OverridePolicy};
use crate::tree::{from_yaml, Node};

/// Top-level section holding the tool's own settings.
pub const SECTION: &str = "bootstrap";

/// Candidate configuration files, most specific first.
pub const CONFIG_FILES: [&str; 2] = ["odoo.local.yaml", "odoo.project.yaml"];

/// Optional overlay with pinned repository revisions.
pub const VERSIONS_FILE: &str = "odoo.versions.yaml";

/// Return the first existing default configuration file in `dir`.
pub fn find_config_file(dir: &Path) -> Option<PathBuf> {
    CONFIG_FILES
        .iter()
        .map(|name| dir.join(name))
        .find(|path| path.is_file())
}

/// Parse one YAML document into a tree.
///
/// An empty document yields an empty mapping. Any other non-mapping root is
/// a syntax error.
pub fn parse(content: &str, origin: &str) -> Result<Node> {
    let value: serde_yaml::Value =
        serde_yaml::from_str(content).map_err(|e| Error::ConfigSyntax {
            message: format!("{}: {}", origin, e),
            hint: None,
        })?;

    match from_yaml(value, origin)? {
        node if node.is_null() => Ok(Node::mapping()),
        node @ Node::Mapping(_) => Ok(node),
        other => Err(Error::ConfigSyntax {
            message: format!(
                "{}: the document root must be a mapping, found {}",
                origin,
                other.kind()
            ),
            hint: None,
        }),
    }
}

/// Parent documents declared by `bootstrap:extend`.
fn extends(document: &Node, origin: &str) -> Result<Vec<String>> {
    let invalid = |found: &str| Error::ConfigSyntax {
        message: format!(
            "{}: {}:extend must be a string or a list of strings, found {}",
            origin, SECTION, found
        ),
        hint: Some(format!(
            "use `extend: base.yaml` or `extend: [base.yaml, team.yaml]` under `{}`",
            SECTION
        )),
    };

    match document.get(&[SECTION, "extend"]) {
        None => Ok(Vec::new()),
        Some(node) if node.is_null() => Ok(Vec::new()),
        Some(Node::Sequence(items)) => items
            .iter()
            .map(|item| {
                item.as_str()
                    .map(str::to_string)
                    .ok_or_else(|| invalid(&format!("a list containing a {}", item.kind())))
            })
            .collect(),
        Some(node) => node
            .as_str()
            .map(|path| vec![path.to_string()])
            .ok_or_else(|| invalid(node.kind())),
    }
}

/// Loads configuration documents and their inheritance chains.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    policy: OverridePolicy,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self::with_policy(OverridePolicy::repository())
    }

    pub fn with_policy(policy: OverridePolicy) -> Self {
        Self { policy }
    }

    /// Load `path` with its full inheritance chain.
    pub fn load(&self, path: &Path) -> Result<Node> {
        self.load_chain(path, &mut Vec::new())
    }

    /// Load `path` if it exists, otherwise return `None`.
    pub fn load_optional(&self, path: &Path) -> Result<Option<Node>> {
        if !path.is_file() {
            warn!(" * {} (not found, skipped)", path.display());
            return Ok(None);
        }
        self.load(path).map(Some)
    }

    /// Load the project configuration and merge the optional overlay on top.
    pub fn load_project(&self, config: &Path, overlay: Option<&Path>) -> Result<Node> {
        let tree = self.load(config)?;
        match overlay {
            Some(overlay) => match self.load_optional(overlay)? {
                Some(pinned) => Ok(merge(tree, pinned, &self.policy)),
                None => Ok(tree),
            },
            None => Ok(tree),
        }
    }

    fn load_chain(&self, path: &Path, chain: &mut Vec<PathBuf>) -> Result<Node> {
        if !path.is_file() {
            return Err(Error::ConfigNotFound {
                path: path.display().to_string(),
            });
        }

        let canonical = fs::canonicalize(path)?;
        if let Some(start) = chain.iter().position(|seen| seen == &canonical) {
            let cycle = chain[start..]
                .iter()
                .chain(std::iter::once(&canonical))
                .map(|p| p.display().to_string())
                .collect::<Vec<_>>()
                .join(" -> ");
            return Err(Error::CycleDetected { cycle });
        }

        info!(" * {}", path.display());
        let origin = path.display().to_string();
        let document = parse(&fs::read_to_string(&canonical)?, &origin)?;
        let parents = extends(&document, &origin)?;
        let base = canonical.parent().unwrap_or(Path::new("")).to_path_buf();

        chain.push(canonical);
        let mut inherited: Option<Node> = None;
        for parent in parents {
            let tree = match self.load_chain(&base.join(&parent), chain) {
                Ok(tree) => tree,
                Err(e) => {
                    chain.pop();
                    return Err(e);
                }
            };
            inherited = Some(match inherited {
                Some(acc) => merge(acc, tree, &self.policy),
                None => tree,
            });
        }
        chain.pop();

        Ok(match inherited {
            Some(acc) => merge(acc, document, &self.policy),
            None => document,
        })
    }
}
