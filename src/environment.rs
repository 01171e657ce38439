//! # Bootstrap Environment
//!
//! [`Environment`] ties the pipeline together. [`Environment::load`] reads
//! the configuration chain, merges the optional pin overlay and resolves
//! variables. The resulting tree is immutable; everything else reads from it:
//!
//! ```text
//! documents ──ConfigLoader──> tree ──VariableResolver──> resolved tree
//!                                                           │
//!                      RepoPlanner <────────────────────────┘
//!                          │
//!                   Vec<RepoSpec> ──Aggregator──> AggregationReport
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use crate::aggregate::{AggregationOptions, AggregationReport, Aggregator};
use crate::config::{ConfigLoader, VERSIONS_FILE};
use crate::error::Result;
use crate::hooks::{Hooks, Stage, Version};
use crate::planner::{RepoPlanner, RepoSpec};
use crate::repository::RepoSync;
use crate::resolve::{lookup, EnvVars, VariableResolver};
use crate::tree::Node;

/// How to load an [`Environment`].
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// Project root. Defaults to the directory of the configuration file.
    pub root: Option<PathBuf>,
    /// Pin overlay. Defaults to `odoo.versions.yaml` in the project root.
    pub overlay: Option<PathBuf>,
    /// Load without any pin overlay.
    pub skip_overlay: bool,
    pub env: EnvVars,
}

/// A fully resolved project configuration.
#[derive(Debug, Clone)]
pub struct Environment {
    tree: Node,
    root: PathBuf,
}

impl Environment {
    pub fn load(config: &Path, options: &LoadOptions) -> Result<Self> {
        let root = match &options.root {
            Some(root) => root.clone(),
            None => fs::canonicalize(config)?
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_default(),
        };

        let overlay = if options.skip_overlay {
            None
        } else {
            Some(
                options
                    .overlay
                    .clone()
                    .unwrap_or_else(|| root.join(VERSIONS_FILE)),
            )
        };

        let tree = ConfigLoader::new().load_project(config, overlay.as_deref())?;
        Self::from_tree(tree, root, options.env.clone())
    }

    /// Resolve an already merged tree.
    pub fn from_tree(tree: Node, root: impl Into<PathBuf>, env: EnvVars) -> Result<Self> {
        let root = root.into();
        let tree = VariableResolver::new(env, root.clone()).resolve(tree)?;
        Ok(Self { tree, root })
    }

    pub fn tree(&self) -> &Node {
        &self.tree
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Value at a colon-delimited path such as `odoo:version`.
    pub fn get(&self, reference: &str) -> Option<&Node> {
        lookup(&self.tree, reference)
    }

    /// Value at `reference`, or `default` if the path does not exist.
    pub fn get_or(&self, reference: &str, default: Node) -> Node {
        self.get(reference).cloned().unwrap_or(default)
    }

    /// An entry of `odoo:options`.
    pub fn opt(&self, key: &str) -> Option<&Node> {
        self.tree.get(&["odoo", "options", key])
    }

    /// Project version from `bootstrap:version`, `0.0` if unset.
    pub fn version(&self) -> Version {
        match self.get("bootstrap:version") {
            Some(node) if !node.is_null() => Version::parse(&node.render()),
            _ => Version::from("0.0"),
        }
    }

    pub fn repositories(&self) -> Result<Vec<RepoSpec>> {
        RepoPlanner::new(self.root.clone()).plan(&self.tree)
    }

    /// Synchronize all repositories.
    ///
    /// `PreUpdate` hooks run before the first job and `PostUpdate` hooks
    /// after every job succeeded. Any failed job turns into
    /// [`Error::AggregationAbort`](crate::error::Error::AggregationAbort).
    pub fn bootstrap<S: RepoSync>(
        &self,
        sync: S,
        options: &AggregationOptions,
        hooks: &Hooks,
    ) -> Result<AggregationReport> {
        let specs = self.repositories()?;
        let version = self.version();

        hooks.run(Stage::PreUpdate, &version)?;
        let report = Aggregator::new(sync).run(specs, options)?.into_result()?;
        hooks.run(Stage::PostUpdate, &version)?;
        Ok(report)
    }

    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(&self.tree)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.tree)?)
    }
}
