//! Repository planning.
//!
//! Every entry under `repos` is merged on top of the shared `bootstrap:repo`
//! defaults and normalized into a [`RepoSpec`]. Entries use the
//! git-aggregator layout:
//!
//! ```yaml
//! repos:
//!   oca/web:
//!     addon_path: oca/web
//!     defaults:
//!       depth: 1
//!     remotes:
//!       origin: https://github.com/OCA/web.git
//!     merges:
//!       - origin 15.0
//!       - {remote: origin, ref: refs/pull/42/head}
//!     target: origin 15.0
//!     shell_command_after: make assets
//! ```
//!
//! Planning fails before any repository is touched if an entry is incomplete.

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::{Error, Result};
use crate::merge::{merge, OverridePolicy, MERGES_KEY};
use crate::path::absolutize;
use crate::tree::{Mapping, Node, Scalar};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Remote {
    pub name: String,
    pub url: String,
}

/// One `remote ref` pair to fetch and merge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MergeTarget {
    pub remote: String,
    #[serde(rename = "ref")]
    pub reference: String,
}

/// Local branch that receives the merges.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Target {
    pub remote: String,
    pub branch: String,
}

/// Normalized description of one repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RepoSpec {
    /// Key of the entry under `repos`.
    pub key: String,
    /// Absolute filesystem target.
    pub path: PathBuf,
    pub remotes: Vec<Remote>,
    pub merges: Vec<MergeTarget>,
    pub target: Target,
    pub shell_commands: Vec<String>,
    pub addon_path: Option<String>,
    pub depth: Option<u64>,
}

impl RepoSpec {
    pub fn remote(&self, name: &str) -> Option<&Remote> {
        self.remotes.iter().find(|remote| remote.name == name)
    }
}

/// Expands the `repos` section into [`RepoSpec`]s.
#[derive(Debug, Clone)]
pub struct RepoPlanner {
    root: PathBuf,
    policy: OverridePolicy,
}

impl RepoPlanner {
    /// Repository keys are resolved against `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            policy: OverridePolicy::repository(),
        }
    }

    pub fn with_policy(mut self, policy: OverridePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Plan every repository, in key order.
    pub fn plan(&self, tree: &Node) -> Result<Vec<RepoSpec>> {
        let defaults = match tree.get(&["bootstrap", "repo"]) {
            None => Node::mapping(),
            Some(node) if node.is_null() => Node::mapping(),
            Some(node @ Node::Mapping(_)) => node.clone(),
            Some(other) => return Err(section_error("bootstrap:repo", other)),
        };

        let repos = match tree.get(&["repos"]) {
            None => return Ok(Vec::new()),
            Some(node) if node.is_null() => return Ok(Vec::new()),
            Some(Node::Mapping(repos)) => repos,
            Some(other) => return Err(section_error("repos", other)),
        };

        repos
            .iter()
            .map(|(key, entry)| {
                let entry = if entry.is_null() {
                    Node::mapping()
                } else {
                    entry.clone()
                };
                let merged = merge(defaults.clone(), entry, &self.policy);
                self.spec(key, &merged)
            })
            .collect()
    }

    fn spec(&self, key: &str, entry: &Node) -> Result<RepoSpec> {
        let fail = |message: String| Error::RepoConfig {
            repo: key.to_string(),
            message,
        };
        let fields = entry
            .as_mapping()
            .ok_or_else(|| fail(format!("expected a mapping, found {}", entry.kind())))?;

        let remotes = remotes(fields).map_err(fail)?;
        let merges = merges(fields).map_err(fail)?;
        for merge in &merges {
            if !remotes.iter().any(|r| r.name == merge.remote) {
                return Err(fail(format!(
                    "merge '{} {}' uses undeclared remote '{}'",
                    merge.remote, merge.reference, merge.remote
                )));
            }
        }

        let target = match fields.get("target") {
            None => None,
            Some(node) if node.is_null() => None,
            Some(node) => Some(node),
        };
        let target = match target {
            Some(node) => {
                let (remote, branch) = node
                    .as_str()
                    .and_then(split_pair)
                    .ok_or_else(|| fail("target must be a 'remote branch' string".to_string()))?;
                Target { remote, branch }
            }
            None => Target {
                remote: merges[0].remote.clone(),
                branch: merges[0].reference.clone(),
            },
        };
        if !remotes.iter().any(|r| r.name == target.remote) {
            return Err(fail(format!(
                "target uses undeclared remote '{}'",
                target.remote
            )));
        }

        let shell_commands = shell_commands(fields).map_err(fail)?;
        let addon_path = fields
            .get("addon_path")
            .and_then(Node::as_str)
            .map(str::to_string);
        let depth = depth(entry).map_err(fail)?;

        Ok(RepoSpec {
            key: key.to_string(),
            path: absolutize(&self.root, Path::new(key)),
            remotes,
            merges,
            target,
            shell_commands,
            addon_path,
            depth,
        })
    }
}

fn section_error(section: &str, found: &Node) -> Error {
    Error::ConfigSyntax {
        message: format!("{} must be a mapping, found {}", section, found.kind()),
        hint: None,
    }
}

fn split_pair(text: &str) -> Option<(String, String)> {
    let mut parts = text.split_whitespace();
    match (parts.next(), parts.next(), parts.next()) {
        (Some(first), Some(second), None) => Some((first.to_string(), second.to_string())),
        _ => None,
    }
}

fn remotes(fields: &Mapping) -> std::result::Result<Vec<Remote>, String> {
    let remotes = match fields.get("remotes") {
        Some(Node::Mapping(remotes)) if !remotes.is_empty() => remotes,
        Some(Node::Mapping(_)) | None => return Err("no remotes declared".to_string()),
        Some(node) if node.is_null() => return Err("no remotes declared".to_string()),
        Some(other) => {
            return Err(format!(
                "remotes must be a mapping of name to url, found {}",
                other.kind()
            ))
        }
    };

    remotes
        .iter()
        .map(|(name, url)| match url.as_str() {
            Some(url) if !url.trim().is_empty() => Ok(Remote {
                name: name.clone(),
                url: url.to_string(),
            }),
            _ => Err(format!("remote '{}' has no url", name)),
        })
        .collect()
}

fn merges(fields: &Mapping) -> std::result::Result<Vec<MergeTarget>, String> {
    let items = match fields.get(MERGES_KEY) {
        Some(Node::Sequence(items)) if !items.is_empty() => items,
        Some(Node::Sequence(_)) | None => return Err("no merges declared".to_string()),
        Some(node) if node.is_null() => return Err("no merges declared".to_string()),
        Some(other) => return Err(format!("merges must be a list, found {}", other.kind())),
    };

    items
        .iter()
        .map(|item| {
            let pair = match item {
                Node::Scalar(Scalar::String(text)) => split_pair(text),
                Node::Mapping(map) => match (
                    map.get("remote").and_then(Node::as_str),
                    map.get("ref").map(Node::render),
                ) {
                    (Some(remote), Some(reference)) if !reference.is_empty() => {
                        Some((remote.to_string(), reference))
                    }
                    _ => None,
                },
                _ => None,
            };
            pair.map(|(remote, reference)| MergeTarget { remote, reference })
                .ok_or_else(|| {
                    format!(
                        "invalid merge '{}', expected 'remote ref' or {{remote, ref}}",
                        item.render()
                    )
                })
        })
        .collect()
}

fn shell_commands(fields: &Mapping) -> std::result::Result<Vec<String>, String> {
    match fields.get("shell_command_after") {
        None => Ok(Vec::new()),
        Some(node) if node.is_null() => Ok(Vec::new()),
        Some(Node::Scalar(Scalar::String(command))) => Ok(vec![command.clone()]),
        Some(Node::Sequence(items)) => items
            .iter()
            .map(|item| {
                item.as_str()
                    .map(str::to_string)
                    .ok_or_else(|| format!("shell command must be a string, found {}", item.kind()))
            })
            .collect(),
        Some(other) => Err(format!(
            "shell_command_after must be a string or a list, found {}",
            other.kind()
        )),
    }
}

fn depth(entry: &Node) -> std::result::Result<Option<u64>, String> {
    match entry.get(&["defaults", "depth"]) {
        None => Ok(None),
        Some(node) if node.is_null() => Ok(None),
        Some(node) => match node.as_u64() {
            Some(depth) if depth > 0 => Ok(Some(depth)),
            _ => Err(format!(
                "defaults:depth must be a positive integer, found '{}'",
                node.render()
            )),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::from_yaml;

    fn yaml(src: &str) -> Node {
        from_yaml(serde_yaml::from_str(src).unwrap(), "test").unwrap()
    }

    fn plan(src: &str) -> Result<Vec<RepoSpec>> {
        RepoPlanner::new("/project").plan(&yaml(src))
    }

    const DEFAULTS: &str = "bootstrap:\n  repo:\n    remotes:\n      origin: https://example.com/odoo.git\n    merges: [origin 14.0]\n";

    #[test]
    fn test_plan_no_repos() {
        assert!(plan("odoo: {}\n").unwrap().is_empty());
        assert!(plan("repos: ~\n").unwrap().is_empty());
    }

    #[test]
    fn test_plan_applies_defaults() {
        let specs = plan(&format!("{}repos:\n  odoo: ~\n  oca/web: {{}}\n", DEFAULTS)).unwrap();
        assert_eq!(specs.len(), 2);

        let web = &specs[0];
        assert_eq!(web.key, "oca/web");
        assert_eq!(web.path, PathBuf::from("/project/oca/web"));
        assert_eq!(
            web.remotes,
            vec![Remote {
                name: "origin".to_string(),
                url: "https://example.com/odoo.git".to_string()
            }]
        );
        assert_eq!(
            web.merges,
            vec![MergeTarget {
                remote: "origin".to_string(),
                reference: "14.0".to_string()
            }]
        );
        assert_eq!(
            web.target,
            Target {
                remote: "origin".to_string(),
                branch: "14.0".to_string()
            }
        );
        assert_eq!(specs[1].key, "odoo");
    }

    #[test]
    fn test_plan_merges_are_replaced_not_concatenated() {
        let specs = plan(&format!(
            "{}repos:\n  b:\n    remotes:\n      oca: https://example.com/oca.git\n    merges: [oca 15.0, origin 15.0]\n    target: oca 15.0\n",
            DEFAULTS
        ))
        .unwrap();
        let b = &specs[0];
        assert_eq!(b.merges.len(), 2);
        assert_eq!(b.merges[0].remote, "oca");
        assert_eq!(b.remotes.len(), 2);
        assert!(b.remote("origin").is_some());
        assert_eq!(b.target.branch, "15.0");
    }

    #[test]
    fn test_plan_mapping_merge_entries() {
        let specs = plan(
            "repos:\n  x:\n    remotes: {origin: u}\n    merges:\n      - {remote: origin, ref: refs/pull/1/head}\n      - {remote: origin, ref: 14.0}\n",
        )
        .unwrap();
        assert_eq!(specs[0].merges[0].reference, "refs/pull/1/head");
        assert_eq!(specs[0].merges[1].reference, "14.0");
    }

    #[test]
    fn test_plan_shell_commands_and_options() {
        let specs = plan(
            "repos:\n  x:\n    remotes: {origin: u}\n    merges: [origin main]\n    shell_command_after: make\n    addon_path: x/addons\n    defaults: {depth: 5}\n  y:\n    remotes: {origin: u}\n    merges: [origin main]\n    shell_command_after: [a, b]\n",
        )
        .unwrap();
        assert_eq!(specs[0].shell_commands, vec!["make".to_string()]);
        assert_eq!(specs[0].addon_path.as_deref(), Some("x/addons"));
        assert_eq!(specs[0].depth, Some(5));
        assert_eq!(specs[1].shell_commands, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(specs[1].depth, None);
    }

    #[test]
    fn test_plan_missing_remotes() {
        let err = plan("repos:\n  x:\n    merges: [origin main]\n").unwrap_err();
        match err {
            Error::RepoConfig { repo, message } => {
                assert_eq!(repo, "x");
                assert!(message.contains("remotes"));
            }
            other => panic!("Expected RepoConfig, got {:?}", other),
        }
    }

    #[test]
    fn test_plan_missing_merges() {
        let err = plan("repos:\n  x:\n    remotes: {origin: u}\n    merges: []\n").unwrap_err();
        assert!(matches!(err, Error::RepoConfig { .. }));
    }

    #[test]
    fn test_plan_undeclared_remote() {
        let err = plan("repos:\n  x:\n    remotes: {origin: u}\n    merges: [oca main]\n").unwrap_err();
        assert!(err.to_string().contains("undeclared remote 'oca'"));
    }

    #[test]
    fn test_plan_malformed_merge() {
        let err = plan("repos:\n  x:\n    remotes: {origin: u}\n    merges: [origin]\n").unwrap_err();
        assert!(err.to_string().contains("invalid merge"));
    }

    #[test]
    fn test_plan_empty_url() {
        let err = plan("repos:\n  x:\n    remotes: {origin: ''}\n    merges: [origin main]\n").unwrap_err();
        assert!(err.to_string().contains("no url"));
    }

    #[test]
    fn test_plan_bad_target() {
        let err = plan("repos:\n  x:\n    remotes: {origin: u}\n    merges: [origin main]\n    target: origin\n").unwrap_err();
        assert!(err.to_string().contains("target"));
    }

    #[test]
    fn test_plan_bad_depth() {
        let err = plan("repos:\n  x:\n    remotes: {origin: u}\n    merges: [origin main]\n    defaults: {depth: 0}\n").unwrap_err();
        assert!(err.to_string().contains("depth"));
    }

    #[test]
    fn test_plan_repos_must_be_mapping() {
        let err = plan("repos: [a, b]\n").unwrap_err();
        assert!(matches!(err, Error::ConfigSyntax { .. }));
    }

    #[test]
    fn test_plan_paths_are_unique_and_normalized() {
        let specs = plan(&format!("{}repos:\n  ./a/../b: {{}}\n  c: {{}}\n", DEFAULTS)).unwrap();
        assert_eq!(specs[0].path, PathBuf::from("/project/b"));
        assert_eq!(specs[1].path, PathBuf::from("/project/c"));
    }
}
