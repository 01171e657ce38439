//! # Variable Resolution
//!
//! [`VariableResolver::resolve`] turns a merged configuration tree into the
//! final tree in three steps:
//!
//! 1. **Environment overlay.** A fixed set of process variables is written
//!    into the tree (see [`ENVIRONMENT`]), then every key under
//!    `odoo:options` is replaced by `ODOO_<KEY>` when that variable is set.
//!    Empty variables count as unset.
//! 2. **Substitution.** Every string in the tree is scanned for `${a:b:c}`
//!    placeholders. A string that is exactly one placeholder becomes the
//!    referenced node, whatever its kind. Otherwise each placeholder is
//!    rendered to text and spliced in.
//! 3. **Addon paths.** `odoo:addons_path` and the addon path of every
//!    repository (its `addon_path`, or its key) are made absolute and stored
//!    as a set under `odoo:options:addons_path`.
//!
//! Placeholders are looked up in the overlaid tree and the referenced node is
//! substituted before it is used, so the result does not depend on where the
//! reference sits relative to its target. A chain of placeholders that loops
//! back on itself is an error.

use std::collections::{BTreeSet, HashMap};
use std::path::PathBuf;

use log::debug;
use regex::Regex;

use crate::error::{Error, Result};
use crate::path::absolutize;
use crate::tree::{Node, Scalar};

/// Process variables that overlay fixed configuration paths.
pub const ENVIRONMENT: [(&str, [&str; 2]); 2] = [
    ("ODOO_VERSION", ["odoo", "version"]),
    ("BOOTSTRAP_MODE", ["bootstrap", "mode"]),
];

/// Prefix of the per-option override variables.
pub const OPTION_PREFIX: &str = "ODOO";

const PLACEHOLDER: &str = r"\$\{(?P<var>[\w:]+)\}";

/// Snapshot of the process environment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvVars {
    vars: HashMap<String, String>,
}

impl EnvVars {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_process() -> Self {
        std::env::vars().collect()
    }

    /// Value of `name`, or `None` if unset or empty.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.vars
            .get(name)
            .map(String::as_str)
            .filter(|value| !value.is_empty())
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.vars.insert(name.into(), value.into());
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for EnvVars {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            vars: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// Walk a colon-delimited reference such as `odoo:version`.
pub fn lookup<'t>(tree: &'t Node, reference: &str) -> Option<&'t Node> {
    tree.get(&reference.split(':').collect::<Vec<_>>())
}

/// Substitute every placeholder in `tree`.
pub fn substitute(tree: &Node) -> Result<Node> {
    Substitution::new(tree)?.node(tree)
}

struct Substitution<'a> {
    source: &'a Node,
    pattern: Regex,
    resolved: HashMap<String, Node>,
    active: Vec<String>,
}

impl<'a> Substitution<'a> {
    fn new(source: &'a Node) -> Result<Self> {
        Ok(Self {
            source,
            pattern: Regex::new(PLACEHOLDER).map_err(Error::Regex)?,
            resolved: HashMap::new(),
            active: Vec::new(),
        })
    }

    fn node(&mut self, node: &Node) -> Result<Node> {
        Ok(match node {
            Node::Scalar(Scalar::String(text)) => self.text(text)?,
            Node::Sequence(items) => Node::Sequence(
                items
                    .iter()
                    .map(|item| self.node(item))
                    .collect::<Result<_>>()?,
            ),
            Node::Mapping(map) => {
                let mut out = map.clone();
                for value in out.values_mut() {
                    *value = self.node(value)?;
                }
                Node::Mapping(out)
            }
            other => other.clone(),
        })
    }

    fn text(&mut self, text: &str) -> Result<Node> {
        let whole = self
            .pattern
            .captures(text)
            .filter(|caps| caps.get(0).map(|m| m.as_str().len()) == Some(text.len()))
            .and_then(|caps| caps.name("var").map(|m| m.as_str().to_string()));
        if let Some(reference) = whole {
            return self.reference(&reference);
        }

        let references: Vec<(std::ops::Range<usize>, String)> = self
            .pattern
            .captures_iter(text)
            .filter_map(|caps| {
                let range = caps.get(0)?.range();
                Some((range, caps.name("var")?.as_str().to_string()))
            })
            .collect();
        if references.is_empty() {
            return Ok(Node::from(text));
        }

        let mut out = String::with_capacity(text.len());
        let mut last = 0;
        for (range, reference) in references {
            out.push_str(&text[last..range.start]);
            match self.reference(&reference)? {
                Node::Mapping(_) => {
                    return Err(Error::ConfigResolution {
                        variable: reference,
                        message: "a mapping cannot be embedded in text".to_string(),
                    })
                }
                value => out.push_str(&value.render()),
            }
            last = range.end;
        }
        out.push_str(&text[last..]);
        Ok(Node::from(out))
    }

    fn reference(&mut self, reference: &str) -> Result<Node> {
        if let Some(done) = self.resolved.get(reference) {
            return Ok(done.clone());
        }
        if self.active.iter().any(|r| r == reference) {
            let chain = self
                .active
                .iter()
                .map(String::as_str)
                .chain(std::iter::once(reference))
                .collect::<Vec<_>>()
                .join(" -> ");
            return Err(Error::ConfigResolution {
                variable: reference.to_string(),
                message: format!("circular reference: {}", chain),
            });
        }

        let source = self.source;
        let target = lookup(source, reference).ok_or_else(|| Error::ConfigResolution {
            variable: reference.to_string(),
            message: "referenced path does not exist".to_string(),
        })?;

        self.active.push(reference.to_string());
        let value = self.node(target);
        self.active.pop();

        let value = value?;
        debug!("${{{}}} -> {}", reference, value.render());
        self.resolved.insert(reference.to_string(), value.clone());
        Ok(value)
    }
}

/// Applies the environment overlay, substitution and addon-path accumulation.
#[derive(Debug, Clone)]
pub struct VariableResolver {
    env: EnvVars,
    root: PathBuf,
}

impl VariableResolver {
    /// `root` is the base for relative addon paths.
    pub fn new(env: EnvVars, root: impl Into<PathBuf>) -> Self {
        Self {
            env,
            root: root.into(),
        }
    }

    pub fn resolve(&self, tree: Node) -> Result<Node> {
        let overlaid = self.overlay(tree);
        let substituted = substitute(&overlaid)?;
        self.accumulate_addons(substituted)
    }

    /// Write environment values into the tree.
    pub fn overlay(&self, mut tree: Node) -> Node {
        for (name, path) in ENVIRONMENT {
            if let Some(value) = self.env.get(name) {
                debug!("{} overrides {}", name, path.join(":"));
                tree.set(&path, Node::from(value));
            }
        }

        if let Some(Node::Mapping(options)) = tree.get_mut(&["odoo", "options"]) {
            for (key, value) in options.iter_mut() {
                let name = format!("{}_{}", OPTION_PREFIX, key.to_uppercase());
                if let Some(env) = self.env.get(&name) {
                    debug!("{} overrides odoo:options:{}", name, key);
                    *value = Node::from(env);
                }
            }
        }
        tree
    }

    /// Collect the absolute addon paths into `odoo:options:addons_path`.
    pub fn accumulate_addons(&self, mut tree: Node) -> Result<Node> {
        let mut paths: Vec<String> = match tree.get(&["odoo", "addons_path"]) {
            None => Vec::new(),
            Some(node) => addon_paths(node)?,
        };

        if let Some(repos) = tree.get(&["repos"]).and_then(Node::as_mapping) {
            for (key, entry) in repos {
                let path = entry
                    .get(&["addon_path"])
                    .and_then(Node::as_str)
                    .unwrap_or(key);
                paths.push(path.to_string());
            }
        }

        let absolute: BTreeSet<String> = paths
            .iter()
            .map(|p| absolutize(&self.root, p).display().to_string())
            .collect();
        tree.set(&["odoo", "options", "addons_path"], Node::Set(absolute));
        Ok(tree)
    }
}

fn addon_paths(node: &Node) -> Result<Vec<String>> {
    match node {
        Node::Scalar(Scalar::Null) => Ok(Vec::new()),
        Node::Scalar(_) => Ok(vec![node.render()]),
        Node::Set(items) => Ok(items.iter().cloned().collect()),
        Node::Sequence(items) => items
            .iter()
            .map(|item| match item {
                Node::Scalar(_) => Ok(item.render()),
                other => Err(addons_path_error(other)),
            })
            .collect(),
        Node::Mapping(_) => Err(addons_path_error(node)),
    }
}

fn addons_path_error(found: &Node) -> Error {
    Error::ConfigSyntax {
        message: format!(
            "odoo:addons_path must be a list of paths, found {}",
            found.kind()
        ),
        hint: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::from_yaml;

    fn yaml(src: &str) -> Node {
        from_yaml(serde_yaml::from_str(src).unwrap(), "test").unwrap()
    }

    fn resolver(vars: &[(&str, &str)]) -> VariableResolver {
        VariableResolver::new(vars.iter().copied().collect(), "/project")
    }

    fn set(items: &[&str]) -> Node {
        Node::Set(items.iter().map(|s| s.to_string()).collect())
    }

    #[test]
    fn test_env_vars_empty_is_unset() {
        let env: EnvVars = [("A", ""), ("B", "x")].into_iter().collect();
        assert_eq!(env.get("A"), None);
        assert_eq!(env.get("B"), Some("x"));
        assert_eq!(env.get("C"), None);
    }

    #[test]
    fn test_lookup() {
        let tree = yaml("odoo:\n  version: '15.0'\n");
        assert_eq!(lookup(&tree, "odoo:version"), Some(&Node::from("15.0")));
        assert_eq!(lookup(&tree, "odoo:missing"), None);
        assert_eq!(lookup(&tree, "odoo:version:deeper"), None);
    }

    #[test]
    fn test_substitute_embedded() {
        let tree = yaml("bootstrap:\n  mode: dev\nodoo:\n  options:\n    db_name: ${bootstrap:mode}_db\n");
        let out = substitute(&tree).unwrap();
        assert_eq!(
            out.get(&["odoo", "options", "db_name"]),
            Some(&Node::from("dev_db"))
        );
    }

    #[test]
    fn test_substitute_whole_string_keeps_node_kind() {
        let tree = yaml("a:\n  list: [x, y]\n  port: 8069\nb: ${a:list}\nc: ${a:port}\n");
        let out = substitute(&tree).unwrap();
        assert_eq!(out.get(&["b"]), Some(&yaml("[x, y]")));
        assert_eq!(out.get(&["c"]), Some(&Node::from(8069)));
    }

    #[test]
    fn test_substitute_multiple_placeholders() {
        let tree = yaml("a: 1\nb: two\nc: ${a}-${b}-${a}\n");
        let out = substitute(&tree).unwrap();
        assert_eq!(out.get(&["c"]), Some(&Node::from("1-two-1")));
    }

    #[test]
    fn test_substitute_embedded_rendering() {
        let tree = yaml("flag: true\nlist: [a, b]\nnothing: ~\ns: '${flag}|${list}|${nothing}|'\n");
        let out = substitute(&tree).unwrap();
        assert_eq!(out.get(&["s"]), Some(&Node::from("True|a,b||")));
    }

    #[test]
    fn test_substitute_whole_null() {
        let tree = yaml("nothing: ~\ns: ${nothing}\n");
        let out = substitute(&tree).unwrap();
        assert_eq!(out.get(&["s"]), Some(&Node::null()));
    }

    #[test]
    fn test_substitute_embedded_mapping_is_error() {
        let tree = yaml("m: {k: v}\ns: prefix ${m}\n");
        let err = substitute(&tree).unwrap_err();
        assert!(matches!(err, Error::ConfigResolution { .. }));
    }

    #[test]
    fn test_substitute_missing_reference() {
        let tree = yaml("s: ${odoo:nope}\n");
        match substitute(&tree).unwrap_err() {
            Error::ConfigResolution { variable, .. } => assert_eq!(variable, "odoo:nope"),
            other => panic!("Expected ConfigResolution, got {:?}", other),
        }
    }

    #[test]
    fn test_substitute_forward_and_nested_references() {
        let tree = yaml("a: ${b}/x\nb: ${c}\nc: root\nlist: ['${a}', plain]\n");
        let out = substitute(&tree).unwrap();
        assert_eq!(out.get(&["a"]), Some(&Node::from("root/x")));
        assert_eq!(out.get(&["b"]), Some(&Node::from("root")));
        assert_eq!(out.get(&["list"]), Some(&yaml("[root/x, plain]")));
    }

    #[test]
    fn test_substitute_reference_to_subtree_is_substituted() {
        let tree = yaml("base:\n  name: ${who}\nwho: me\ncopy: ${base}\n");
        let out = substitute(&tree).unwrap();
        assert_eq!(out.get(&["copy", "name"]), Some(&Node::from("me")));
    }

    #[test]
    fn test_substitute_circular_reference() {
        let tree = yaml("a: ${b}\nb: x${a}\n");
        let err = substitute(&tree).unwrap_err();
        assert!(matches!(err, Error::ConfigResolution { .. }));
        assert!(err.to_string().contains("circular"));
    }

    #[test]
    fn test_substitute_without_placeholders_is_identity() {
        let tree = yaml("a: {b: [1, two, {c: true}]}\nd: ~\ne: '$notaplaceholder {x}'\n");
        assert_eq!(substitute(&tree).unwrap(), tree);
    }

    #[test]
    fn test_overlay_fixed_variables() {
        let tree = yaml("odoo:\n  version: '14.0'\n");
        let out = resolver(&[("ODOO_VERSION", "16.0"), ("BOOTSTRAP_MODE", "prod")]).overlay(tree);
        assert_eq!(out.get(&["odoo", "version"]), Some(&Node::from("16.0")));
        assert_eq!(out.get(&["bootstrap", "mode"]), Some(&Node::from("prod")));
    }

    #[test]
    fn test_overlay_options_with_fallback() {
        let tree = yaml("odoo:\n  options:\n    db_name: doc\n    workers: 2\n");
        let out = resolver(&[("ODOO_DB_NAME", "env"), ("ODOO_WORKERS", "")]).overlay(tree);
        assert_eq!(
            out.get(&["odoo", "options", "db_name"]),
            Some(&Node::from("env"))
        );
        assert_eq!(out.get(&["odoo", "options", "workers"]), Some(&Node::from(2)));
    }

    #[test]
    fn test_overlay_only_touches_declared_options() {
        let tree = yaml("odoo:\n  options: {}\n");
        let out = resolver(&[("ODOO_DB_HOST", "db")]).overlay(tree.clone());
        assert_eq!(out, tree);
    }

    #[test]
    fn test_overlay_feeds_substitution() {
        let tree = yaml("bootstrap:\n  mode: dev\nodoo:\n  options:\n    db_name: ${bootstrap:mode}_db\n");
        let out = resolver(&[("BOOTSTRAP_MODE", "staging")]).resolve(tree).unwrap();
        assert_eq!(
            out.get(&["odoo", "options", "db_name"]),
            Some(&Node::from("staging_db"))
        );
    }

    #[test]
    fn test_accumulate_addons() {
        let tree = yaml(
            "odoo:\n  addons_path: [/opt/extra, ./local]\nrepos:\n  odoo:\n    addon_path: odoo/addons\n  oca/web: {}\n",
        );
        let out = resolver(&[]).resolve(tree).unwrap();
        assert_eq!(
            out.get(&["odoo", "options", "addons_path"]),
            Some(&set(&[
                "/opt/extra",
                "/project/local",
                "/project/oca/web",
                "/project/odoo/addons",
            ]))
        );
    }

    #[test]
    fn test_accumulate_addons_deduplicates() {
        let tree = yaml("odoo:\n  addons_path: [web, ./web]\nrepos:\n  web: {}\n");
        let out = resolver(&[]).resolve(tree).unwrap();
        assert_eq!(
            out.get(&["odoo", "options", "addons_path"]),
            Some(&set(&["/project/web"]))
        );
    }

    #[test]
    fn test_accumulate_addons_empty() {
        let out = resolver(&[]).resolve(Node::mapping()).unwrap();
        assert_eq!(out.get(&["odoo", "options", "addons_path"]), Some(&set(&[])));
    }

    #[test]
    fn test_accumulate_addons_rejects_mapping() {
        let tree = yaml("odoo:\n  addons_path: {a: b}\n");
        assert!(resolver(&[]).resolve(tree).is_err());
    }
}
