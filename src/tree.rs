//! # Configuration Tree
//!
//! The resolved configuration is held as a [`Node`]: an explicit tagged value
//! that is either a scalar, an ordered sequence, a set of strings, or a
//! string-keyed mapping. Every component of the pipeline consumes a tree and
//! produces a new one; nothing mutates a tree it did not build.
//!
//! Documents are read with `serde_yaml` and converted with [`from_yaml`]. YAML
//! has no set type, so [`Node::Set`] only ever appears as the result of the
//! addon-path accumulation step. When a tree is serialized back out, sets are
//! written as sequences.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Serialize, Serializer};
use serde_yaml::{Number, Value as YamlValue};

use crate::error::{Error, Result};

/// String-keyed mapping. Keys are kept sorted, so iteration is deterministic.
pub type Mapping = BTreeMap<String, Node>;

/// A leaf value.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Null,
    Bool(bool),
    Number(Number),
    String(String),
}

/// A configuration tree node.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Scalar(Scalar),
    Sequence(Vec<Node>),
    Set(BTreeSet<String>),
    Mapping(Mapping),
}

impl Node {
    pub fn null() -> Self {
        Node::Scalar(Scalar::Null)
    }

    /// An empty mapping, the root of an empty document.
    pub fn mapping() -> Self {
        Node::Mapping(Mapping::new())
    }

    /// Human-readable name of the node kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Node::Scalar(Scalar::Null) => "null",
            Node::Scalar(Scalar::Bool(_)) => "boolean",
            Node::Scalar(Scalar::Number(_)) => "number",
            Node::Scalar(Scalar::String(_)) => "string",
            Node::Sequence(_) => "sequence",
            Node::Set(_) => "set",
            Node::Mapping(_) => "mapping",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Node::Scalar(Scalar::Null))
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Node::Scalar(Scalar::String(s)) => Some(s),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Node::Scalar(Scalar::Number(n)) => n.as_u64(),
            _ => None,
        }
    }

    pub fn as_mapping(&self) -> Option<&Mapping> {
        match self {
            Node::Mapping(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_sequence(&self) -> Option<&[Node]> {
        match self {
            Node::Sequence(items) => Some(items),
            _ => None,
        }
    }

    /// Walk a key path from this node. Only mappings can be descended into.
    pub fn get<S: AsRef<str>>(&self, path: &[S]) -> Option<&Node> {
        path.iter().try_fold(self, |node, key| match node {
            Node::Mapping(map) => map.get(key.as_ref()),
            _ => None,
        })
    }

    /// Mutable variant of [`Node::get`].
    pub fn get_mut<S: AsRef<str>>(&mut self, path: &[S]) -> Option<&mut Node> {
        path.iter().try_fold(self, |node, key| match node {
            Node::Mapping(map) => map.get_mut(key.as_ref()),
            _ => None,
        })
    }

    /// Store `value` at `path`.
    ///
    /// Missing intermediate nodes are created as mappings, and intermediate
    /// nodes of any other kind are replaced by mappings. An empty path
    /// replaces the node itself.
    pub fn set<S: AsRef<str>>(&mut self, path: &[S], value: Node) {
        let Some((last, parents)) = path.split_last() else {
            *self = value;
            return;
        };

        let mut current = self;
        for key in parents {
            current = current
                .ensure_mapping()
                .entry(key.as_ref().to_string())
                .or_insert_with(Node::mapping);
        }
        current
            .ensure_mapping()
            .insert(last.as_ref().to_string(), value);
    }

    fn ensure_mapping(&mut self) -> &mut Mapping {
        if !matches!(self, Node::Mapping(_)) {
            *self = Node::mapping();
        }
        match self {
            Node::Mapping(map) => map,
            _ => unreachable!("node was just replaced by a mapping"),
        }
    }

    /// Render the node as configuration text.
    ///
    /// Booleans render as `True`/`False`, null as the empty string, and
    /// sequences and sets are joined with commas. Mappings are rendered as
    /// compact JSON.
    pub fn render(&self) -> String {
        match self {
            Node::Scalar(scalar) => scalar.to_string(),
            Node::Sequence(items) => items
                .iter()
                .map(Node::render)
                .collect::<Vec<_>>()
                .join(","),
            Node::Set(items) => items.iter().cloned().collect::<Vec<_>>().join(","),
            Node::Mapping(_) => serde_json::to_string(self).unwrap_or_default(),
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Null => Ok(()),
            Scalar::Bool(true) => f.write_str("True"),
            Scalar::Bool(false) => f.write_str("False"),
            Scalar::Number(n) => write!(f, "{}", n),
            Scalar::String(s) => f.write_str(s),
        }
    }
}

impl From<&str> for Node {
    fn from(value: &str) -> Self {
        Node::Scalar(Scalar::String(value.to_string()))
    }
}

impl From<String> for Node {
    fn from(value: String) -> Self {
        Node::Scalar(Scalar::String(value))
    }
}

impl From<bool> for Node {
    fn from(value: bool) -> Self {
        Node::Scalar(Scalar::Bool(value))
    }
}

impl From<i64> for Node {
    fn from(value: i64) -> Self {
        Node::Scalar(Scalar::Number(Number::from(value)))
    }
}

impl From<Vec<Node>> for Node {
    fn from(value: Vec<Node>) -> Self {
        Node::Sequence(value)
    }
}

impl From<Mapping> for Node {
    fn from(value: Mapping) -> Self {
        Node::Mapping(value)
    }
}

impl Serialize for Scalar {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Scalar::Null => serializer.serialize_unit(),
            Scalar::Bool(b) => serializer.serialize_bool(*b),
            Scalar::Number(n) => n.serialize(serializer),
            Scalar::String(s) => serializer.serialize_str(s),
        }
    }
}

impl Serialize for Node {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Node::Scalar(scalar) => scalar.serialize(serializer),
            Node::Sequence(items) => items.serialize(serializer),
            Node::Set(items) => items.serialize(serializer),
            Node::Mapping(map) => map.serialize(serializer),
        }
    }
}

/// Convert a parsed YAML value into a [`Node`].
///
/// Scalar mapping keys are converted to their string form; a sequence or
/// mapping used as a key is a syntax error. YAML tags are dropped. `origin`
/// names the document in error messages.
pub fn from_yaml(value: YamlValue, origin: &str) -> Result<Node> {
    Ok(match value {
        YamlValue::Null => Node::null(),
        YamlValue::Bool(b) => Node::Scalar(Scalar::Bool(b)),
        YamlValue::Number(n) => Node::Scalar(Scalar::Number(n)),
        YamlValue::String(s) => Node::Scalar(Scalar::String(s)),
        YamlValue::Sequence(items) => Node::Sequence(
            items
                .into_iter()
                .map(|item| from_yaml(item, origin))
                .collect::<Result<_>>()?,
        ),
        YamlValue::Mapping(map) => {
            let mut out = Mapping::new();
            for (key, value) in map {
                out.insert(mapping_key(key, origin)?, from_yaml(value, origin)?);
            }
            Node::Mapping(out)
        }
        YamlValue::Tagged(tagged) => from_yaml(tagged.value, origin)?,
    })
}

fn mapping_key(key: YamlValue, origin: &str) -> Result<String> {
    match key {
        YamlValue::String(s) => Ok(s),
        YamlValue::Number(n) => Ok(n.to_string()),
        YamlValue::Bool(b) => Ok(b.to_string()),
        YamlValue::Null => Ok("null".to_string()),
        YamlValue::Tagged(tagged) => mapping_key(tagged.value, origin),
        other => Err(Error::ConfigSyntax {
            message: format!(
                "{}: mapping keys must be scalars, found {}",
                origin,
                if other.is_sequence() {
                    "a sequence"
                } else {
                    "a mapping"
                }
            ),
            hint: None,
        }),
    }
}
