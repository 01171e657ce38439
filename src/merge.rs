//! Deep merge of configuration trees
//!
//! [`merge`] combines two trees with the right-hand side taking precedence:
//!
//! - Mapping × Mapping: key-wise union, shared keys merged recursively unless
//!   the key is listed in the [`OverridePolicy`], in which case the right value
//!   replaces the left one wholesale.
//! - Sequence × Sequence: concatenation, left items first.
//! - Set × Set: union.
//! - Anything else, including a kind mismatch: the right value.
//!
//! Merge is not commutative.

use std::collections::BTreeSet;

use crate::tree::Node;

/// Key under which a repository lists its merge targets.
pub const MERGES_KEY: &str = "merges";

/// Mapping keys whose values replace instead of merging.
///
/// The policy is checked against the immediate child key name at every
/// mapping level of the merge.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OverridePolicy {
    keys: BTreeSet<String>,
}

impl OverridePolicy {
    pub fn new<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            keys: keys.into_iter().map(Into::into).collect(),
        }
    }

    /// The policy used for configuration documents and repository defaults:
    /// a repository's merge-target list is always taken from the most
    /// specific layer.
    pub fn repository() -> Self {
        Self::new([MERGES_KEY])
    }

    pub fn replaces(&self, key: &str) -> bool {
        self.keys.contains(key)
    }
}

/// Merge `b` on top of `a`.
pub fn merge(a: Node, b: Node, policy: &OverridePolicy) -> Node {
    match (a, b) {
        (Node::Mapping(mut left), Node::Mapping(right)) => {
            for (key, value) in right {
                let merged = match left.remove(&key) {
                    Some(existing) if !policy.replaces(&key) => merge(existing, value, policy),
                    _ => value,
                };
                left.insert(key, merged);
            }
            Node::Mapping(left)
        }
        (Node::Sequence(mut left), Node::Sequence(right)) => {
            left.extend(right);
            Node::Sequence(left)
        }
        (Node::Set(mut left), Node::Set(right)) => {
            left.extend(right);
            Node::Set(left)
        }
        (_, right) => right,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::from_yaml;

    fn yaml(src: &str) -> Node {
        from_yaml(serde_yaml::from_str(src).unwrap(), "test").unwrap()
    }

    fn set(items: &[&str]) -> Node {
        Node::Set(items.iter().map(|s| s.to_string()).collect())
    }

    #[test]
    fn test_merge_mappings_union_and_recurse() {
        let a = yaml("odoo:\n  version: '14.0'\n  options:\n    workers: 2\n");
        let b = yaml("odoo:\n  options:\n    db_name: prod\n");
        let merged = merge(a, b, &OverridePolicy::default());

        assert_eq!(merged.get(&["odoo", "version"]), Some(&Node::from("14.0")));
        assert_eq!(
            merged.get(&["odoo", "options", "workers"]),
            Some(&Node::from(2))
        );
        assert_eq!(
            merged.get(&["odoo", "options", "db_name"]),
            Some(&Node::from("prod"))
        );
    }

    #[test]
    fn test_merge_right_scalar_wins() {
        let merged = merge(yaml("a: 1\n"), yaml("a: 2\n"), &OverridePolicy::default());
        assert_eq!(merged, yaml("a: 2\n"));
    }

    #[test]
    fn test_merge_sequences_concatenate() {
        let merged = merge(
            yaml("[a, b]"),
            yaml("[b, c]"),
            &OverridePolicy::default(),
        );
        assert_eq!(merged, yaml("[a, b, b, c]"));
    }

    #[test]
    fn test_merge_sets_union() {
        let merged = merge(set(&["/a", "/b"]), set(&["/b", "/c"]), &OverridePolicy::default());
        assert_eq!(merged, set(&["/a", "/b", "/c"]));
    }

    #[test]
    fn test_merge_kind_mismatch_takes_right() {
        let policy = OverridePolicy::default();
        assert_eq!(merge(yaml("[a]"), yaml("x: 1"), &policy), yaml("x: 1"));
        assert_eq!(merge(yaml("x: 1"), yaml("[a]"), &policy), yaml("[a]"));
        assert_eq!(merge(set(&["a"]), yaml("[a]"), &policy), yaml("[a]"));
        assert_eq!(merge(yaml("[a]"), Node::null(), &policy), Node::null());
    }

    #[test]
    fn test_merge_is_not_commutative() {
        let policy = OverridePolicy::default();
        let a = yaml("[1]");
        let b = yaml("[2]");
        assert_ne!(
            merge(a.clone(), b.clone(), &policy),
            merge(b, a, &policy)
        );
    }

    #[test]
    fn test_override_policy_replaces_merges() {
        let a = yaml("repos:\n  b:\n    merges: [origin 13.0, oca 13.0]\n    target: origin 13.0\n");
        let b = yaml("repos:\n  b:\n    merges: [origin 14.0]\n");
        let merged = merge(a, b, &OverridePolicy::repository());

        assert_eq!(
            merged.get(&["repos", "b", "merges"]),
            Some(&yaml("[origin 14.0]"))
        );
        assert_eq!(
            merged.get(&["repos", "b", "target"]),
            Some(&Node::from("origin 13.0"))
        );
    }

    #[test]
    fn test_override_policy_replaces_nested_mappings_too() {
        let policy = OverridePolicy::new(["remotes"]);
        let a = yaml("remotes:\n  origin: a\n  oca: b\n");
        let b = yaml("remotes:\n  origin: c\n");
        let merged = merge(a, b, &policy);
        assert_eq!(merged, yaml("remotes:\n  origin: c\n"));
    }

    #[test]
    fn test_override_policy_keys_without_policy_concatenate() {
        let a = yaml("merges: [origin 13.0]");
        let b = yaml("merges: [origin 14.0]");
        let merged = merge(a, b, &OverridePolicy::default());
        assert_eq!(merged, yaml("merges: [origin 13.0, origin 14.0]"));
    }
}
