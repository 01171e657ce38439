//! Property-based tests for tree merging and substitution.
//!
//! These tests use proptest to generate random configuration trees and verify
//! that the merge and substitution invariants hold for all of them.

#[cfg(test)]
mod proptest_tests {
    use crate::merge::{merge, OverridePolicy, MERGES_KEY};
    use crate::resolve::substitute;
    use crate::tree::{Mapping, Node};
    use proptest::prelude::*;
    use std::collections::BTreeSet;

    fn scalar() -> impl Strategy<Value = Node> {
        prop_oneof![
            Just(Node::null()),
            any::<bool>().prop_map(Node::from),
            any::<i64>().prop_map(Node::from),
            "[a-z0-9 ._/-]{0,12}".prop_map(Node::from),
        ]
    }

    /// Trees without placeholders. Keys include `merges` so the override
    /// policy gets exercised at every depth.
    fn tree() -> impl Strategy<Value = Node> {
        scalar().prop_recursive(3, 32, 4, |inner| {
            prop_oneof![
                prop::collection::vec(inner.clone(), 0..4).prop_map(Node::Sequence),
                prop::collection::btree_set("[a-z/]{1,6}", 0..4).prop_map(Node::Set),
                prop::collection::btree_map("[a-c]{1,2}|merges", inner, 0..4)
                    .prop_map(Node::Mapping),
            ]
        })
    }

    fn class(node: &Node) -> u8 {
        match node {
            Node::Scalar(_) => 0,
            Node::Sequence(_) => 1,
            Node::Set(_) => 2,
            Node::Mapping(_) => 3,
        }
    }

    fn with_merges(value: Node) -> Node {
        let mut map = Mapping::new();
        map.insert(MERGES_KEY.to_string(), value);
        Node::Mapping(map)
    }

    // ============================================================================
    // merge property tests
    // ============================================================================

    proptest! {
        /// Property: merging nodes of different kinds yields the right-hand node
        #[test]
        fn merge_kind_mismatch_is_right_biased(a in tree(), b in tree()) {
            prop_assume!(class(&a) != class(&b));
            prop_assert_eq!(merge(a, b.clone(), &OverridePolicy::repository()), b);
        }

        /// Property: a scalar on the right always wins
        #[test]
        fn merge_scalar_right_wins(a in tree(), b in scalar()) {
            prop_assert_eq!(merge(a, b.clone(), &OverridePolicy::default()), b);
        }

        /// Property: policy keys are replaced, never merged
        #[test]
        fn merge_policy_keys_replace(x in tree(), y in tree()) {
            let merged = merge(with_merges(x), with_merges(y.clone()), &OverridePolicy::repository());
            prop_assert_eq!(merged.get(&[MERGES_KEY]), Some(&y));
        }

        /// Property: mapping merge keeps the union of keys
        #[test]
        fn merge_mapping_keys_are_union(
            a in prop::collection::btree_map("[a-d]", scalar(), 0..5),
            b in prop::collection::btree_map("[a-d]", scalar(), 0..5),
        ) {
            let expected: BTreeSet<String> = a.keys().chain(b.keys()).cloned().collect();
            let merged = merge(Node::Mapping(a), Node::Mapping(b), &OverridePolicy::default());
            let keys: BTreeSet<String> = merged.as_mapping().unwrap().keys().cloned().collect();
            prop_assert_eq!(keys, expected);
        }

        /// Property: sequence merge concatenates with the left items first
        #[test]
        fn merge_sequences_concatenate(
            a in prop::collection::vec(scalar(), 0..5),
            b in prop::collection::vec(scalar(), 0..5),
        ) {
            let merged = merge(Node::Sequence(a.clone()), Node::Sequence(b.clone()), &OverridePolicy::default());
            let items = merged.as_sequence().unwrap().to_vec();
            prop_assert_eq!(items.len(), a.len() + b.len());
            prop_assert_eq!(&items[..a.len()], &a[..]);
            prop_assert_eq!(&items[a.len()..], &b[..]);
        }

        /// Property: an empty mapping is a neutral element for mapping merge
        #[test]
        fn merge_empty_mapping_is_neutral(
            m in prop::collection::btree_map("[a-d]", tree(), 0..4),
        ) {
            let policy = OverridePolicy::repository();
            let node = Node::Mapping(m);
            prop_assert_eq!(merge(node.clone(), Node::mapping(), &policy), node.clone());
            prop_assert_eq!(merge(Node::mapping(), node.clone(), &policy), node);
        }
    }

    // ============================================================================
    // substitution property tests
    // ============================================================================

    proptest! {
        /// Property: substitution leaves trees without placeholders unchanged
        #[test]
        fn substitute_without_placeholders_is_identity(node in tree()) {
            prop_assert_eq!(substitute(&node).unwrap(), node);
        }

        /// Property: a whole-string placeholder yields the referenced node
        #[test]
        fn substitute_whole_reference_copies_node(value in tree()) {
            let mut root = Node::mapping();
            root.set(&["src", "value"], value.clone());
            root.set(&["dst"], Node::from("${src:value}"));
            let out = substitute(&root).unwrap();
            prop_assert_eq!(out.get(&["dst"]), Some(&value));
        }

        /// Property: embedding a scalar splices its rendered text
        #[test]
        fn substitute_embedded_scalar_is_rendered(value in scalar(), prefix in "[a-z]{0,4}") {
            let mut root = Node::mapping();
            root.set(&["v"], value.clone());
            root.set(&["s"], Node::from(format!("{}${{v}}!", prefix)));
            let out = substitute(&root).unwrap();
            prop_assert_eq!(
                out.get(&["s"]),
                Some(&Node::from(format!("{}{}!", prefix, value.render())))
            );
        }
    }
}
