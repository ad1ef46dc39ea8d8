//! Topological dataset ordering.
//!
//! Assembly wants every ancestor before its descendants, and every snapshot
//! immediately after its parent dataset but before the parent's children.
//! Byte-wise comparison almost gives this (descendants share the ancestor's
//! prefix plus `/`), except that `@` sorts above `/` in ASCII; ranking `@`
//! below `/` restores the snapshot placement.

use std::cmp::Ordering;
use std::sync::Arc;

use crate::types::Dataset;

/// Compares two dataset names in topological order.
pub fn compare_names(a: &str, b: &str) -> Ordering {
    a.bytes().map(rank).cmp(b.bytes().map(rank))
}

fn rank(b: u8) -> u16 {
    match b {
        b'@' => 0,
        b'/' => 1,
        _ => u16::from(b) + 2,
    }
}

/// Sorts datasets so that parents precede their descendants.
pub fn sort_datasets(datasets: &mut [Arc<Dataset>]) {
    datasets.sort_by(|a, b| compare_names(a.name.as_str(), b.name.as_str()));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{arb_dataset_name, arb_name_segment, dataset};
    use proptest::prelude::*;

    fn sorted_names(names: &[&str]) -> Vec<String> {
        let mut datasets: Vec<Arc<Dataset>> =
            names.iter().map(|n| Arc::new(dataset(n))).collect();
        sort_datasets(&mut datasets);
        datasets
            .iter()
            .map(|d| d.name.as_str().to_string())
            .collect()
    }

    #[test]
    fn parents_precede_children() {
        assert_eq!(
            sorted_names(&["rpool/ROOT/ubuntu_abcd/var", "rpool/ROOT/ubuntu_abcd", "rpool/ROOT"]),
            vec!["rpool/ROOT", "rpool/ROOT/ubuntu_abcd", "rpool/ROOT/ubuntu_abcd/var"]
        );
    }

    #[test]
    fn snapshot_follows_parent_before_children() {
        assert_eq!(
            sorted_names(&[
                "rpool/ROOT/ubuntu_abcd/var",
                "rpool/ROOT/ubuntu_abcd@snap1",
                "rpool/ROOT/ubuntu_abcd",
            ]),
            vec![
                "rpool/ROOT/ubuntu_abcd",
                "rpool/ROOT/ubuntu_abcd@snap1",
                "rpool/ROOT/ubuntu_abcd/var",
            ]
        );
    }

    #[test]
    fn sibling_with_longer_segment_does_not_split_a_family() {
        // `ubuntu_abcdX` must not sort between `ubuntu_abcd` and its children.
        assert_eq!(
            sorted_names(&[
                "rpool/ROOT/ubuntu_abcdX",
                "rpool/ROOT/ubuntu_abcd/var",
                "rpool/ROOT/ubuntu_abcd",
            ]),
            vec![
                "rpool/ROOT/ubuntu_abcd",
                "rpool/ROOT/ubuntu_abcd/var",
                "rpool/ROOT/ubuntu_abcdX",
            ]
        );
    }

    proptest! {
        #[test]
        fn ancestor_precedes_descendant(
            name in arb_dataset_name(),
            child in arb_name_segment()
        ) {
            let descendant = format!("{name}/{child}");
            prop_assert_eq!(compare_names(name.as_str(), &descendant), Ordering::Less);
        }

        #[test]
        fn snapshot_between_parent_and_children(
            name in arb_dataset_name(),
            tag in "[a-z0-9]{1,8}",
            child in arb_name_segment()
        ) {
            let snapshot = format!("{name}@{tag}");
            let descendant = format!("{name}/{child}");
            prop_assert_eq!(compare_names(name.as_str(), &snapshot), Ordering::Less);
            prop_assert_eq!(compare_names(&snapshot, &descendant), Ordering::Less);
        }

        #[test]
        fn comparison_is_antisymmetric(a in "[a-z@/]{1,20}", b in "[a-z@/]{1,20}") {
            prop_assert_eq!(compare_names(&a, &b), compare_names(&b, &a).reverse());
        }
    }
}
