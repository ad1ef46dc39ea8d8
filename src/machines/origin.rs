//! Effective-origin resolution.
//!
//! Every clone carries an `origin` back-pointer to the snapshot it was
//! created from; walking those pointers leads to the dataset the whole
//! lineage ultimately derives from. Triage needs that ultimate origin, not
//! the immediate one, to decide which machine a history state belongs to.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use crate::types::{Dataset, DatasetName};

/// Resolves the effective origin of each candidate dataset.
///
/// The returned map encodes three outcomes:
/// - value `None`: the dataset is itself a true root;
/// - value `Some(root)`: the dataset derives from `root` through its origin
///   chain;
/// - key absent: the dataset was filtered out, or its chain crossed a name
///   missing from `datasets` (unresolved).
///
/// When `mountpoint_filter` is non-empty, only datasets mounted there are
/// candidates; a snapshot is judged by its underlying dataset's mountpoint.
/// Each step of the walk normalizes snapshot names to their underlying
/// dataset before lookup, so a chain through a destroyed snapshot whose
/// parent dataset survives still resolves.
pub(crate) fn resolve_origins(
    datasets: &[Arc<Dataset>],
    mountpoint_filter: &str,
) -> BTreeMap<DatasetName, Option<DatasetName>> {
    let by_name: HashMap<&str, &Arc<Dataset>> = datasets
        .iter()
        .map(|d| (d.name.as_str(), d))
        .collect();

    let mut origins = BTreeMap::new();

    'candidates: for d in datasets {
        if !mountpoint_filter.is_empty() {
            let mountpoint = if d.is_snapshot {
                match by_name.get(d.name.dataset()) {
                    Some(underlying) => underlying.mountpoint.as_str(),
                    None => continue,
                }
            } else {
                d.mountpoint.as_str()
            };
            if mountpoint != mountpoint_filter {
                continue;
            }
        }

        let mut current = d.name.as_str();
        let mut visited = HashSet::new();
        let root = loop {
            // Normalize a snapshot reference to its underlying dataset.
            let base = match current.rfind('@') {
                Some(i) => &current[..i],
                None => current,
            };
            let Some(dataset) = by_name.get(base) else {
                // Chain crosses a name we don't know about.
                continue 'candidates;
            };
            if !visited.insert(base) {
                // Origin loop; treat as unresolved rather than spinning.
                continue 'candidates;
            }
            match &dataset.origin {
                None => break base,
                Some(origin) => current = origin.as_str(),
            }
        };

        let value = if root == d.name.as_str() {
            None
        } else {
            Some(DatasetName::new(root))
        };
        origins.insert(d.name.clone(), value);
    }

    origins
}
