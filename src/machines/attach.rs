//! Boot, user and persistent dataset attachment.
//!
//! Runs after triage, once every machine and history state exists. Boot
//! datasets bind by name suffix (they may live on another pool), user
//! datasets bind through their `bootfs_datasets` tag and origin kinship,
//! and persistent datasets are shared by every machine verbatim.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::types::{Dataset, DatasetName};

use super::{Machine, State, UserState};

/// A root user dataset with its resolved effective origin and descendants.
#[derive(Debug, Clone)]
pub(crate) struct UserGroup {
    pub root: Arc<Dataset>,
    /// Effective origin; `None` when the root has none (or it couldn't be
    /// resolved, which leaves the group matchable only through its own tag).
    pub origin: Option<DatasetName>,
    pub children: Vec<Arc<Dataset>>,
}

/// Groups user datasets under their root: the datasets with no parent
/// inside the bucket.
///
/// `userdatas` must be in topological order so every root is seen before
/// its descendants. Snapshots of a root are roots of their own group.
pub(crate) fn root_user_groups(
    userdatas: &[Arc<Dataset>],
) -> Vec<(Arc<Dataset>, Vec<Arc<Dataset>>)> {
    let mut groups: Vec<(Arc<Dataset>, Vec<Arc<Dataset>>)> = Vec::new();

    'datasets: for d in userdatas {
        for (root, children) in groups.iter_mut() {
            if d.name
                .as_str()
                .starts_with(&format!("{}/", root.name.as_str()))
            {
                children.push(Arc::clone(d));
                continue 'datasets;
            }
        }
        groups.push((Arc::clone(d), Vec::new()));
    }

    groups
}

/// Whether the dataset's `bootfs_datasets` tag links it to `state_id`.
///
/// The prefix test runs against the raw colon-joined string, not against
/// each element.
pub(crate) fn bootfs_matches(d: &Dataset, state_id: &str) -> bool {
    let raw_prefix = format!("{state_id}/");
    d.bootfs_datasets
        .split(':')
        .any(|tag| tag == state_id || d.bootfs_datasets.starts_with(&raw_prefix))
}

/// Attaches boot, user and persistent datasets to the machine's current
/// state, then to each of its history states.
pub(crate) fn attach_remaining(
    m: &mut Machine,
    boots: &[Arc<Dataset>],
    persistents: &[Arc<Dataset>],
    user_groups: &[UserGroup],
) {
    // The main state dataset id is the last segment of the machine id.
    let machine_dataset_id = m.state.id.base();

    // Boot datasets matching the base dataset name or a subdataset of it.
    for d in boots {
        if d.is_snapshot {
            continue;
        }
        if d.name
            .as_str()
            .ends_with(&format!("/{machine_dataset_id}"))
            || d.name
                .as_str()
                .contains(&format!("/{machine_dataset_id}/"))
        {
            m.state.system_datasets.push(Arc::clone(d));
        }
    }

    // User datasets bind through their tag, not the machine id in their
    // name: the same user dataset can be linked to multiple clones.
    let machine_user_roots: Vec<&UserGroup> = user_groups
        .iter()
        .filter(|g| !g.root.is_snapshot)
        .filter(|g| bootfs_matches(&g.root, m.state.id.as_str()))
        .collect();

    // Build the whole per-user state history for this machine.
    for g in user_groups {
        // Only user groups related to one of this machine's user roots.
        let relative = machine_user_roots.iter().any(|ur| {
            g.root.name == ur.root.name
                || (g.origin.is_some() && g.origin == ur.origin)
                || (ur.origin.is_none() && g.origin.as_ref() == Some(&ur.root.name))
                || (g.origin.is_none() && ur.origin.as_ref() == Some(&g.root.name))
        });
        if !relative {
            continue;
        }

        let base = g.root.name.base();
        let user = match base.rsplit_once('_') {
            Some((user, _)) => user,
            None => base,
        };

        let is_current = machine_user_roots
            .iter()
            .any(|ur| ur.root.name == g.root.name);
        let slot = if is_current {
            "current".to_string()
        } else {
            g.root.last_used.to_string()
        };

        let states = m.users.entry(user.to_string()).or_default();
        if !states.contains_key(&slot) {
            let delimiter = if g.root.is_snapshot { '@' } else { '_' };
            let id = match base.rsplit_once(delimiter) {
                Some((_, id)) => id.to_string(),
                None => String::new(),
            };
            let mut datasets = vec![Arc::clone(&g.root)];
            datasets.extend(g.children.iter().cloned());
            states.insert(slot, UserState { id, datasets });
        }
    }

    // Promote the current slot of each user to the machine's user datasets.
    for states in m.users.values() {
        let Some(current) = states.get("current") else {
            continue;
        };
        for d in &current.datasets {
            if bootfs_matches(d, m.state.id.as_str()) {
                m.state.user_datasets.push(Arc::clone(d));
            }
        }
    }

    m.state.persistent_datasets = persistents.to_vec();

    for h in m.history.values_mut() {
        attach_history(h, boots, persistents, &m.users);
    }

    // The assembled history no longer needs the per-user states; the
    // current-slot result lives in user_datasets.
    m.users.clear();
}

/// Attaches boot, user and persistent datasets to one history state.
///
/// Similar to the current-state attachment, with particular rules for
/// snapshot states.
fn attach_history(
    h: &mut State,
    boots: &[Arc<Dataset>],
    persistents: &[Arc<Dataset>],
    users: &BTreeMap<String, BTreeMap<String, UserState>>,
) {
    // The id may carry an @tag which suffix tests must account for.
    let state_dataset_id = h.id.base();
    let snapshot = match state_dataset_id.rfind('@') {
        Some(j) if j > 0 => Some(&state_dataset_id[j + 1..]),
        _ => None,
    };

    for d in boots {
        if let Some(tag) = snapshot {
            // Promotion can rename a snapshot's parent; only the tag is
            // reliable.
            if d.name.as_str().ends_with(&format!("@{tag}")) {
                h.system_datasets.push(Arc::clone(d));
                continue;
            }
        }
        // For clones, match the base dataset name or its children.
        if d.name.as_str().ends_with(state_dataset_id)
            || d.name.as_str().contains(&format!("/{state_dataset_id}/"))
        {
            h.system_datasets.push(Arc::clone(d));
        }
    }

    for states in users.values() {
        // A snapshot tag is its own group identifier: every user state
        // carrying it belongs to this history state.
        if let Some(tag) = snapshot {
            for state in states.values() {
                let Some(first) = state.datasets.first() else {
                    continue;
                };
                if !first.is_snapshot {
                    continue;
                }
                if state.id == tag {
                    h.user_datasets.extend(state.datasets.iter().cloned());
                }
            }
            continue;
        }

        // Clone states bind through the tag; not all states of a user are
        // attached to this history entry.
        for state in states.values() {
            match state.datasets.first() {
                Some(first) if !first.is_snapshot => {}
                _ => continue,
            }

            let mut found = false;
            for d in &state.datasets {
                if bootfs_matches(d, h.id.as_str()) {
                    h.user_datasets.push(Arc::clone(d));
                    found = true;
                }
            }
            // Only take one matchable state for a given user.
            if found {
                break;
            }
        }
    }

    h.persistent_datasets = persistents.to_vec();
}
