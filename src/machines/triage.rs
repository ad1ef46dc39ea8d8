//! Dataset triage.
//!
//! Walks the ordered dataset list once and gives every dataset exactly one
//! disposition: it founds a machine, extends a machine or history state,
//! or lands in one of the deferred buckets (boot, user, persistent) for the
//! attachment phase. Anything left over that nothing would mount is
//! discarded.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::types::{CanMount, Dataset, DatasetName, InvalidName};

use super::{Machine, State};

const USERDATA_CONTAINER: &str = "/userdata/";

/// Datasets deferred to the attachment phase.
#[derive(Debug, Default)]
pub(crate) struct TriagedDatasets {
    /// Datasets mounted under `/boot`.
    pub boots: Vec<Arc<Dataset>>,
    /// Datasets living in a user-data container, roots and children alike.
    pub userdatas: Vec<Arc<Dataset>>,
    /// Mountable datasets shared by every machine.
    pub persistents: Vec<Arc<Dataset>>,
}

/// Classifies every dataset, creating machines and history states in `all`.
///
/// `ordered` must hold main datasets first, then clones, then unresolved
/// ones, each group in topological order. First matching rule wins.
pub(crate) fn triage(
    all: &mut BTreeMap<DatasetName, Machine>,
    ordered: &[Arc<Dataset>],
    origins: &BTreeMap<DatasetName, Option<DatasetName>>,
) -> TriagedDatasets {
    let mut triaged = TriagedDatasets::default();

    for d in ordered {
        let origin = origins.get(&d.name);

        // Main mountable root dataset founding a machine.
        if let Some(machine) = machine_from_dataset(d, origin) {
            all.insert(d.name.clone(), machine);
            continue;
        }

        // Child of an existing state, or a new history root.
        if attach_system_and_history(all, d, origin) {
            continue;
        }

        // Boot datasets can live on another pool whose machine isn't
        // necessarily triaged yet; defer them.
        if d.mountpoint.starts_with("/boot") {
            triaged.boots.push(Arc::clone(d));
            continue;
        }

        // Same for user datasets.
        if d.name.as_str().to_lowercase().contains(USERDATA_CONTAINER) {
            triaged.userdatas.push(Arc::clone(d));
            continue;
        }

        // Not a boot, user or system dataset: nothing will mount it unless
        // canmount is on.
        if d.can_mount != CanMount::On {
            debug!(
                name = %d.name,
                "ignoring dataset: either an orphan clone or not a boot, user or system dataset, and canmount isn't on"
            );
            continue;
        }

        triaged.persistents.push(Arc::clone(d));
    }

    triaged
}

/// Returns a new machine if the dataset is a mountable, uncloned root.
fn machine_from_dataset(
    d: &Arc<Dataset>,
    origin: Option<&Option<DatasetName>>,
) -> Option<Machine> {
    if d.mountpoint == "/" && d.can_mount != CanMount::Off && matches!(origin, Some(None)) {
        Some(Machine {
            state: State::from_root(d),
            users: BTreeMap::new(),
            history: BTreeMap::new(),
        })
    } else {
        None
    }
}

/// Binds the dataset to an existing machine as a system child, a new
/// history root, or a history child. Returns whether anything matched.
fn attach_system_and_history(
    all: &mut BTreeMap<DatasetName, Machine>,
    d: &Arc<Dataset>,
    origin: Option<&Option<DatasetName>>,
) -> bool {
    for (id, m) in all.iter_mut() {
        // Direct main machine state children.
        match is_child(id, d) {
            Ok(true) => {
                m.state.system_datasets.push(Arc::clone(d));
                return true;
            }
            Ok(false) => {}
            Err(err) => {
                warn!(name = %d.name, %err, "ignoring dataset as couldn't assert if it's a child");
            }
        }

        // Clone or snapshot root dataset pointing back at this machine.
        if d.mountpoint == "/"
            && d.can_mount != CanMount::Off
            && origin.is_some_and(|o| o.as_ref() == Some(id))
        {
            m.history.insert(d.name.clone(), State::from_root(d));
            return true;
        }

        // Clone or snapshot children.
        for (hid, h) in m.history.iter_mut() {
            match is_child(hid, d) {
                Ok(true) => {
                    h.system_datasets.push(Arc::clone(d));
                    return true;
                }
                Ok(false) => {}
                Err(err) => {
                    warn!(name = %d.name, %err, "ignoring dataset as couldn't assert if it's a child");
                }
            }
        }
    }

    false
}

/// Whether `d` is a strict descendant of the state rooted at `state_id`.
///
/// A snapshot state id (`root@tag`) owns the snapshots of the root's
/// children taken with the same tag.
pub(crate) fn is_child(state_id: &DatasetName, d: &Dataset) -> Result<bool, InvalidName> {
    let parts: Vec<&str> = state_id.as_str().split('@').collect();
    match parts[..] {
        [root] => Ok(d.name.as_str().starts_with(&format!("{root}/")) && !d.is_snapshot),
        [root, tag] => Ok(d.name.as_str().starts_with(&format!("{root}/"))
            && d.is_snapshot
            && d.name.as_str().ends_with(&format!("@{tag}"))),
        _ => Err(InvalidName::new(state_id.as_str())),
    }
}
