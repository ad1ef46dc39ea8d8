//! Machine-state model and assembly.
//!
//! This module contains the functional core: pure passes that turn a flat
//! dataset inventory into the [`Machines`] graph through topological
//! ordering, origin resolution, triage, attachment and current-machine
//! selection. All I/O lives behind the [`Inventory`] capability.
//!
//! # Ordering guarantees
//!
//! Every map in the assembled graph is a `BTreeMap`, every pass iterates in
//! a fixed order, and datasets travel in topological order throughout, so
//! two passes over the same inventory produce byte-identical
//! serializations.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::inventory::{Inventory, InventoryError, ZfsListInventory};
use crate::types::{CanMount, Dataset, DatasetName};

pub mod cmdline;

mod attach;
mod origin;
mod sort;
mod triage;


pub use cmdline::root_from_cmdline;
pub use sort::compare_names;

/// Errors from an assembly pass.
#[derive(Debug, Error)]
pub enum AssemblyError {
    /// The inventory scan failed.
    #[error("couldn't scan datasets: {0}")]
    Inventory(#[from] InventoryError),

    /// The pass was cancelled between phases.
    #[error("assembly pass cancelled")]
    Cancelled,
}

/// A bootable configuration: a root dataset and everything attached to it.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct State {
    /// Name of the root dataset for this state; may contain `@snapshot`.
    pub id: DatasetName,

    /// Whether this is a boot-state-managed system. The other dataset
    /// collections stay empty otherwise.
    #[serde(skip_serializing_if = "is_false")]
    pub is_zsys: bool,

    /// Last time this state was used.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_used: Option<DateTime<Utc>>,

    /// Root and boot surface of this state.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub system_datasets: Vec<Arc<Dataset>>,

    /// User datasets bound to this state.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub user_datasets: Vec<Arc<Dataset>>,

    /// Datasets shared between all machines.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub persistent_datasets: Vec<Arc<Dataset>>,
}

impl State {
    /// Creates the state for a root dataset, with the root as its sole
    /// initial system dataset.
    fn from_root(d: &Arc<Dataset>) -> Self {
        State {
            id: d.name.clone(),
            is_zsys: d.boot_fs,
            last_used: last_used_time(d.last_used),
            system_datasets: vec![Arc::clone(d)],
            user_datasets: Vec::new(),
            persistent_datasets: Vec::new(),
        }
    }
}

/// One state of one user: the user's root dataset and its descendants.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserState {
    /// Trailing component of the user dataset name, after the last `_`
    /// (clone) or `@` (snapshot).
    pub id: String,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub datasets: Vec<Arc<Dataset>>,
}

/// A machine: its current state plus every historical variant of it.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Machine {
    /// Main machine state.
    #[serde(flatten)]
    pub state: State,

    /// Per-user reference to each of its states, keyed by user then by
    /// slot (`"current"` or the decimal last-used timestamp). Transient:
    /// cleared once history attachment has consumed it.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub users: BTreeMap<String, BTreeMap<String, UserState>>,

    /// Historical states, keyed by their root dataset name.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub history: BTreeMap<DatasetName, State>,
}

impl Machine {
    /// Whether this machine is boot-state managed.
    pub fn is_zsys(&self) -> bool {
        self.state.is_zsys
    }

    /// The machine id: the name of its main root dataset.
    pub fn id(&self) -> &DatasetName {
        &self.state.id
    }
}

/// The machines present on the host, assembled from one inventory scan.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Machines {
    /// Every machine, keyed by its main root dataset name.
    all: BTreeMap<DatasetName, Machine>,

    /// The kernel command line the current machine was selected from.
    cmdline: String,

    /// Id of the currently booted machine, when the command line matches
    /// one.
    #[serde(skip_serializing_if = "Option::is_none")]
    current: Option<DatasetName>,

    /// Every system dataset, in canonical assembly order.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    all_system_datasets: Vec<Arc<Dataset>>,

    /// Every mountable user dataset, in canonical assembly order.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    all_users_datasets: Vec<Arc<Dataset>>,

    #[serde(skip)]
    inventory: Box<dyn Inventory>,
}

impl fmt::Debug for Machines {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Machines")
            .field("all", &self.all)
            .field("cmdline", &self.cmdline)
            .field("current", &self.current)
            .field("all_system_datasets", &self.all_system_datasets)
            .field("all_users_datasets", &self.all_users_datasets)
            .finish_non_exhaustive()
    }
}

impl Machines {
    /// Scans the host with the production inventory adapter and assembles
    /// the machine graph.
    pub fn new(
        cmdline: impl Into<String>,
        cancel: &CancellationToken,
    ) -> Result<Self, AssemblyError> {
        let inventory = ZfsListInventory::new(cancel)?;
        Self::with_inventory(Box::new(inventory), cmdline, cancel)
    }

    /// Assembles the machine graph from the given inventory adapter.
    ///
    /// This is the seam tests and embedders use to substitute
    /// [`MockInventory`](crate::inventory::MockInventory) for the
    /// production adapter.
    pub fn with_inventory(
        inventory: Box<dyn Inventory>,
        cmdline: impl Into<String>,
        cancel: &CancellationToken,
    ) -> Result<Self, AssemblyError> {
        let cmdline = cmdline.into();
        info!("building new machines list");

        let assembly = assemble(inventory.datasets(), &cmdline, cancel)?;
        let mut machines = Machines {
            all: BTreeMap::new(),
            cmdline,
            current: None,
            all_system_datasets: Vec::new(),
            all_users_datasets: Vec::new(),
            inventory,
        };
        machines.install(assembly);
        Ok(machines)
    }

    /// Re-scans the inventory and rebuilds the graph.
    ///
    /// The new graph replaces the old one only after every phase
    /// succeeded; on error the previous graph is left untouched.
    pub fn refresh(&mut self, cancel: &CancellationToken) -> Result<(), AssemblyError> {
        info!("refreshing machines list");
        self.inventory.refresh(cancel)?;
        let assembly = assemble(self.inventory.datasets(), &self.cmdline, cancel)?;
        self.install(assembly);
        Ok(())
    }

    fn install(&mut self, assembly: Assembly) {
        self.all = assembly.all;
        self.current = assembly.current;
        self.all_system_datasets = assembly.all_system_datasets;
        self.all_users_datasets = assembly.all_users_datasets;

        match serde_json::to_string_pretty(&*self) {
            Ok(layout) => debug!("current machines scanning layout:\n{layout}"),
            Err(err) => debug!(%err, "couldn't format machines layout"),
        }
    }

    /// Every machine, keyed by its main root dataset name.
    pub fn all(&self) -> &BTreeMap<DatasetName, Machine> {
        &self.all
    }

    /// The kernel command line this graph was assembled against.
    pub fn cmdline(&self) -> &str {
        &self.cmdline
    }

    /// The currently booted machine, when the command line matches one.
    pub fn current(&self) -> Option<&Machine> {
        self.current.as_ref().and_then(|id| self.all.get(id))
    }

    /// Whether there is a current machine and it is boot-state managed.
    pub fn current_is_zsys(&self) -> bool {
        self.current().is_some_and(Machine::is_zsys)
    }

    /// Every system dataset, in canonical assembly order. Boot datasets
    /// not bound to any state are appended at the end.
    pub fn all_system_datasets(&self) -> &[Arc<Dataset>] {
        &self.all_system_datasets
    }

    /// Every mountable user dataset, in canonical assembly order.
    pub fn all_users_datasets(&self) -> &[Arc<Dataset>] {
        &self.all_users_datasets
    }
}

/// Output of one assembly pass over a dataset inventory.
struct Assembly {
    all: BTreeMap<DatasetName, Machine>,
    current: Option<DatasetName>,
    all_system_datasets: Vec<Arc<Dataset>>,
    all_users_datasets: Vec<Arc<Dataset>>,
}

/// Runs the assembly pipeline: sort, resolve origins, triage, attach,
/// select the current machine. Observes `cancel` between phases.
fn assemble(
    datasets: &[Dataset],
    cmdline: &str,
    cancel: &CancellationToken,
) -> Result<Assembly, AssemblyError> {
    let mut datasets: Vec<Arc<Dataset>> = datasets.iter().cloned().map(Arc::new).collect();
    sort::sort_datasets(&mut datasets);
    ensure_live(cancel)?;

    // Resolve to the root origin, for root-mounted datasets only.
    let origins = origin::resolve_origins(&datasets, "/");
    ensure_live(cancel)?;

    // Main datasets first, then clones, then unresolved ones.
    let mut ordered: Vec<Arc<Dataset>> = Vec::with_capacity(datasets.len());
    let mut clones: Vec<Arc<Dataset>> = Vec::new();
    let mut others: Vec<Arc<Dataset>> = Vec::new();
    for d in &datasets {
        match origins.get(&d.name) {
            Some(None) => ordered.push(Arc::clone(d)),
            Some(Some(_)) => clones.push(Arc::clone(d)),
            None => others.push(Arc::clone(d)),
        }
    }
    ordered.extend(clones);
    ordered.extend(others);

    let mut all = BTreeMap::new();
    let triaged = triage::triage(&mut all, &ordered, &origins);
    ensure_live(cancel)?;

    // Group user datasets under their roots and resolve each root's
    // effective origin (unfiltered this time).
    let groups = attach::root_user_groups(&triaged.userdatas);
    let roots_only: Vec<Arc<Dataset>> = groups.iter().map(|(root, _)| Arc::clone(root)).collect();
    let user_origins = origin::resolve_origins(&roots_only, "");
    let user_groups: Vec<attach::UserGroup> = groups
        .into_iter()
        .map(|(root, children)| attach::UserGroup {
            origin: user_origins.get(&root.name).cloned().flatten(),
            root,
            children,
        })
        .collect();

    for m in all.values_mut() {
        attach::attach_remaining(m, &triaged.boots, &triaged.persistents, &user_groups);
    }
    ensure_live(cancel)?;

    let mut all_system_datasets = Vec::new();
    for m in all.values() {
        all_system_datasets.extend(m.state.system_datasets.iter().cloned());
        for h in m.history.values() {
            all_system_datasets.extend(h.system_datasets.iter().cloned());
        }
    }

    let mut all_users_datasets = Vec::new();
    for d in &triaged.userdatas {
        if d.can_mount == CanMount::Off {
            continue;
        }
        all_users_datasets.push(Arc::clone(d));
    }

    // Boot datasets bound to no state still belong to the system
    // enumeration, so they can be switched to noauto with the rest.
    append_missing(&mut all_system_datasets, &triaged.boots);

    let current = cmdline::select_current(&all, cmdline);

    Ok(Assembly {
        all,
        current,
        all_system_datasets,
        all_users_datasets,
    })
}

fn ensure_live(cancel: &CancellationToken) -> Result<(), AssemblyError> {
    if cancel.is_cancelled() {
        Err(AssemblyError::Cancelled)
    } else {
        Ok(())
    }
}

/// Appends each mountable boot dataset not already present, compared by
/// name (names are unique within a pass).
fn append_missing(target: &mut Vec<Arc<Dataset>>, boots: &[Arc<Dataset>]) {
    for d in boots {
        if d.can_mount == CanMount::Off {
            continue;
        }
        if target.iter().any(|t| t.name == d.name) {
            continue;
        }
        target.push(Arc::clone(d));
    }
}

fn last_used_time(secs: i64) -> Option<DateTime<Utc>> {
    if secs == 0 {
        return None;
    }
    DateTime::from_timestamp(secs, 0)
}

fn is_false(v: &bool) -> bool {
    !v
}
