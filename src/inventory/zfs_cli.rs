//! Production inventory adapter over the `zfs` CLI.
//!
//! Scans the host with a single `zfs list -Hp` invocation carrying an
//! explicit property list, then parses the tab-separated output. Boot-state
//! semantics ride on user properties (`com.ubuntu.zsys:*`), which `zfs`
//! prints as `-` when unset.
//!
//! Snapshots report `-` for `mountpoint` and `canmount`; when the underlying
//! dataset appears in the same scan, the snapshot inherits both from it so
//! that snapshot states remain classifiable.

use std::collections::HashMap;
use std::process::Command;

use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::types::{CanMount, Dataset, DatasetName};

use super::{Inventory, InventoryError};

const LIST_ARGS: [&str; 6] = [
    "list",
    "-Hp",
    "-t",
    "filesystem,volume,snapshot",
    "-o",
    "name,mountpoint,canmount,origin,\
     com.ubuntu.zsys:bootfs,com.ubuntu.zsys:bootfs-datasets,com.ubuntu.zsys:last-used",
];

/// An [`Inventory`] that enumerates datasets via `zfs list`.
#[derive(Debug, Default)]
pub struct ZfsListInventory {
    datasets: Vec<Dataset>,
}

impl ZfsListInventory {
    /// Creates the adapter and performs an initial scan.
    pub fn new(cancel: &CancellationToken) -> Result<Self, InventoryError> {
        let mut inventory = ZfsListInventory::default();
        inventory.refresh(cancel)?;
        Ok(inventory)
    }
}

impl Inventory for ZfsListInventory {
    fn datasets(&self) -> &[Dataset] {
        &self.datasets
    }

    fn refresh(&mut self, cancel: &CancellationToken) -> Result<(), InventoryError> {
        if cancel.is_cancelled() {
            return Err(InventoryError::Cancelled);
        }

        let output = Command::new("zfs")
            .args(LIST_ARGS)
            .output()
            .map_err(|source| InventoryError::Spawn {
                command: "zfs list".to_string(),
                source,
            })?;

        if cancel.is_cancelled() {
            return Err(InventoryError::Cancelled);
        }

        if !output.status.success() {
            return Err(InventoryError::CommandFailed {
                command: "zfs list".to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        self.datasets = parse_listing(&stdout)?;
        debug!(count = self.datasets.len(), "scanned datasets");
        Ok(())
    }
}

/// Parses the tab-separated output of `zfs list -Hp` with [`LIST_ARGS`].
pub(crate) fn parse_listing(listing: &str) -> Result<Vec<Dataset>, InventoryError> {
    let mut datasets = Vec::new();

    for line in listing.lines() {
        if line.is_empty() {
            continue;
        }
        datasets.push(parse_line(line)?);
    }

    inherit_snapshot_properties(&mut datasets);
    Ok(datasets)
}

fn parse_line(line: &str) -> Result<Dataset, InventoryError> {
    let fields: Vec<&str> = line.split('\t').collect();
    let &[name, mountpoint, canmount, origin, bootfs, bootfs_datasets, last_used] =
        fields.as_slice()
    else {
        return Err(InventoryError::Parse {
            line: line.to_string(),
            details: format!("expected 7 fields, got {}", fields.len()),
        });
    };

    let can_mount = match canmount {
        // Snapshots print `-`; resolved against the underlying dataset below.
        "-" => CanMount::default(),
        value => value.parse().map_err(|err| InventoryError::Parse {
            line: line.to_string(),
            details: format!("{err}"),
        })?,
    };

    let last_used = match last_used {
        "-" => 0,
        value => value.parse().unwrap_or_else(|_| {
            debug!(name, value, "unparseable last-used property, treating as unknown");
            0
        }),
    };

    Ok(Dataset {
        name: DatasetName::new(name),
        mountpoint: if mountpoint == "-" {
            String::new()
        } else {
            mountpoint.to_string()
        },
        can_mount,
        is_snapshot: name.contains('@'),
        origin: match origin {
            "-" | "" => None,
            o => Some(DatasetName::new(o)),
        },
        boot_fs: bootfs == "yes",
        bootfs_datasets: if bootfs_datasets == "-" {
            String::new()
        } else {
            bootfs_datasets.to_string()
        },
        last_used,
    })
}

/// Copies `mountpoint` and `canmount` from each snapshot's underlying
/// dataset when that dataset is part of the same scan.
fn inherit_snapshot_properties(datasets: &mut [Dataset]) {
    let filesystems: HashMap<String, (String, CanMount)> = datasets
        .iter()
        .filter(|d| !d.is_snapshot)
        .map(|d| {
            (
                d.name.as_str().to_string(),
                (d.mountpoint.clone(), d.can_mount),
            )
        })
        .collect();

    for d in datasets.iter_mut().filter(|d| d.is_snapshot) {
        if let Some((mountpoint, can_mount)) = filesystems.get(d.name.dataset()) {
            d.mountpoint = mountpoint.clone();
            d.can_mount = *can_mount;
        }
    }
}
