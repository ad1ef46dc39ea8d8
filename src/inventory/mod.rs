//! Inventory adapters for enumerating datasets.
//!
//! The assembly pass never talks to the storage layer directly; it consumes
//! datasets through the [`Inventory`] capability. The production adapter
//! shells out to the `zfs` CLI, and [`MockInventory`] serves tests and
//! embedders that already hold a dataset list.
//!
//! # Example (mock for testing)
//!
//! ```
//! use bootstate::inventory::MockInventory;
//! use bootstate::machines::Machines;
//! use tokio_util::sync::CancellationToken;
//!
//! let inventory = MockInventory::new(Vec::new());
//! let machines = Machines::with_inventory(
//!     Box::new(inventory),
//!     "root=ZFS=rpool/ROOT/ubuntu_abcd",
//!     &CancellationToken::new(),
//! )
//! .unwrap();
//! assert!(machines.current().is_none());
//! ```

use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::types::Dataset;

pub mod mock;
pub mod zfs_cli;

pub use mock::MockInventory;
pub use zfs_cli::ZfsListInventory;

/// Errors from inventory scans.
#[derive(Debug, Error)]
pub enum InventoryError {
    /// The scan command could not be spawned.
    #[error("failed to spawn {command}: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// The scan command ran but failed.
    #[error("{command} failed: {stderr}")]
    CommandFailed { command: String, stderr: String },

    /// The scan output could not be parsed.
    #[error("malformed inventory line {line:?}: {details}")]
    Parse { line: String, details: String },

    /// The scan was cancelled before completion.
    #[error("inventory scan cancelled")]
    Cancelled,
}

/// Capability for enumerating the datasets present on the host.
///
/// Implementations cache their last scan: [`datasets`](Inventory::datasets)
/// is cheap and side-effect free, while [`refresh`](Inventory::refresh)
/// performs the actual I/O and honors cancellation at that boundary.
pub trait Inventory: Send {
    /// Returns the datasets from the most recent scan.
    fn datasets(&self) -> &[Dataset];

    /// Re-scans the underlying storage, replacing the cached datasets.
    ///
    /// On failure the previous cache is left in place.
    fn refresh(&mut self, cancel: &CancellationToken) -> Result<(), InventoryError>;
}
