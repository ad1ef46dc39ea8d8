//! bootstate - reconstructs bootable machine states from a pooled
//! copy-on-write filesystem inventory.
//!
//! Given every dataset on the host and the kernel command line naming the
//! booted root, this library assembles the immutable [`machines::Machines`]
//! graph: each machine, its current state, its historical states (clones
//! and snapshots of its root), and the boot, user and persistent datasets
//! attached to each of them.

#[cfg(test)]
pub mod test_utils;

pub mod inventory;
pub mod machines;
pub mod types;
