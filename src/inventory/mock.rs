//! In-memory inventory for tests and embedders.

use tokio_util::sync::CancellationToken;

use crate::types::Dataset;

use super::{Inventory, InventoryError};

/// An [`Inventory`] backed by a caller-supplied dataset list.
///
/// `refresh` keeps the list as-is; replace the whole adapter to simulate a
/// changed pool.
#[derive(Debug, Clone, Default)]
pub struct MockInventory {
    datasets: Vec<Dataset>,
}

impl MockInventory {
    /// Creates a mock inventory over the given datasets.
    pub fn new(datasets: Vec<Dataset>) -> Self {
        MockInventory { datasets }
    }
}

impl Inventory for MockInventory {
    fn datasets(&self) -> &[Dataset] {
        &self.datasets
    }

    fn refresh(&mut self, _cancel: &CancellationToken) -> Result<(), InventoryError> {
        Ok(())
    }
}
