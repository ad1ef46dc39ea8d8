//! Core domain types for machine-state assembly.

pub mod dataset;
pub mod name;

// Re-export commonly used types at the module level
pub use dataset::{CanMount, Dataset, InvalidCanMount};
pub use name::{DatasetName, InvalidName};
