//! Shared test fixtures and arbitrary generators.

use crate::types::{CanMount, Dataset, DatasetName};
use proptest::prelude::*;

/// A minimal dataset: mountable, no mountpoint, no origin, no tags.
pub fn dataset(name: &str) -> Dataset {
    Dataset {
        name: DatasetName::new(name),
        mountpoint: String::new(),
        can_mount: CanMount::On,
        is_snapshot: name.contains('@'),
        origin: None,
        boot_fs: false,
        bootfs_datasets: String::new(),
        last_used: 0,
    }
}

/// A dataset mounted at `/`.
pub fn root_dataset(name: &str) -> Dataset {
    Dataset {
        mountpoint: "/".to_string(),
        ..dataset(name)
    }
}

/// A dataset mounted at `/boot`.
pub fn boot_dataset(name: &str) -> Dataset {
    Dataset {
        mountpoint: "/boot".to_string(),
        ..dataset(name)
    }
}

/// A user dataset with the given raw `bootfs_datasets` tag.
pub fn user_dataset(name: &str, bootfs_datasets: &str) -> Dataset {
    Dataset {
        mountpoint: format!("/home/{}", DatasetName::new(name).base()),
        bootfs_datasets: bootfs_datasets.to_string(),
        ..dataset(name)
    }
}

pub fn arb_name_segment() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9_-]{0,12}".prop_map(String::from)
}

pub fn arb_dataset_name() -> impl Strategy<Value = DatasetName> {
    prop::collection::vec(arb_name_segment(), 1..4)
        .prop_map(|segments| DatasetName::new(segments.join("/")))
}
