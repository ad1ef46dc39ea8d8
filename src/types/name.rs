//! Dataset name handling.
//!
//! Dataset names are hierarchical, `/`-delimited identifiers
//! (e.g. `rpool/ROOT/ubuntu_abcd`). Snapshot names carry an `@tag` suffix
//! on their final segment. This type prevents accidental mixing of names
//! with other strings and centralizes the name-structure helpers the
//! assembly rules rely on.

use std::borrow::Borrow;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error returned when a state identifier cannot be decomposed.
///
/// State identifiers contain at most one `@`; anything else cannot be
/// compared against for descendant checks.
#[derive(Debug, Clone, Error)]
#[error("unexpected number of `@` in dataset name {name:?}")]
pub struct InvalidName {
    name: String,
}

impl InvalidName {
    pub(crate) fn new(name: impl Into<String>) -> Self {
        InvalidName { name: name.into() }
    }
}

/// A hierarchical dataset name.
///
/// Ordering is plain lexicographic, which is what map keys need; the
/// topological ordering used during assembly lives in `machines::sort`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DatasetName(String);

impl DatasetName {
    /// Wraps a raw name.
    pub fn new(s: impl Into<String>) -> Self {
        DatasetName(s.into())
    }

    /// Returns the name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The last `/`-segment. For a snapshot this still carries the `@tag`.
    pub fn base(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or(&self.0)
    }

    /// Everything before the last `@`; the whole name if there is none.
    ///
    /// For a snapshot this is the underlying dataset.
    pub fn dataset(&self) -> &str {
        match self.0.rfind('@') {
            Some(i) => &self.0[..i],
            None => &self.0,
        }
    }

    /// The part after the last `@`, if any.
    pub fn snapshot_tag(&self) -> Option<&str> {
        self.0.rfind('@').map(|i| &self.0[i + 1..])
    }

    /// Whether the name denotes a snapshot.
    pub fn is_snapshot_name(&self) -> bool {
        self.0.contains('@')
    }

    /// The leading segment, i.e. the pool the dataset lives on.
    pub fn pool(&self) -> &str {
        self.0.split('/').next().unwrap_or(&self.0)
    }
}

impl fmt::Display for DatasetName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Borrow<str> for DatasetName {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for DatasetName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for DatasetName {
    fn from(s: &str) -> Self {
        DatasetName(s.to_string())
    }
}

impl From<String> for DatasetName {
    fn from(s: String) -> Self {
        DatasetName(s)
    }
}

impl PartialEq<str> for DatasetName {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for DatasetName {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn base_returns_last_segment() {
        assert_eq!(DatasetName::new("rpool/ROOT/ubuntu_abcd").base(), "ubuntu_abcd");
        assert_eq!(DatasetName::new("rpool").base(), "rpool");
        assert_eq!(
            DatasetName::new("rpool/ROOT/ubuntu_abcd@snap1").base(),
            "ubuntu_abcd@snap1"
        );
    }

    #[test]
    fn dataset_strips_snapshot_tag() {
        assert_eq!(
            DatasetName::new("rpool/ROOT/ubuntu_abcd@snap1").dataset(),
            "rpool/ROOT/ubuntu_abcd"
        );
        assert_eq!(
            DatasetName::new("rpool/ROOT/ubuntu_abcd").dataset(),
            "rpool/ROOT/ubuntu_abcd"
        );
    }

    #[test]
    fn snapshot_tag_extraction() {
        assert_eq!(
            DatasetName::new("rpool/ROOT/ubuntu_abcd@snap1").snapshot_tag(),
            Some("snap1")
        );
        assert_eq!(DatasetName::new("rpool/ROOT/ubuntu_abcd").snapshot_tag(), None);
    }

    #[test]
    fn pool_is_leading_segment() {
        assert_eq!(DatasetName::new("bpool/BOOT/ubuntu_abcd").pool(), "bpool");
        assert_eq!(DatasetName::new("rpool").pool(), "rpool");
    }

    proptest! {
        #[test]
        fn dataset_and_tag_recompose(
            ds in "[a-z][a-z0-9/_-]{0,40}",
            tag in "[a-z0-9]{1,10}"
        ) {
            let name = DatasetName::new(format!("{ds}@{tag}"));
            prop_assert!(name.is_snapshot_name());
            prop_assert_eq!(name.dataset(), ds.as_str());
            prop_assert_eq!(name.snapshot_tag(), Some(tag.as_str()));
        }

        #[test]
        fn plain_names_have_no_tag(ds in "[a-z][a-z0-9/_-]{0,40}") {
            let name = DatasetName::new(&ds);
            prop_assert!(!name.is_snapshot_name());
            prop_assert_eq!(name.dataset(), ds.as_str());
            prop_assert_eq!(name.snapshot_tag(), None);
        }
    }
}
