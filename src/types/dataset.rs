//! Dataset input records.
//!
//! A [`Dataset`] is one volume as reported by the inventory adapter. It is
//! immutable within an assembly pass; the assembled graph shares datasets
//! as `Arc<Dataset>` rather than cross-referencing them by owning handles.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::name::DatasetName;

/// Error returned when parsing an unknown `canmount` value.
#[derive(Debug, Clone, Error)]
#[error("invalid canmount value {value:?}: expected on, off or noauto")]
pub struct InvalidCanMount {
    value: String,
}

/// Mount policy of a dataset (the `canmount` property).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CanMount {
    #[default]
    On,
    Off,
    NoAuto,
}

impl FromStr for CanMount {
    type Err = InvalidCanMount;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "on" => Ok(CanMount::On),
            "off" => Ok(CanMount::Off),
            "noauto" => Ok(CanMount::NoAuto),
            other => Err(InvalidCanMount {
                value: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for CanMount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CanMount::On => "on",
            CanMount::Off => "off",
            CanMount::NoAuto => "noauto",
        };
        write!(f, "{s}")
    }
}

/// A dataset with the properties the assembly pass classifies on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dataset {
    /// Hierarchical name; snapshots contain `@`.
    pub name: DatasetName,

    /// Mountpoint path. Empty when none; `/` marks a root dataset.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub mountpoint: String,

    /// Mount policy.
    #[serde(default)]
    pub can_mount: CanMount,

    /// Whether this dataset is a snapshot.
    #[serde(default, skip_serializing_if = "is_false")]
    pub is_snapshot: bool,

    /// The dataset this one was cloned from, when it has one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<DatasetName>,

    /// Whether the dataset carries boot-state semantics.
    #[serde(default, skip_serializing_if = "is_false")]
    pub boot_fs: bool,

    /// Raw colon-separated list of machine roots this dataset is tagged to.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub bootfs_datasets: String,

    /// Unix timestamp of last use; 0 when unknown.
    #[serde(default, skip_serializing_if = "is_zero")]
    pub last_used: i64,
}

fn is_false(v: &bool) -> bool {
    !v
}

fn is_zero(v: &i64) -> bool {
    *v == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn can_mount_parses_known_values() {
        assert_eq!("on".parse::<CanMount>().unwrap(), CanMount::On);
        assert_eq!("off".parse::<CanMount>().unwrap(), CanMount::Off);
        assert_eq!("noauto".parse::<CanMount>().unwrap(), CanMount::NoAuto);
        assert!("auto".parse::<CanMount>().is_err());
    }

    #[test]
    fn can_mount_display_roundtrips() {
        for v in [CanMount::On, CanMount::Off, CanMount::NoAuto] {
            assert_eq!(v.to_string().parse::<CanMount>().unwrap(), v);
        }
    }

    #[test]
    fn dataset_serialization_omits_defaults() {
        let d = Dataset {
            name: DatasetName::new("rpool/ROOT/ubuntu_abcd"),
            mountpoint: String::new(),
            can_mount: CanMount::On,
            is_snapshot: false,
            origin: None,
            boot_fs: false,
            bootfs_datasets: String::new(),
            last_used: 0,
        };
        let json = serde_json::to_string(&d).unwrap();
        assert_eq!(json, r#"{"name":"rpool/ROOT/ubuntu_abcd","canMount":"on"}"#);
    }

    #[test]
    fn dataset_deserialization_fills_defaults() {
        let d: Dataset =
            serde_json::from_str(r#"{"name":"rpool/var","canMount":"off"}"#).unwrap();
        assert_eq!(d.name, "rpool/var");
        assert_eq!(d.can_mount, CanMount::Off);
        assert!(d.origin.is_none());
        assert_eq!(d.last_used, 0);
    }
}
