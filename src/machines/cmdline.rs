//! Kernel command line parsing and current-machine selection.

use std::collections::BTreeMap;

use crate::types::DatasetName;

use super::Machine;

/// Extracts the booted root dataset from a kernel command line.
///
/// Tokens are whitespace-separated; the first `root=` token wins, with a
/// leading `ZFS=` or `zfs:` prefix stripped from its value.
pub fn root_from_cmdline(cmdline: &str) -> Option<&str> {
    for token in cmdline.split_whitespace() {
        if let Some(root) = token.strip_prefix("root=") {
            let root = root
                .strip_prefix("ZFS=")
                .or_else(|| root.strip_prefix("zfs:"))
                .unwrap_or(root);
            return Some(root);
        }
    }
    None
}

/// Finds the machine the command line says is booted.
///
/// A direct hit on a machine id wins; otherwise a hit on any history state
/// selects the owning machine. No match means no current machine.
pub(crate) fn select_current(
    all: &BTreeMap<DatasetName, Machine>,
    cmdline: &str,
) -> Option<DatasetName> {
    let root = root_from_cmdline(cmdline)?;

    if let Some((id, _)) = all.get_key_value(root) {
        return Some(id.clone());
    }
    for (id, m) in all {
        if m.history.contains_key(root) {
            return Some(id.clone());
        }
    }
    None
}
