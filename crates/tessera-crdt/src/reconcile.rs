//! Merging a remote element batch into the local element list.
//!
//! Whole-element last-writer-wins. For each remote element the winner is
//! decided from `(version, version_nonce)` alone, except that an element this
//! peer is mid-gesture on always stays local. The merged list is sorted by
//! position key and repaired, so every peer that sees the same inputs ends up
//! with the same keys and the same order.

use std::collections::{HashMap, HashSet};

use tracing::debug;

use tessera_types::{Element, ElementId, TransientState};

use crate::fractional::KeyGenerator;
use crate::indices::{order_by_fractional_index, sync_invalid_indices};

/// Whether the local copy beats `remote`.
///
/// Local wins when it is being edited, resized or dragged here, when its
/// version is higher, or on a version tie when its nonce is lower. With no
/// local copy the remote element always wins.
pub fn should_discard_remote_element(
    local: Option<&Element>,
    remote: &Element,
    transient: &TransientState,
) -> bool {
    let Some(local) = local else {
        return false;
    };
    transient.is_busy(local.id())
        || local.version() > remote.version()
        || (local.version() == remote.version()
            && local.version_nonce() < remote.version_nonce())
}

/// Merge `remote` into `local`.
///
/// Remote order is walked first so a peer's reordering is honored, then any
/// local-only elements are appended. The result is sorted by key then id and
/// its keys repaired. Malformed remote elements are not rejected; a bad key
/// is repaired like any other.
pub fn reconcile_elements(
    local: &[Element],
    remote: &[Element],
    transient: &TransientState,
    keygen: &KeyGenerator,
) -> Vec<Element> {
    let local_by_id: HashMap<&ElementId, &Element> =
        local.iter().map(|el| (el.id(), el)).collect();

    let mut added: HashSet<&ElementId> = HashSet::with_capacity(local.len() + remote.len());
    let mut merged = Vec::with_capacity(local.len() + remote.len());
    let mut kept_local = 0usize;

    for remote_el in remote {
        if !added.insert(remote_el.id()) {
            continue;
        }
        let local_el = local_by_id.get(remote_el.id()).copied();
        match local_el {
            Some(local_el) if should_discard_remote_element(Some(local_el), remote_el, transient) => {
                kept_local += 1;
                merged.push(local_el.clone());
            }
            _ => merged.push(remote_el.clone()),
        }
    }

    for local_el in local {
        if added.insert(local_el.id()) {
            merged.push(local_el.clone());
        }
    }

    order_by_fractional_index(&mut merged);
    let repaired = sync_invalid_indices(&mut merged, keygen);

    debug!(
        local = local.len(),
        remote = remote.len(),
        merged = merged.len(),
        kept_local,
        repaired,
        "reconciled remote elements"
    );
    merged
}
