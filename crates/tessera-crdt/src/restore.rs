//! Importing saved or pasted scene data.
//!
//! Import is not reconciliation: imported elements replace nothing, they are
//! cleaned up and handed back for the caller to commit. Local elements are
//! consulted only so an imported copy never looks older than what this peer
//! already has.

use std::collections::{HashMap, HashSet};

use serde::Deserialize;
use tracing::debug;

use tessera_types::{Element, ElementId, ElementKind};

use crate::Result;
use crate::fractional::KeyGenerator;
use crate::indices::sync_invalid_indices;

#[derive(Debug, Default, Deserialize)]
struct ImportedScene {
    #[serde(default)]
    elements: Vec<Element>,
}

/// Clean up imported elements.
///
/// Drops legacy selection marquees and invisibly small elements, raises
/// version 0 to 1, bumps an element past a newer local copy of the same id,
/// gives repeated ids fresh ones, then repairs position keys.
pub fn restore_elements(
    imported: Vec<Element>,
    local: Option<&[Element]>,
    keygen: &KeyGenerator,
) -> Vec<Element> {
    let local_by_id: HashMap<&ElementId, &Element> = local
        .unwrap_or_default()
        .iter()
        .map(|el| (el.id(), el))
        .collect();

    let total = imported.len();
    let mut seen: HashSet<ElementId> = HashSet::with_capacity(total);
    let mut restored = Vec::with_capacity(total);
    for el in imported {
        if el.kind() == ElementKind::Selection || el.is_invisibly_small() {
            continue;
        }
        let mut el = el.normalized();
        if let Some(local) = local_by_id.get(el.id())
            && local.version() > el.version()
        {
            el.bump_version_past(local.version());
        }
        if seen.contains(el.id()) {
            el = el.with_id(ElementId::new());
        }
        seen.insert(el.id().clone());
        restored.push(el);
    }

    let repaired = sync_invalid_indices(&mut restored, keygen);
    debug!(
        imported = total,
        restored = restored.len(),
        repaired,
        "restored elements"
    );
    restored
}

/// Parse `{"elements":[...]}` and [`restore_elements`] the result.
pub fn restore_from_json(
    json: &str,
    local: Option<&[Element]>,
    keygen: &KeyGenerator,
) -> Result<Vec<Element>> {
    let scene: ImportedScene = serde_json::from_str(json)?;
    Ok(restore_elements(scene.elements, local, keygen))
}
