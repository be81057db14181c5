//! Element-level position-key maintenance.
//!
//! The ordered-list invariant: for neighbors `a` then `b` in storage order,
//! `key(a) < key(b)`. [`compare_elements`] is the total order (key, then id,
//! unkeyed last) that reconciliation sorts by; the `sync_*` functions rewrite
//! keys in place so storage order and key order agree again.

use std::cmp::Ordering;
use std::collections::HashSet;
use std::fmt;

use tracing::{debug, warn};

use tessera_types::{Element, ElementId};

use crate::fractional::{IndexCharSet, KeyGenerator};
use crate::{CrdtError, Result};

/// Whether `key` fits strictly between `pred` and `succ`.
///
/// An absent neighbor relaxes that side. An absent or empty key is never
/// valid.
pub fn is_valid_fractional_index(key: Option<&str>, pred: Option<&str>, succ: Option<&str>) -> bool {
    let Some(key) = key.filter(|k| !k.is_empty()) else {
        return false;
    };
    match (pred, succ) {
        (Some(p), Some(s)) => p < key && key < s,
        (Some(p), None) => p < key,
        (None, Some(s)) => key < s,
        (None, None) => true,
    }
}

/// Total order over elements: key, then id. Unkeyed elements sort last.
pub fn compare_elements(a: &Element, b: &Element) -> Ordering {
    match (a.index_str(), b.index_str()) {
        (Some(x), Some(y)) => x.cmp(y).then_with(|| a.id().cmp(b.id())),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => a.id().cmp(b.id()),
    }
}

/// Stable sort by [`compare_elements`].
pub fn order_by_fractional_index(elements: &mut [Element]) {
    elements.sort_by(compare_elements);
}

// =========================================================================
// Repair
// =========================================================================

/// A contiguous run of elements whose keys must be regenerated, with the
/// kept keys on either side.
#[derive(Debug)]
struct Run {
    start: usize,
    end: usize,
    lower: Option<String>,
    upper: Option<String>,
}

impl Run {
    fn len(&self) -> usize {
        self.end - self.start
    }
}

/// Decide which keys to keep and group the rest into runs.
///
/// A key is kept when it is well-formed, above the last kept key, and below
/// the next well-formed key that is itself above the last kept key. The
/// lookahead drops a single outlier instead of every element after it.
fn plan_runs(elements: &[Element], charset: IndexCharSet) -> Vec<Run> {
    let keys: Vec<Option<&str>> = elements
        .iter()
        .map(|el| el.index_str().filter(|k| charset.is_valid_key(k)))
        .collect();

    let mut kept = vec![false; keys.len()];
    let mut last: Option<&str> = None;
    // Everything strictly between `i` and `cursor` is unkeyed or at or below
    // `last`. `last` only grows, so the cursor never moves backwards.
    let mut cursor = 0;
    for (i, key) in keys.iter().enumerate() {
        let Some(key) = *key else { continue };
        cursor = cursor.max(i + 1);
        while cursor < keys.len()
            && !keys[cursor].is_some_and(|k| last.is_none_or(|l| k > l))
        {
            cursor += 1;
        }
        let upper = keys.get(cursor).copied().flatten();
        if is_valid_fractional_index(Some(key), last, upper) {
            kept[i] = true;
            last = Some(key);
        }
    }

    let mut runs = Vec::new();
    let mut i = 0;
    while i < kept.len() {
        if kept[i] {
            i += 1;
            continue;
        }
        let start = i;
        while i < kept.len() && !kept[i] {
            i += 1;
        }
        runs.push(Run {
            start,
            end: i,
            lower: start.checked_sub(1).and_then(|p| keys[p]).map(str::to_string),
            upper: keys.get(i).copied().flatten().map(str::to_string),
        });
    }
    runs
}

/// Generate keys for each run, logging and skipping runs that fail.
fn generate_run_keys(runs: Vec<Run>, keygen: &KeyGenerator) -> Vec<(Run, Vec<String>)> {
    let mut planned = Vec::with_capacity(runs.len());
    for run in runs {
        match keygen.n_keys_between(run.lower.as_deref(), run.upper.as_deref(), run.len()) {
            Ok(keys) => planned.push((run, keys)),
            Err(source) => {
                let err = CrdtError::RepairFailure {
                    start: run.start,
                    len: run.len(),
                    source: Box::new(source),
                };
                warn!(%err, "leaving run with previous keys");
            }
        }
    }
    planned
}

/// Write planned keys with versioned updates. Returns how many changed.
fn apply_run_keys(elements: &mut [Element], planned: Vec<(Run, Vec<String>)>) -> usize {
    let mut repaired = 0;
    for (run, keys) in planned {
        for (el, key) in elements[run.start..run.end].iter_mut().zip(keys) {
            if el.set_index(Some(key.into())) {
                repaired += 1;
            }
        }
    }
    repaired
}

/// Re-key every element whose key is missing, malformed, or out of order.
///
/// Runs in storage order. Kept keys are never touched; each contiguous run
/// of other elements gets fresh keys between its kept neighbors. Re-keyed
/// elements have their version bumped. Returns how many were re-keyed.
pub fn sync_invalid_indices(elements: &mut [Element], keygen: &KeyGenerator) -> usize {
    let runs = plan_runs(elements, keygen.charset());
    if runs.is_empty() {
        return 0;
    }

    let repaired = apply_run_keys(elements, generate_run_keys(runs, keygen));
    debug!(repaired, total = elements.len(), "synced invalid position keys");
    repaired
}

/// Re-key only the contiguous runs of `moved` elements against their new
/// neighbors.
///
/// Falls back to [`sync_invalid_indices`] if generation fails or the result
/// would not satisfy the ordered-list invariant (for example when a
/// neighbor's own key is already out of order).
pub fn sync_moved_indices(
    elements: &mut [Element],
    moved: &HashSet<ElementId>,
    keygen: &KeyGenerator,
) -> usize {
    let mut runs = Vec::new();
    let mut i = 0;
    while i < elements.len() {
        if !moved.contains(elements[i].id()) {
            i += 1;
            continue;
        }
        let start = i;
        while i < elements.len() && moved.contains(elements[i].id()) {
            i += 1;
        }
        runs.push(Run {
            start,
            end: i,
            lower: start
                .checked_sub(1)
                .and_then(|p| elements[p].index_str())
                .map(str::to_string),
            upper: elements.get(i).and_then(|el| el.index_str()).map(str::to_string),
        });
    }

    let mut planned = Vec::with_capacity(runs.len());
    for run in runs {
        match keygen.n_keys_between(run.lower.as_deref(), run.upper.as_deref(), run.len()) {
            Ok(keys) => planned.push((run, keys)),
            Err(err) => {
                debug!(%err, "moved keys could not be generated; repairing whole list");
                return sync_invalid_indices(elements, keygen);
            }
        }
    }

    let mut next: Vec<Option<&str>> = elements.iter().map(|el| el.index_str()).collect();
    for (run, keys) in &planned {
        for (slot, key) in next[run.start..run.end].iter_mut().zip(keys) {
            *slot = Some(key.as_str());
        }
    }
    let ordered = next.iter().all(Option::is_some)
        && next.windows(2).all(|w| w[0] < w[1]);
    if !ordered {
        debug!("moved keys would leave list unordered; repairing whole list");
        return sync_invalid_indices(elements, keygen);
    }

    let mut repaired = 0;
    for (run, keys) in planned {
        for (el, key) in elements[run.start..run.end].iter_mut().zip(keys) {
            if el.set_index(Some(key.into())) {
                repaired += 1;
            }
        }
    }
    repaired
}

/// Copies of `elements` with keys consistent with array order.
///
/// Array order is ground truth. Elements whose keys are missing, malformed,
/// or out of order get fresh keys between their kept neighbors. No version
/// is bumped: this is the legacy import path, and a locally derived key must
/// not look like a newer edit to peers.
pub fn restore_indices(elements: &[Element], keygen: &KeyGenerator) -> Vec<Element> {
    let mut restored = elements.to_vec();
    let runs = plan_runs(&restored, keygen.charset());
    for (run, keys) in generate_run_keys(runs, keygen) {
        for (offset, key) in keys.into_iter().enumerate() {
            let i = run.start + offset;
            restored[i] = restored[i].clone().with_restored_index(key.into());
        }
    }
    restored
}

// =========================================================================
// Validation
// =========================================================================

/// Sizes of the inputs that produced a list, for violation diagnostics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ValidationContext {
    pub local_elements: Option<usize>,
    pub remote_elements: Option<usize>,
}

impl ValidationContext {
    pub fn reconcile(local: usize, remote: usize) -> Self {
        Self {
            local_elements: Some(local),
            remote_elements: Some(remote),
        }
    }
}

impl fmt::Display for ValidationContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.local_elements, self.remote_elements) {
            (Some(l), Some(r)) => write!(f, " (local={l}, remote={r})"),
            (Some(l), None) => write!(f, " (local={l})"),
            (None, Some(r)) => write!(f, " (remote={r})"),
            (None, None) => Ok(()),
        }
    }
}

/// Check the ordered-list invariant: every element keyed, keys strictly
/// increasing in storage order.
pub fn validate_fractional_indices(elements: &[Element], ctx: &ValidationContext) -> Result<()> {
    let mut prev: Option<(&ElementId, &str)> = None;
    for (position, el) in elements.iter().enumerate() {
        let Some(key) = el.index_str() else {
            return Err(CrdtError::InvariantViolation {
                position,
                reason: format!("element {} has no position key{ctx}", el.id()),
            });
        };
        if let Some((prev_id, prev_key)) = prev
            && prev_key >= key
        {
            return Err(CrdtError::InvariantViolation {
                position,
                reason: format!(
                    "key {prev_key:?} of {prev_id} is not below key {key:?} of {}{ctx}",
                    el.id()
                ),
            });
        }
        prev = Some((el.id(), key));
    }
    Ok(())
}

// =========================================================================
// Tests
// =========================================================================
