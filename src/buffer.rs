//! Edit buffer: pending field edits, deletions, and moves.
//!
//! DESIGN
//! ======
//! Three independent change sets, each keyed by link id. Writes always merge
//! into what is already buffered (field-level for edits, last destination
//! wins for moves) so callbacks that land out of order never erase each
//! other's work. Nothing here talks to the network; the commit engine reads
//! the buffer and clears what it managed to send.

#[cfg(test)]
#[path = "buffer_test.rs"]
mod buffer_test;

use std::collections::{HashMap, HashSet};

use tracing::debug;

use crate::identity::Rekey;
use crate::issue::{BucketId, Link, LinkId, LinkPatch};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EditBuffer {
    edits: HashMap<LinkId, LinkPatch>,
    deletions: HashSet<LinkId>,
    moves: HashMap<LinkId, BucketId>,
}

impl EditBuffer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // --- Writes ---

    /// Merge a partial edit into whatever is pending for `id`.
    /// Returns false when the patch carries no fields.
    pub fn set_field(&mut self, id: LinkId, patch: &LinkPatch) -> bool {
        if patch.is_empty() {
            return false;
        }
        debug!(link_id = %id, ?patch, "buffered field edit");
        self.edits.entry(id).or_default().merge(patch);
        true
    }

    /// Mark `id` for deletion. Returns false if it was already marked.
    pub fn mark_deleted(&mut self, id: LinkId) -> bool {
        debug!(link_id = %id, "buffered deletion");
        self.deletions.insert(id)
    }

    /// Record `id` as moving to `bucket`, replacing any earlier destination.
    pub fn record_move(&mut self, id: LinkId, bucket: BucketId) {
        debug!(link_id = %id, bucket = %bucket, "buffered move");
        self.moves.insert(id, bucket);
    }

    /// Drop every entry for `id`.
    pub fn forget(&mut self, id: &LinkId) {
        self.edits.remove(id);
        self.deletions.remove(id);
        self.moves.remove(id);
    }

    /// Remove the pending edit for `id` if it still equals `sent`.
    pub fn settle_edit(&mut self, id: &LinkId, sent: &LinkPatch) {
        if self.edits.get(id) == Some(sent) {
            self.edits.remove(id);
        }
    }

    pub fn settle_deletion(&mut self, id: &LinkId) {
        self.deletions.remove(id);
    }

    /// Remove the pending move for `id` if it still targets `sent`.
    pub fn settle_move(&mut self, id: &LinkId, sent: &BucketId) {
        if self.moves.get(id) == Some(sent) {
            self.moves.remove(id);
        }
    }

    pub fn clear(&mut self) {
        self.edits.clear();
        self.deletions.clear();
        self.moves.clear();
    }

    // --- Reads ---

    #[must_use]
    pub fn edit(&self, id: &LinkId) -> Option<&LinkPatch> {
        self.edits.get(id)
    }

    #[must_use]
    pub fn is_deleted(&self, id: &LinkId) -> bool {
        self.deletions.contains(id)
    }

    #[must_use]
    pub fn destination(&self, id: &LinkId) -> Option<&BucketId> {
        self.moves.get(id)
    }

    pub fn edits(&self) -> impl Iterator<Item = (&LinkId, &LinkPatch)> {
        self.edits.iter()
    }

    #[must_use]
    pub fn deletions(&self) -> &HashSet<LinkId> {
        &self.deletions
    }

    pub fn moves(&self) -> impl Iterator<Item = (&LinkId, &BucketId)> {
        self.moves.iter()
    }

    /// Number of pending changes: `edits + deletions + moves`.
    #[must_use]
    pub fn dirty_count(&self) -> usize {
        self.edits.len() + self.deletions.len() + self.moves.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.dirty_count() == 0
    }

    /// Whether any entry is keyed by `id`.
    #[must_use]
    pub fn mentions(&self, id: &LinkId) -> bool {
        self.edits.contains_key(id) || self.deletions.contains(id) || self.moves.contains_key(id)
    }
}

impl Rekey for EditBuffer {
    /// Entries under `from` predate anything already under `to`, so for edits
    /// the `to` fields win and for moves the `to` destination wins.
    fn rekey(&mut self, from: &LinkId, to: &LinkId) {
        if let Some(mut patch) = self.edits.remove(from) {
            if let Some(newer) = self.edits.get(to) {
                patch.merge(newer);
            }
            self.edits.insert(to.clone(), patch);
        }
        if self.deletions.remove(from) {
            self.deletions.insert(to.clone());
        }
        if let Some(bucket) = self.moves.remove(from) {
            self.moves.entry(to.clone()).or_insert(bucket);
        }
    }
}

/// Overlay a pending edit on the last known server value of a link.
#[must_use]
pub fn merge_view(base: &Link, pending: Option<&LinkPatch>) -> Link {
    match pending {
        Some(patch) => patch.apply_to(base),
        None => base.clone(),
    }
}
