//! Identity resolver: temporary link ids and their server-assigned successors.
//!
//! DESIGN
//! ======
//! A link created locally gets a temporary id right away so the curator can
//! keep working with it (edit it, drag it, delete it) before the server
//! answers. When the create mutation resolves, [`IdentityMap::resolve`] records
//! `temp -> real` and migrates every piece of state keyed by the temporary id
//! through the [`Rekey`] seam in one step, so no reader ever sees both keys.
//!
//! Mappings are never removed. Late callers holding a temporary id still
//! land on the right link through [`IdentityMap::canonical`].

#[cfg(test)]
#[path = "identity_test.rs"]
mod identity_test;

use std::collections::HashMap;

use tracing::{debug, info};

use crate::issue::{BucketId, LinkId};

/// State keyed by link id that must follow a temporary id to its resolved id.
pub trait Rekey {
    /// Move everything stored under `from` to `to`. Must leave nothing under `from`.
    fn rekey(&mut self, from: &LinkId, to: &LinkId);
}

/// An optimistic creation in flight.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingCreate {
    /// Local id the link is known by until the server answers.
    pub temp_id: LinkId,
    /// Validated URL sent with the create mutation.
    pub url: String,
    /// Exactly what the curator typed, restored on failure for a retry.
    pub input: String,
    /// Bucket the optimistic entry was placed in.
    pub bucket: BucketId,
}

/// Table from temporary id to resolved id.
#[derive(Debug, Default)]
pub struct IdentityMap {
    resolved: HashMap<LinkId, LinkId>,
}

impl IdentityMap {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a temporary id for a link about to be created optimistically.
    #[must_use]
    pub fn allocate(&self) -> LinkId {
        let id = LinkId::temporary();
        debug!(temp_id = %id, "allocated temporary link id");
        id
    }

    /// The id callers should use for `id`: its resolved id if one is known.
    #[must_use]
    pub fn canonical(&self, id: &LinkId) -> LinkId {
        self.resolved.get(id).cloned().unwrap_or_else(|| id.clone())
    }

    /// Resolved id for a temporary id, if the server has answered.
    #[must_use]
    pub fn resolved(&self, temp: &LinkId) -> Option<&LinkId> {
        self.resolved.get(temp)
    }

    /// Whether `id` is temporary and still waiting for the server.
    #[must_use]
    pub fn is_pending(&self, id: &LinkId) -> bool {
        id.is_temporary() && !self.resolved.contains_key(id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.resolved.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.resolved.is_empty()
    }

    /// Record `temp -> real` and migrate every target keyed by `temp`.
    ///
    /// Resolving an id that is already resolved to the same value is a no-op;
    /// returns false in that case and when `temp` is not a temporary id.
    pub fn resolve(&mut self, temp: &LinkId, real: &LinkId, targets: &mut [&mut dyn Rekey]) -> bool {
        if !temp.is_temporary() || self.resolved.get(temp) == Some(real) {
            return false;
        }
        self.resolved.insert(temp.clone(), real.clone());
        for target in targets.iter_mut() {
            target.rekey(temp, real);
        }
        info!(temp_id = %temp, link_id = %real, "link id resolved");
        true
    }
}

impl Rekey for crate::buckets::Buckets {
    fn rekey(&mut self, from: &LinkId, to: &LinkId) {
        if self.contains(to) {
            self.remove_link(from);
        } else {
            self.rename_link(from, to);
        }
    }
}
