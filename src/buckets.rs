//! Bucket model: the ordered partition of link ids across containers.
//!
//! One [`Bucket`] exists for the unassigned pool and one per topic. Each holds
//! link ids in display order. The partition invariant (every live link id is
//! in exactly one bucket) is maintained by construction: [`Buckets::rebuild`]
//! drops duplicates, and every mutation below removes before it inserts.

#[cfg(test)]
#[path = "buckets_test.rs"]
mod buckets_test;

use std::collections::HashSet;

use crate::issue::{BucketId, LinkId, Snapshot, TopicId};

/// One container and its links in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bucket {
    pub id: BucketId,
    pub links: Vec<LinkId>,
}

/// Live bucket layout. The unassigned pool comes first, then topics by position.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Buckets {
    entries: Vec<Bucket>,
}

impl Buckets {
    /// Derive the layout from a server snapshot, leaving out deleted ids.
    #[must_use]
    pub fn rebuild(snapshot: &Snapshot, deleted: &HashSet<LinkId>) -> Self {
        let mut seen: HashSet<&LinkId> = HashSet::new();

        let mut entries = Vec::with_capacity(snapshot.issue.topics.len() + 1);
        let unassigned = snapshot
            .unassigned
            .iter()
            .map(|l| &l.id)
            .filter(|id| !deleted.contains(*id) && seen.insert(*id))
            .cloned()
            .collect();
        entries.push(Bucket { id: BucketId::Unassigned, links: unassigned });

        for topic in snapshot.topics_by_position() {
            let links = topic
                .links
                .iter()
                .map(|l| &l.id)
                .filter(|id| !deleted.contains(*id) && seen.insert(*id))
                .cloned()
                .collect();
            entries.push(Bucket { id: BucketId::Topic(topic.id.clone()), links });
        }

        Self { entries }
    }

    // --- Queries ---

    pub fn iter(&self) -> impl Iterator<Item = &Bucket> {
        self.entries.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Links in a bucket, in order.
    #[must_use]
    pub fn links(&self, bucket: &BucketId) -> Option<&[LinkId]> {
        self.entries
            .iter()
            .find(|b| &b.id == bucket)
            .map(|b| b.links.as_slice())
    }

    #[must_use]
    pub fn has_bucket(&self, bucket: &BucketId) -> bool {
        self.entries.iter().any(|b| &b.id == bucket)
    }

    /// The bucket currently holding `id`.
    #[must_use]
    pub fn bucket_of(&self, id: &LinkId) -> Option<&BucketId> {
        self.entries
            .iter()
            .find(|b| b.links.contains(id))
            .map(|b| &b.id)
    }

    /// Index of `id` within its bucket.
    #[must_use]
    pub fn index_of(&self, id: &LinkId) -> Option<usize> {
        self.entries
            .iter()
            .find_map(|b| b.links.iter().position(|l| l == id))
    }

    #[must_use]
    pub fn contains(&self, id: &LinkId) -> bool {
        self.bucket_of(id).is_some()
    }

    /// Total number of link ids across all buckets.
    #[must_use]
    pub fn link_count(&self) -> usize {
        self.entries.iter().map(|b| b.links.len()).sum()
    }

    /// Topic ids in current display order.
    #[must_use]
    pub fn topic_order(&self) -> Vec<TopicId> {
        self.entries
            .iter()
            .filter_map(|b| b.id.topic().cloned())
            .collect()
    }

    /// Position of a bucket in display order.
    #[must_use]
    pub fn bucket_index(&self, bucket: &BucketId) -> Option<usize> {
        self.entries.iter().position(|b| &b.id == bucket)
    }

    // --- Mutations ---

    /// Remove `id` from whichever bucket holds it. Returns where it was.
    pub fn remove_link(&mut self, id: &LinkId) -> Option<(BucketId, usize)> {
        for bucket in &mut self.entries {
            if let Some(index) = bucket.links.iter().position(|l| l == id) {
                bucket.links.remove(index);
                return Some((bucket.id.clone(), index));
            }
        }
        None
    }

    /// Insert `id` into `bucket` at `index` (clamped to the end). Any previous
    /// placement of `id` is removed first. Returns false for unknown buckets.
    pub fn insert_link(&mut self, bucket: &BucketId, index: usize, id: LinkId) -> bool {
        if !self.has_bucket(bucket) {
            return false;
        }
        self.remove_link(&id);
        let Some(target) = self.entries.iter_mut().find(|b| &b.id == bucket) else {
            return false;
        };
        let index = index.min(target.links.len());
        target.links.insert(index, id);
        true
    }

    /// Append `id` to the end of `bucket`.
    pub fn push_link(&mut self, bucket: &BucketId, id: LinkId) -> bool {
        self.insert_link(bucket, usize::MAX, id)
    }

    /// Move a link inside its own bucket from one index to another.
    pub fn reorder_within(&mut self, bucket: &BucketId, from: usize, to: usize) -> bool {
        let Some(target) = self.entries.iter_mut().find(|b| &b.id == bucket) else {
            return false;
        };
        if from >= target.links.len() || to >= target.links.len() {
            return false;
        }
        let id = target.links.remove(from);
        target.links.insert(to, id);
        true
    }

    /// Replace every occurrence of `from` with `to`, keeping its position.
    pub fn rename_link(&mut self, from: &LinkId, to: &LinkId) {
        for bucket in &mut self.entries {
            for id in &mut bucket.links {
                if *id == *from {
                    *id = to.clone();
                }
            }
        }
    }

    /// Move a topic bucket to another display slot. The unassigned pool is
    /// pinned at index 0 and can be neither moved nor displaced.
    pub fn move_bucket(&mut self, bucket: &BucketId, to: usize) -> bool {
        if matches!(bucket, BucketId::Unassigned) || to == 0 {
            return false;
        }
        let Some(from) = self.bucket_index(bucket) else {
            return false;
        };
        if to >= self.entries.len() {
            return false;
        }
        let entry = self.entries.remove(from);
        self.entries.insert(to, entry);
        true
    }
}
