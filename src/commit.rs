//! Commit engine: turns the edit buffer into remote mutations.
//!
//! DESIGN
//! ======
//! A save is three phases so the editor never holds a borrow across the
//! network: [`CommitPlan::build`] snapshots what to send, [`CommitPlan::execute`]
//! fires every mutation concurrently and waits for all of them to settle,
//! and [`CommitPlan::settle`] clears exactly the entries that were sent.
//! Writes that land while a save is in flight survive it.
//!
//! A save is all-or-nothing from the curator's point of view: any failure
//! leaves the buffer untouched so a retry re-sends everything. Mutations are
//! idempotent against the server, so re-sending the ones that did go through
//! is harmless.

#[cfg(test)]
#[path = "commit_test.rs"]
mod commit_test;

use futures::future::join_all;
use tracing::{debug, info, warn};

use crate::buffer::{EditBuffer, merge_view};
use crate::identity::IdentityMap;
use crate::issue::{BucketId, Link, LinkId, LinkPatch, Snapshot, TopicId};
use crate::source::{DataSource, SourceError};

// =============================================================================
// STATE MACHINE
// =============================================================================

/// Save state shown to the curator.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum CommitState {
    #[default]
    Clean,
    Dirty,
    Saving,
    /// Last save failed; the buffer still holds everything.
    Failed { message: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitEvent {
    /// The buffer changed; `dirty` is whether it now holds anything.
    Changed { dirty: bool },
    SaveStarted,
    /// All mutations succeeded; `dirty` is whether newer writes remain.
    SaveSucceeded { dirty: bool },
    SaveFailed(String),
    Discarded,
}

impl CommitState {
    #[must_use]
    pub fn on(self, event: CommitEvent) -> Self {
        match (self, event) {
            (Self::Saving, CommitEvent::SaveSucceeded { dirty }) => Self::settled(dirty),
            (Self::Saving, CommitEvent::SaveFailed(message)) => Self::Failed { message },
            (Self::Saving, _) | (_, CommitEvent::SaveStarted) => Self::Saving,
            (state, CommitEvent::SaveSucceeded { .. } | CommitEvent::SaveFailed(_)) => state,
            (Self::Failed { message }, CommitEvent::Changed { dirty: true }) => Self::Failed { message },
            (_, CommitEvent::Changed { dirty }) => Self::settled(dirty),
            (_, CommitEvent::Discarded) => Self::Clean,
        }
    }

    fn settled(dirty: bool) -> Self {
        if dirty { Self::Dirty } else { Self::Clean }
    }

    #[must_use]
    pub fn is_saving(&self) -> bool {
        matches!(self, Self::Saving)
    }

    #[must_use]
    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Failed { message } => Some(message),
            _ => None,
        }
    }
}

// =============================================================================
// PLAN
// =============================================================================

/// One remote mutation of a save.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    /// Full-record update. `sent` is the buffered patch it was built from.
    UpdateLink { record: Link, sent: LinkPatch },
    DeleteLink(LinkId),
    AssignToTopic { id: LinkId, topic: TopicId },
    RemoveFromTopic { id: LinkId, topic: TopicId },
}

impl Operation {
    #[must_use]
    pub fn link_id(&self) -> &LinkId {
        match self {
            Self::UpdateLink { record, .. } => &record.id,
            Self::DeleteLink(id) | Self::AssignToTopic { id, .. } | Self::RemoveFromTopic { id, .. } => id,
        }
    }

    async fn send(&self, source: &dyn DataSource) -> Result<(), SourceError> {
        match self {
            Self::UpdateLink { record, .. } => {
                source.update_link(&record.id, &record.title, &record.text, &record.url).await?;
            }
            Self::DeleteLink(id) => {
                source.delete_link(id).await?;
            }
            Self::AssignToTopic { id, topic } => {
                source.add_link_to_topic(id, topic).await?;
            }
            Self::RemoveFromTopic { id, topic } => {
                source.remove_link_from_topic(id, topic).await?;
            }
        }
        Ok(())
    }
}

/// Buffered entries a save clears without a remote call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Settled {
    /// Edit of a link that is being deleted anyway.
    SupersededEdit { id: LinkId, sent: LinkPatch },
    /// Move of a link that is being deleted anyway.
    SupersededMove { id: LinkId, bucket: BucketId },
    /// The server already has the link in this bucket.
    AlreadyThere { id: LinkId, bucket: BucketId },
    /// Move to the unassigned pool on a backend that cannot express it.
    UnassignUnsupported(LinkId),
}

/// Everything one save will send.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommitPlan {
    pub operations: Vec<Operation>,
    pub settled: Vec<Settled>,
    /// Entries held back because their link has no server id yet.
    pub held: Vec<LinkId>,
}

impl CommitPlan {
    /// Snapshot the buffer into a plan. `base` looks up the last known server
    /// record of a link, including optimistic links not yet in `snapshot`.
    pub fn build(
        buffer: &EditBuffer,
        snapshot: &Snapshot,
        base: impl Fn(&LinkId) -> Option<Link>,
        identity: &IdentityMap,
        supports_unassign: bool,
    ) -> Self {
        let mut plan = Self::default();
        let hold = |plan: &mut Self, id: &LinkId| -> bool {
            if identity.is_pending(id) {
                if !plan.held.contains(id) {
                    plan.held.push(id.clone());
                }
                return true;
            }
            false
        };

        let mut deletions: Vec<&LinkId> = buffer.deletions().iter().collect();
        deletions.sort();
        for id in deletions {
            if !hold(&mut plan, id) {
                plan.operations.push(Operation::DeleteLink(id.clone()));
            }
        }

        let mut edits: Vec<(&LinkId, &LinkPatch)> = buffer.edits().collect();
        edits.sort_by(|a, b| a.0.cmp(b.0));
        for (id, patch) in edits {
            if hold(&mut plan, id) {
                continue;
            }
            if buffer.is_deleted(id) {
                plan.settled.push(Settled::SupersededEdit { id: id.clone(), sent: patch.clone() });
                continue;
            }
            let Some(link) = base(id) else {
                warn!(link_id = %id, "edit for unknown link held back");
                plan.held.push(id.clone());
                continue;
            };
            plan.operations.push(Operation::UpdateLink { record: merge_view(&link, Some(patch)), sent: patch.clone() });
        }

        let mut moves: Vec<(&LinkId, &BucketId)> = buffer.moves().collect();
        moves.sort_by(|a, b| a.0.cmp(b.0));
        for (id, bucket) in moves {
            if hold(&mut plan, id) {
                continue;
            }
            if buffer.is_deleted(id) {
                plan.settled.push(Settled::SupersededMove { id: id.clone(), bucket: bucket.clone() });
                continue;
            }
            let current = snapshot.bucket_of(id);
            if current.as_ref() == Some(bucket) {
                plan.settled.push(Settled::AlreadyThere { id: id.clone(), bucket: bucket.clone() });
                continue;
            }
            match bucket {
                BucketId::Topic(topic) => {
                    plan.operations.push(Operation::AssignToTopic { id: id.clone(), topic: topic.clone() });
                }
                BucketId::Unassigned => match current.as_ref().and_then(BucketId::topic) {
                    Some(topic) if supports_unassign => {
                        plan.operations.push(Operation::RemoveFromTopic { id: id.clone(), topic: topic.clone() });
                    }
                    _ => {
                        warn!(link_id = %id, "move to unassigned cannot be saved on this backend; dropping it");
                        plan.settled.push(Settled::UnassignUnsupported(id.clone()));
                    }
                },
            }
        }

        debug!(
            operations = plan.operations.len(),
            settled = plan.settled.len(),
            held = plan.held.len(),
            "commit plan built"
        );
        plan
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty() && self.settled.is_empty()
    }

    /// Send every operation concurrently and wait for all of them.
    pub async fn execute(&self, source: &dyn DataSource) -> CommitReport {
        info!(operations = self.operations.len(), "commit started");
        let results = join_all(self.operations.iter().map(|op| op.send(source))).await;
        let failures: Vec<(LinkId, SourceError)> = self
            .operations
            .iter()
            .zip(results)
            .filter_map(|(op, result)| result.err().map(|e| (op.link_id().clone(), e)))
            .collect();
        let report = CommitReport { attempted: self.operations.len(), failures };
        if report.is_success() {
            info!(operations = report.attempted, "commit succeeded");
        } else {
            warn!(failed = report.failures.len(), attempted = report.attempted, "commit failed");
        }
        report
    }

    /// Clear the buffered entries this plan sent or resolved without sending.
    /// Entries written after the plan was built are left alone.
    pub fn settle(&self, buffer: &mut EditBuffer) {
        for op in &self.operations {
            match op {
                Operation::UpdateLink { record, sent } => buffer.settle_edit(&record.id, sent),
                Operation::DeleteLink(id) => buffer.settle_deletion(id),
                Operation::AssignToTopic { id, topic } => buffer.settle_move(id, &BucketId::Topic(topic.clone())),
                Operation::RemoveFromTopic { id, .. } => buffer.settle_move(id, &BucketId::Unassigned),
            }
        }
        for entry in &self.settled {
            match entry {
                Settled::SupersededEdit { id, sent } => buffer.settle_edit(id, sent),
                Settled::SupersededMove { id, bucket } | Settled::AlreadyThere { id, bucket } => {
                    buffer.settle_move(id, bucket);
                }
                Settled::UnassignUnsupported(id) => buffer.settle_move(id, &BucketId::Unassigned),
            }
        }
    }
}

// =============================================================================
// REPORT
// =============================================================================

/// Aggregate result of one save.
#[derive(Debug, Clone)]
pub struct CommitReport {
    pub attempted: usize,
    pub failures: Vec<(LinkId, SourceError)>,
}

impl CommitReport {
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    /// Single human-readable message for the curator, `None` on success.
    #[must_use]
    pub fn message(&self) -> Option<String> {
        let (id, first) = self.failures.first()?;
        Some(format!(
            "{} of {} changes failed to save (link {id}: {first})",
            self.failures.len(),
            self.attempted
        ))
    }
}
