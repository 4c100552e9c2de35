//! Issue editor: the surface the presentation layer talks to.
//!
//! DESIGN
//! ======
//! `IssueEditor` owns one of everything: the last server snapshot, the live
//! bucket layout, the edit buffer, the identity table, the drag controller,
//! the registered drop zones, and the commit state. Every user action is a
//! synchronous method that merges into current state. Network work is split
//! into `begin_*` / `finish_*` pairs so callbacks from in-flight requests can
//! interleave with further edits; the `async` convenience methods simply run
//! both halves around one await.
//!
//! LIFECYCLE
//! =========
//! - Snapshots rebuild the bucket layout, except while a drag is open: then
//!   the newest snapshot waits and is applied when the gesture closes.
//! - A rebuild starts from the snapshot minus buffered deletions, then
//!   re-applies optimistic links still waiting for the server and buffered
//!   moves, so a refetch never visually undoes pending intent. A moved link
//!   keeps the index it had in the outgoing layout.
//! - Discard clears the buffer and rebuilds from the snapshot alone.

#[cfg(test)]
#[path = "editor_test.rs"]
mod editor_test;

use std::collections::HashSet;
use std::sync::Arc;

use futures::future::join_all;
use tracing::{debug, info, warn};

use crate::buckets::Buckets;
use crate::buffer::{EditBuffer, merge_view};
use crate::collision::{DragFrame, DropTarget, Layout};
use crate::commit::{CommitEvent, CommitPlan, CommitReport, CommitState};
use crate::drag::{DragController, DragItem, DragOutcome};
use crate::identity::{IdentityMap, PendingCreate, Rekey};
use crate::issue::{
    BucketId, IssueId, Link, LinkId, LinkPatch, Snapshot, Submission, TopicId, ValidationError, validate_url,
};
use crate::source::{DataSource, QueryCache, QueryKey, SourceError};

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum EditorError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Source(#[from] SourceError),

    #[error("a save is already in flight")]
    SaveInFlight,

    #[error("unknown link: {0}")]
    UnknownLink(LinkId),

    #[error("unknown bucket: {0}")]
    UnknownBucket(BucketId),

    /// A save failed; the message is the one shown to the curator.
    #[error("{0}")]
    Commit(String),
}

/// How an optimistic creation ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreateOutcome {
    Created(LinkId),
    /// The link was removed again. `input` is what the curator typed, for a retry.
    RolledBack { input: String, error: String },
}

/// Result of closing a drag gesture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DragEnd {
    pub outcome: DragOutcome,
    /// Set when a submission drop started an optimistic creation; the caller
    /// completes it with [`IssueEditor::complete_create`].
    pub pending: Option<PendingCreate>,
}

/// One bucket as rendered: links in order with pending edits applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BucketView {
    pub id: BucketId,
    pub title: String,
    pub links: Vec<Link>,
}

// =============================================================================
// EDITOR
// =============================================================================

pub struct IssueEditor {
    issue_id: IssueId,
    cache: QueryCache,
    supports_unassign: bool,
    snapshot: Snapshot,
    /// Newest snapshot that arrived while a drag was open.
    deferred: Option<Snapshot>,
    /// Links created locally that the snapshot does not contain yet, in creation order.
    optimistic: Vec<Link>,
    buckets: Buckets,
    buffer: EditBuffer,
    identity: IdentityMap,
    drag: DragController,
    layout: Layout,
    state: CommitState,
}

impl IssueEditor {
    /// Load `issue_id` from `source` and build the initial layout.
    ///
    /// # Errors
    ///
    /// Returns an error if either snapshot query fails.
    pub async fn open(source: Arc<dyn DataSource>, issue_id: IssueId) -> Result<Self, EditorError> {
        let mut cache = QueryCache::new(source);
        let snapshot = cache.snapshot(&issue_id).await?;
        info!(issue_id = %issue_id, topics = snapshot.issue.topics.len(), "issue loaded");
        Ok(Self::with_cache(cache, snapshot))
    }

    /// Editor over an already fetched snapshot.
    #[must_use]
    pub fn from_snapshot(source: Arc<dyn DataSource>, snapshot: Snapshot) -> Self {
        Self::with_cache(QueryCache::new(source), snapshot)
    }

    fn with_cache(cache: QueryCache, snapshot: Snapshot) -> Self {
        let supports_unassign = cache.source().supports_unassign();
        let buckets = Buckets::rebuild(&snapshot, &HashSet::new());
        Self {
            issue_id: snapshot.issue.id.clone(),
            cache,
            supports_unassign,
            snapshot,
            deferred: None,
            optimistic: Vec::new(),
            buckets,
            buffer: EditBuffer::new(),
            identity: IdentityMap::new(),
            drag: DragController::new(),
            layout: Layout::new(),
            state: CommitState::Clean,
        }
    }

    // --- Queries ---

    #[must_use]
    pub fn issue_id(&self) -> &IssueId {
        &self.issue_id
    }

    #[must_use]
    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    #[must_use]
    pub fn buckets(&self) -> &Buckets {
        &self.buckets
    }

    #[must_use]
    pub fn buffer(&self) -> &EditBuffer {
        &self.buffer
    }

    #[must_use]
    pub fn identity(&self) -> &IdentityMap {
        &self.identity
    }

    #[must_use]
    pub fn state(&self) -> &CommitState {
        &self.state
    }

    /// `edits + deletions + moves`.
    #[must_use]
    pub fn dirty_count(&self) -> usize {
        self.buffer.dirty_count()
    }

    #[must_use]
    pub fn is_saving(&self) -> bool {
        self.state.is_saving()
    }

    /// Message of the last failed save, until a save succeeds or changes are discarded.
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        self.state.error()
    }

    #[must_use]
    pub fn is_dragging(&self) -> bool {
        self.drag.is_dragging()
    }

    #[must_use]
    pub fn drag_submission(&self) -> Option<&Submission> {
        self.drag.submission()
    }

    /// A link as it should be rendered: last server value with pending edits on top.
    #[must_use]
    pub fn link(&self, id: &LinkId) -> Option<Link> {
        let id = self.identity.canonical(id);
        self.base_link(&id).map(|base| merge_view(&base, self.buffer.edit(&id)))
    }

    /// The merged bucket view, in display order.
    #[must_use]
    pub fn view(&self) -> Vec<BucketView> {
        self.buckets
            .iter()
            .map(|bucket| BucketView {
                id: bucket.id.clone(),
                title: self.bucket_title(&bucket.id),
                links: bucket.links.iter().filter_map(|id| self.link(id)).collect(),
            })
            .collect()
    }

    fn bucket_title(&self, bucket: &BucketId) -> String {
        match bucket {
            BucketId::Unassigned => "Unassigned".to_owned(),
            BucketId::Topic(id) => self
                .snapshot
                .issue
                .topics
                .iter()
                .find(|t| &t.id == id)
                .map_or_else(|| id.to_string(), |t| t.title.clone()),
        }
    }

    fn base_link(&self, id: &LinkId) -> Option<Link> {
        self.snapshot
            .link(id)
            .or_else(|| self.optimistic.iter().find(|l| &l.id == id))
            .cloned()
    }

    fn transition(&mut self, event: CommitEvent) {
        let previous = std::mem::take(&mut self.state);
        self.state = previous.on(event);
    }

    fn changed(&mut self) {
        let dirty = !self.buffer.is_empty();
        self.transition(CommitEvent::Changed { dirty });
    }

    // --- Snapshots ---

    /// Take a fresh server snapshot, or hold it back until the open drag closes.
    pub fn apply_snapshot(&mut self, snapshot: Snapshot) {
        if self.drag.is_dragging() {
            debug!("snapshot deferred until drag ends");
            self.deferred = Some(snapshot);
            return;
        }
        self.install(snapshot);
    }

    /// Invalidate the issue and unassigned queries and refetch them.
    ///
    /// # Errors
    ///
    /// Returns an error if either query fails; the current layout is kept.
    pub async fn refresh(&mut self) -> Result<(), EditorError> {
        self.cache.invalidate(&[QueryKey::Issue(self.issue_id.clone()), QueryKey::UnassignedLinks]);
        self.refetch().await
    }

    async fn refetch(&mut self) -> Result<(), EditorError> {
        let snapshot = self.cache.snapshot(&self.issue_id).await?;
        self.apply_snapshot(snapshot);
        Ok(())
    }

    fn install(&mut self, snapshot: Snapshot) {
        self.optimistic.retain(|link| snapshot.link(&link.id).is_none());
        self.snapshot = snapshot;
        self.rebuild();
    }

    fn flush_deferred(&mut self) {
        if let Some(snapshot) = self.deferred.take() {
            self.install(snapshot);
        }
    }

    fn rebuild(&mut self) {
        let mut buckets = Buckets::rebuild(&self.snapshot, self.buffer.deletions());
        for link in &self.optimistic {
            if !buckets.contains(&link.id) && !self.buffer.is_deleted(&link.id) {
                buckets.push_link(&BucketId::Unassigned, link.id.clone());
            }
        }
        // Replay in ascending drop index so each link lands where the curator
        // left it in the outgoing layout; links never placed there go last.
        let mut moves: Vec<(usize, &LinkId, &BucketId)> = self
            .buffer
            .moves()
            .map(|(id, bucket)| (self.placed_index(id, bucket), id, bucket))
            .collect();
        moves.sort();
        for (index, id, bucket) in moves {
            let misplaced = buckets.bucket_of(id).is_some_and(|current| current != bucket);
            if misplaced && buckets.has_bucket(bucket) {
                buckets.insert_link(bucket, index, id.clone());
            }
        }
        debug!(buckets = buckets.len(), links = buckets.link_count(), "bucket layout rebuilt");
        self.buckets = buckets;
    }

    /// Index of `id` inside `bucket` in the current live layout, or the end.
    fn placed_index(&self, id: &LinkId, bucket: &BucketId) -> usize {
        match self.buckets.bucket_of(id) {
            Some(current) if current == bucket => self.buckets.index_of(id).unwrap_or(usize::MAX),
            _ => usize::MAX,
        }
    }

    // --- Edits ---

    /// Merge a partial edit into the pending edit for `id`.
    ///
    /// # Errors
    ///
    /// Returns [`EditorError::UnknownLink`] if no such link is known.
    pub fn set_field(&mut self, id: &LinkId, patch: &LinkPatch) -> Result<(), EditorError> {
        let id = self.identity.canonical(id);
        if self.base_link(&id).is_none() {
            return Err(EditorError::UnknownLink(id));
        }
        if self.buffer.set_field(id, patch) {
            self.changed();
        }
        Ok(())
    }

    /// Mark `id` deleted and take it out of its bucket.
    ///
    /// # Errors
    ///
    /// Returns [`EditorError::UnknownLink`] if the link is not in any bucket.
    pub fn delete_link(&mut self, id: &LinkId) -> Result<(), EditorError> {
        let id = self.identity.canonical(id);
        if self.buckets.remove_link(&id).is_none() {
            return Err(EditorError::UnknownLink(id));
        }
        self.buffer.mark_deleted(id);
        self.changed();
        Ok(())
    }

    /// Move `id` to the end of `to` without a drag gesture. Returns false when
    /// it is already there.
    ///
    /// # Errors
    ///
    /// Returns an error if the link or the bucket is unknown.
    pub fn move_link(&mut self, id: &LinkId, to: &BucketId) -> Result<bool, EditorError> {
        let id = self.identity.canonical(id);
        if !self.buckets.has_bucket(to) {
            return Err(EditorError::UnknownBucket(to.clone()));
        }
        match self.buckets.bucket_of(&id) {
            None => return Err(EditorError::UnknownLink(id)),
            Some(current) if current == to => return Ok(false),
            Some(_) => {}
        }
        self.buckets.push_link(to, id.clone());
        self.buffer.record_move(id, to.clone());
        self.changed();
        Ok(true)
    }

    // --- Optimistic creation ---

    /// Validate `input`, place an optimistic link at the end of `bucket`, and
    /// return what the create mutation needs.
    ///
    /// # Errors
    ///
    /// Returns an error, and changes nothing, if the URL is invalid or the bucket unknown.
    pub fn begin_create_link(&mut self, input: &str, bucket: &BucketId) -> Result<PendingCreate, EditorError> {
        self.place_optimistic(input, bucket, usize::MAX)
    }

    fn place_optimistic(&mut self, input: &str, bucket: &BucketId, index: usize) -> Result<PendingCreate, EditorError> {
        let url = validate_url(input)?;
        if !self.buckets.has_bucket(bucket) {
            return Err(EditorError::UnknownBucket(bucket.clone()));
        }
        let temp_id = self.identity.allocate();
        self.optimistic.push(Link::from_url(temp_id.clone(), url.clone()));
        self.buckets.insert_link(bucket, index, temp_id.clone());
        if bucket.topic().is_some() {
            self.buffer.record_move(temp_id.clone(), bucket.clone());
            self.changed();
        }
        debug!(temp_id = %temp_id, bucket = %bucket, "optimistic link placed");
        Ok(PendingCreate { temp_id, url, input: input.to_owned(), bucket: bucket.clone() })
    }

    /// Apply the create mutation's result: migrate everything keyed by the
    /// temporary id on success, roll the optimistic link back on failure.
    pub fn finish_create_link(&mut self, pending: &PendingCreate, result: Result<LinkId, SourceError>) -> CreateOutcome {
        match result {
            Ok(real) => {
                if let Some(link) = self.optimistic.iter_mut().find(|l| l.id == pending.temp_id) {
                    link.id = real.clone();
                }
                let mut targets: [&mut dyn Rekey; 3] = [&mut self.buckets, &mut self.buffer, &mut self.drag];
                self.identity.resolve(&pending.temp_id, &real, &mut targets);
                CreateOutcome::Created(real)
            }
            Err(error) => {
                warn!(temp_id = %pending.temp_id, url = %pending.url, error = %error, "link creation failed; rolled back");
                self.rollback_create(&pending.temp_id);
                CreateOutcome::RolledBack { input: pending.input.clone(), error: error.to_string() }
            }
        }
    }

    fn rollback_create(&mut self, temp: &LinkId) {
        if self.drag.active().and_then(DragItem::link_id) == Some(temp) {
            self.drag.cancel(&mut self.buckets);
            self.flush_deferred();
        } else {
            self.drag.forget(temp);
        }
        self.optimistic.retain(|link| &link.id != temp);
        self.buckets.remove_link(temp);
        self.buffer.forget(temp);
        self.changed();
    }

    /// Issue the create mutation for `pending` and apply its result.
    pub async fn complete_create(&mut self, pending: PendingCreate) -> CreateOutcome {
        let source = self.cache.source();
        let result = source.create_link(&pending.url).await;
        let outcome = self.finish_create_link(&pending, result);
        if let CreateOutcome::Created(_) = outcome {
            self.cache.invalidate(&[QueryKey::UnassignedLinks, QueryKey::AllLinks]);
            if let Err(error) = self.refetch().await {
                warn!(error = %error, "refetch after link creation failed");
            }
        }
        outcome
    }

    /// Optimistically create a link from `input` in `bucket`.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is rejected before anything is sent.
    pub async fn create_link(&mut self, input: &str, bucket: &BucketId) -> Result<CreateOutcome, EditorError> {
        let pending = self.begin_create_link(input, bucket)?;
        Ok(self.complete_create(pending).await)
    }

    // --- Drag ---

    #[must_use]
    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    /// Drop zones are re-registered by the presentation layer whenever it measures.
    pub fn layout_mut(&mut self) -> &mut Layout {
        &mut self.layout
    }

    pub fn drag_start(&mut self, item: DragItem) {
        let item = match item {
            DragItem::Link(id) => DragItem::Link(self.identity.canonical(&id)),
            other => other,
        };
        self.drag.start(item, &self.buckets);
    }

    /// One pointer frame: resolve the target and reshuffle the live layout.
    pub fn drag_move(&mut self, frame: &DragFrame) -> Option<DropTarget> {
        let target = self.drag.detect(frame, &self.layout, &self.buckets);
        self.drag.over(target.as_ref(), frame, &self.layout, &mut self.buckets);
        target
    }

    /// Close the gesture and buffer what it amounted to. The release frame's
    /// target wins over whatever the live layout last settled on.
    ///
    /// # Errors
    ///
    /// Returns an error if a dropped submission carries an invalid URL. The
    /// gesture is closed either way.
    pub fn drag_end(&mut self, frame: &DragFrame) -> Result<DragEnd, EditorError> {
        let target = self.drag.detect_release(frame, &self.layout, &self.buckets);
        let outcome = self.drag.end(target.as_ref(), frame, &self.layout, &mut self.buckets);
        let pending = self.apply_outcome(&outcome);
        self.flush_deferred();
        Ok(DragEnd { outcome, pending: pending? })
    }

    pub fn drag_cancel(&mut self) {
        if self.drag.cancel(&mut self.buckets) {
            self.flush_deferred();
        }
    }

    fn apply_outcome(&mut self, outcome: &DragOutcome) -> Result<Option<PendingCreate>, EditorError> {
        match outcome {
            DragOutcome::Nothing | DragOutcome::Reordered { .. } | DragOutcome::BucketReordered { .. } => {}
            DragOutcome::Deleted(id) => {
                self.buffer.mark_deleted(self.identity.canonical(id));
                self.changed();
            }
            DragOutcome::Moved { id, to, .. } => {
                self.buffer.record_move(self.identity.canonical(id), to.clone());
                self.changed();
            }
            DragOutcome::SubmissionDropped { submission, bucket, index } => {
                return self.place_optimistic(&submission.url, bucket, *index).map(Some);
            }
        }
        Ok(None)
    }

    // --- Commit ---

    /// Snapshot the buffer into a plan and enter `Saving`.
    ///
    /// # Errors
    ///
    /// Returns [`EditorError::SaveInFlight`] while another save is running.
    pub fn begin_save(&mut self) -> Result<CommitPlan, EditorError> {
        if self.state.is_saving() {
            return Err(EditorError::SaveInFlight);
        }
        let plan = CommitPlan::build(
            &self.buffer,
            &self.snapshot,
            |id| self.base_link(id),
            &self.identity,
            self.supports_unassign,
        );
        self.transition(CommitEvent::SaveStarted);
        Ok(plan)
    }

    /// Apply a settled save. On success clears what `plan` sent; on failure
    /// leaves the buffer untouched and records the message.
    ///
    /// # Errors
    ///
    /// Returns [`EditorError::Commit`] with the curator-facing message when any operation failed.
    pub fn finish_save(&mut self, plan: &CommitPlan, report: &CommitReport) -> Result<(), EditorError> {
        if let Some(message) = report.message() {
            warn!(error = %message, "save failed; pending changes kept");
            self.transition(CommitEvent::SaveFailed(message.clone()));
            return Err(EditorError::Commit(message));
        }
        plan.settle(&mut self.buffer);
        let dirty = !self.buffer.is_empty();
        self.transition(CommitEvent::SaveSucceeded { dirty });
        self.cache
            .invalidate(&[QueryKey::Issue(self.issue_id.clone()), QueryKey::UnassignedLinks, QueryKey::AllLinks]);
        Ok(())
    }

    /// Send every pending change, then refetch.
    ///
    /// # Errors
    ///
    /// Returns an error if a save is already running, any mutation failed, or
    /// the refetch after a successful save failed.
    pub async fn save_all(&mut self) -> Result<(), EditorError> {
        let plan = self.begin_save()?;
        let source = self.cache.source();
        let report = plan.execute(source.as_ref()).await;
        self.finish_save(&plan, &report)?;
        self.refetch().await
    }

    /// Drop every pending change without touching the network.
    ///
    /// # Errors
    ///
    /// Returns [`EditorError::SaveInFlight`] while a save is running.
    pub fn discard_all(&mut self) -> Result<(), EditorError> {
        if self.state.is_saving() {
            return Err(EditorError::SaveInFlight);
        }
        self.drag.cancel(&mut self.buckets);
        let dropped = self.buffer.dirty_count();
        self.buffer.clear();
        match self.deferred.take() {
            Some(snapshot) => self.install(snapshot),
            None => self.rebuild(),
        }
        self.transition(CommitEvent::Discarded);
        info!(dropped, "pending changes discarded");
        Ok(())
    }

    // --- Topics ---

    /// Write the current topic order back as positions, reusing the positions
    /// the topics already had. Returns how many topics were updated.
    ///
    /// # Errors
    ///
    /// Returns the first failed update, after refetching whatever did succeed.
    pub async fn persist_topic_order(&mut self) -> Result<usize, EditorError> {
        let positions: Vec<i64> = self.snapshot.topics_by_position().iter().map(|t| t.position).collect();
        let updates: Vec<(TopicId, i64)> = self
            .buckets
            .topic_order()
            .into_iter()
            .zip(positions)
            .filter(|(id, position)| {
                self.snapshot.issue.topics.iter().any(|t| &t.id == id && t.position != *position)
            })
            .collect();
        if updates.is_empty() {
            return Ok(0);
        }

        info!(topics = updates.len(), "persisting topic order");
        let source = self.cache.source();
        let results =
            join_all(updates.iter().map(|(id, position)| source.update_topic(id, Some(*position)))).await;
        self.after_topic_writes(results.into_iter().find_map(Result::err)).await?;
        Ok(updates.len())
    }

    /// Create a topic in this issue and refetch.
    ///
    /// # Errors
    ///
    /// Returns an error if the mutation or the refetch fails.
    pub async fn create_topic(&mut self, title: &str, issue_comment: Option<&str>) -> Result<TopicId, EditorError> {
        let source = self.cache.source();
        let id = source.create_topic(title, issue_comment, &self.issue_id).await?;
        info!(topic_id = %id, "topic created");
        self.after_topic_writes(None).await?;
        Ok(id)
    }

    /// Detach every topic from this issue ahead of the issue's deletion.
    ///
    /// # Errors
    ///
    /// Returns the first failed detach, after refetching whatever did succeed.
    pub async fn detach_topics_for_deleted_issue(&mut self) -> Result<usize, EditorError> {
        let topics: Vec<TopicId> = self.snapshot.issue.topics.iter().map(|t| t.id.clone()).collect();
        let source = self.cache.source();
        let results = join_all(topics.iter().map(|id| source.update_topic_when_issue_deleted(id))).await;
        self.after_topic_writes(results.into_iter().find_map(Result::err)).await?;
        Ok(topics.len())
    }

    async fn after_topic_writes(&mut self, failure: Option<SourceError>) -> Result<(), EditorError> {
        self.cache.invalidate(&[QueryKey::Issue(self.issue_id.clone())]);
        self.refetch().await?;
        match failure {
            Some(error) => {
                warn!(error = %error, "topic update failed");
                Err(error.into())
            }
            None => Ok(()),
        }
    }
}
