//! Drag controller: the transient state of one drag gesture.
//!
//! A gesture runs `start -> (detect + over)* -> end | cancel`. While it is
//! open the controller owns a deep copy of the bucket layout taken at start;
//! `over` reshuffles the live layout so the dragged card follows the pointer
//! across buckets, `end` applies the release target and compares against the
//! start copy to decide what the curator actually did, and `cancel` puts the
//! start copy back verbatim.
//!
//! Nothing here writes to the edit buffer. `end` reports a [`DragOutcome`] and
//! the editor turns that into buffered intent.

#[cfg(test)]
#[path = "drag_test.rs"]
mod drag_test;

use tracing::debug;

use crate::buckets::Buckets;
use crate::collision::{self, DragFrame, DropTarget, Layout};
use crate::geometry::Rect;
use crate::identity::Rekey;
use crate::issue::{BucketId, LinkId, Submission};

/// What is being dragged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DragItem {
    /// A link card from one of the buckets.
    Link(LinkId),
    /// A whole topic bucket.
    Bucket(BucketId),
    /// An external suggestion that is not part of the bucket model yet.
    Submission(Submission),
}

impl DragItem {
    #[must_use]
    pub fn link_id(&self) -> Option<&LinkId> {
        match self {
            Self::Link(id) => Some(id),
            _ => None,
        }
    }
}

/// What a finished gesture amounted to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DragOutcome {
    /// Dropped nowhere useful, or back where it started.
    Nothing,
    /// A link was dropped on the trash.
    Deleted(LinkId),
    /// A link ended in a different bucket than it started in.
    Moved { id: LinkId, from: BucketId, to: BucketId },
    /// A link changed position inside its starting bucket.
    Reordered { id: LinkId, bucket: BucketId },
    /// A topic bucket was dropped at a new display index.
    BucketReordered { bucket: BucketId, index: usize },
    /// A submission was dropped into a bucket at `index`.
    SubmissionDropped { submission: Submission, bucket: BucketId, index: usize },
}

#[derive(Debug)]
struct DragSession {
    active: DragItem,
    pre_drag: Buckets,
    last_stable: Option<DropTarget>,
    /// Set by a cross-bucket move; the next frame reuses `last_stable`
    /// while the layout settles.
    recently_moved: bool,
}

#[derive(Debug, Default)]
pub struct DragController {
    session: Option<DragSession>,
}

impl DragController {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // --- Queries ---

    #[must_use]
    pub fn is_dragging(&self) -> bool {
        self.session.is_some()
    }

    #[must_use]
    pub fn active(&self) -> Option<&DragItem> {
        self.session.as_ref().map(|s| &s.active)
    }

    /// Payload of a dragged submission, for the drag overlay.
    #[must_use]
    pub fn submission(&self) -> Option<&Submission> {
        match self.active()? {
            DragItem::Submission(submission) => Some(submission),
            _ => None,
        }
    }

    #[must_use]
    pub fn pre_drag_snapshot(&self) -> Option<&Buckets> {
        self.session.as_ref().map(|s| &s.pre_drag)
    }

    #[must_use]
    pub fn last_stable_target(&self) -> Option<&DropTarget> {
        self.session.as_ref()?.last_stable.as_ref()
    }

    // --- Gesture ---

    /// Open a gesture. A gesture already in flight is abandoned without restoring.
    pub fn start(&mut self, item: DragItem, buckets: &Buckets) {
        if let Some(previous) = &self.session {
            debug!(active = ?previous.active, "drag restarted before previous gesture ended");
        }
        debug!(?item, "drag start");
        self.session = Some(DragSession { active: item, pre_drag: buckets.clone(), last_stable: None, recently_moved: false });
    }

    /// Run collision detection for one frame. Falls back to the last stable
    /// target when nothing qualifies or a cross-bucket move is still settling.
    pub fn detect(&mut self, frame: &DragFrame, layout: &Layout, buckets: &Buckets) -> Option<DropTarget> {
        let session = self.session.as_mut()?;
        if session.recently_moved {
            session.recently_moved = false;
            return session.last_stable.clone();
        }
        match collision::detect(&session.active, frame, layout, buckets, session.last_stable.as_ref()) {
            Some(target) => {
                session.last_stable = Some(target.clone());
                Some(target)
            }
            None => session.last_stable.clone(),
        }
    }

    /// Detection for the release frame. A cross-bucket move still settling
    /// does not apply: the drop lands where the pointer was let go.
    pub fn detect_release(&mut self, frame: &DragFrame, layout: &Layout, buckets: &Buckets) -> Option<DropTarget> {
        if let Some(session) = self.session.as_mut() {
            session.recently_moved = false;
        }
        self.detect(frame, layout, buckets)
    }

    /// Live, visual-only reshuffle: move the dragged link into the target's
    /// bucket when it differs from the link's current bucket.
    pub fn over(&mut self, target: Option<&DropTarget>, frame: &DragFrame, layout: &Layout, buckets: &mut Buckets) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        let (Some(target), DragItem::Link(active)) = (target, &session.active) else {
            return;
        };
        if splice(active, target, frame, layout, buckets) {
            session.recently_moved = true;
        }
    }

    /// Close the gesture and report what it amounted to.
    pub fn end(&mut self, target: Option<&DropTarget>, frame: &DragFrame, layout: &Layout, buckets: &mut Buckets) -> DragOutcome {
        let Some(session) = self.session.take() else {
            return DragOutcome::Nothing;
        };
        let outcome = match session.active {
            DragItem::Link(id) => {
                let crossed = target.is_some_and(|t| splice(&id, t, frame, layout, buckets));
                end_link(id, target, crossed, &session.pre_drag, buckets)
            }
            DragItem::Bucket(bucket) => end_bucket(bucket, target, buckets),
            DragItem::Submission(submission) => end_submission(submission, target, frame, layout, buckets),
        };
        debug!(?outcome, "drag end");
        outcome
    }

    /// Remove every trace of a link that no longer exists from the open
    /// gesture, so a later cancel cannot bring it back.
    pub fn forget(&mut self, id: &LinkId) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        session.pre_drag.remove_link(id);
        if matches!(&session.last_stable, Some(DropTarget::Item { id: over, .. }) if over == id) {
            session.last_stable = None;
        }
    }

    /// Abort the gesture, restoring the layout captured at start.
    pub fn cancel(&mut self, buckets: &mut Buckets) -> bool {
        let Some(session) = self.session.take() else {
            return false;
        };
        debug!(active = ?session.active, "drag cancelled");
        *buckets = session.pre_drag;
        true
    }
}

impl Rekey for DragController {
    fn rekey(&mut self, from: &LinkId, to: &LinkId) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        if session.active.link_id() == Some(from) {
            session.active = DragItem::Link(to.clone());
        }
        session.pre_drag.rekey(from, to);
        session.last_stable = match session.last_stable.take() {
            Some(DropTarget::Item { bucket, id }) if &id == from => Some(DropTarget::Item { bucket, id: to.clone() }),
            other => other,
        };
    }
}

// =============================================================================
// END HANDLERS
// =============================================================================

/// Move `active` into the target's bucket when the live layout holds it
/// elsewhere. Returns true if the link changed buckets.
fn splice(active: &LinkId, target: &DropTarget, frame: &DragFrame, layout: &Layout, buckets: &mut Buckets) -> bool {
    let Some(current) = buckets.bucket_of(active).cloned() else {
        return false;
    };
    let (bucket, index) = match target {
        DropTarget::Trash => return false,
        DropTarget::BucketEdge(bucket) => (bucket, usize::MAX),
        DropTarget::Item { id, .. } if id == active => return false,
        DropTarget::Item { bucket, id } => {
            let Some(over_index) = buckets.index_of(id) else {
                return false;
            };
            (bucket, insertion_index(over_index, layout.item_rect(id), frame))
        }
    };
    if *bucket == current || !buckets.insert_link(bucket, index, active.clone()) {
        return false;
    }
    debug!(link_id = %active, from = %current, to = %bucket, "drag crossed buckets");
    true
}

fn end_link(
    id: LinkId,
    target: Option<&DropTarget>,
    crossed: bool,
    pre_drag: &Buckets,
    buckets: &mut Buckets,
) -> DragOutcome {
    if matches!(target, Some(DropTarget::Trash)) {
        buckets.remove_link(&id);
        return DragOutcome::Deleted(id);
    }

    // A link spliced in at release already sits at its insertion index.
    if let (false, Some(DropTarget::Item { bucket, id: over })) = (crossed, target) {
        if over != &id && buckets.bucket_of(&id) == Some(bucket) {
            if let (Some(from), Some(to)) = (buckets.index_of(&id), buckets.index_of(over)) {
                buckets.reorder_within(bucket, from, to);
            }
        }
    }

    // Compare against the layout at drag start, not the live layout `over`
    // already rearranged.
    let (Some(from), Some(to)) = (pre_drag.bucket_of(&id).cloned(), buckets.bucket_of(&id).cloned()) else {
        return DragOutcome::Nothing;
    };
    if from != to {
        return DragOutcome::Moved { id, from, to };
    }
    if pre_drag.index_of(&id) != buckets.index_of(&id) {
        return DragOutcome::Reordered { id, bucket: to };
    }
    DragOutcome::Nothing
}

fn end_bucket(bucket: BucketId, target: Option<&DropTarget>, buckets: &mut Buckets) -> DragOutcome {
    let Some(over) = target.and_then(DropTarget::bucket) else {
        return DragOutcome::Nothing;
    };
    let Some(index) = buckets.bucket_index(over) else {
        return DragOutcome::Nothing;
    };
    if buckets.bucket_index(&bucket) == Some(index) || !buckets.move_bucket(&bucket, index) {
        return DragOutcome::Nothing;
    }
    DragOutcome::BucketReordered { bucket, index }
}

fn end_submission(
    submission: Submission,
    target: Option<&DropTarget>,
    frame: &DragFrame,
    layout: &Layout,
    buckets: &Buckets,
) -> DragOutcome {
    let (bucket, index) = match target {
        None | Some(DropTarget::Trash) => return DragOutcome::Nothing,
        Some(DropTarget::BucketEdge(bucket)) => (bucket.clone(), buckets.links(bucket).map_or(0, <[LinkId]>::len)),
        Some(DropTarget::Item { bucket, id }) => {
            let Some(over_index) = buckets.index_of(id) else {
                return DragOutcome::Nothing;
            };
            (bucket.clone(), insertion_index(over_index, layout.item_rect(id), frame))
        }
    };
    DragOutcome::SubmissionDropped { submission, bucket, index }
}

/// Insert before the target card when the probe is above its midpoint,
/// after it otherwise.
fn insertion_index(over_index: usize, over_rect: Option<Rect>, frame: &DragFrame) -> usize {
    match over_rect {
        Some(rect) if frame.probe_y() > rect.mid_y() => over_index + 1,
        _ => over_index,
    }
}
