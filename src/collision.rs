//! Collision detection: which drop target is under the dragged item.
//!
//! The presentation layer registers one [`Droppable`] per rendered bucket,
//! per rendered link card, and for the trash zone, each with its measured
//! rectangle. [`detect`] runs once per pointer frame and resolves a single
//! [`DropTarget`]:
//!
//! 1. Dragging a bucket: only bucket droppables compete, nearest center wins.
//! 2. Otherwise droppables under the pointer compete (tightest first); if the
//!    pointer is over nothing, droppables overlapping the dragged rectangle
//!    compete (largest overlap first).
//! 3. The trash zone is terminal.
//! 4. A non-empty bucket is refined to its nearest link card, skipping the
//!    dragged link, so the caller gets an insertion point rather than "somewhere
//!    in this bucket".
//!
//! Ties are broken in favour of the previous stable target, then registration
//! order, so equally plausible pointer positions never make the target flap.

#[cfg(test)]
#[path = "collision_test.rs"]
mod collision_test;

use std::cmp::Ordering;

use crate::buckets::Buckets;
use crate::consts::DISTANCE_EPSILON;
use crate::drag::DragItem;
use crate::geometry::{Point, Rect};
use crate::issue::{BucketId, LinkId};

/// Overlap ratios closer than this are treated as equal.
const RATIO_EPSILON: f64 = 1e-9;

/// Registration key of a rendered drop zone.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DroppableId {
    Trash,
    Bucket(BucketId),
    Item(LinkId),
}

/// A rendered drop zone and its measured bounds.
#[derive(Debug, Clone, PartialEq)]
pub struct Droppable {
    pub id: DroppableId,
    pub rect: Rect,
}

/// Resolved drop target for one frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DropTarget {
    /// The trash zone.
    Trash,
    /// A bucket as a whole: empty, or only holding the dragged link.
    BucketEdge(BucketId),
    /// A specific link card inside a bucket.
    Item { bucket: BucketId, id: LinkId },
}

impl DropTarget {
    /// The bucket this target belongs to, if any.
    #[must_use]
    pub fn bucket(&self) -> Option<&BucketId> {
        match self {
            Self::Trash => None,
            Self::BucketEdge(bucket) | Self::Item { bucket, .. } => Some(bucket),
        }
    }

    fn droppable_id(&self) -> DroppableId {
        match self {
            Self::Trash => DroppableId::Trash,
            Self::BucketEdge(bucket) => DroppableId::Bucket(bucket.clone()),
            Self::Item { id, .. } => DroppableId::Item(id.clone()),
        }
    }
}

/// Pointer state for one frame of a drag gesture.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DragFrame {
    /// Pointer position, when the input device reports one.
    pub pointer: Option<Point>,
    /// Current (translated) bounds of the dragged item.
    pub rect: Rect,
}

impl DragFrame {
    /// Vertical coordinate used to decide before/after insertion.
    #[must_use]
    pub fn probe_y(&self) -> f64 {
        self.pointer.map_or_else(|| self.rect.center().y, |p| p.y)
    }
}

/// Droppables registered for the current frame, in registration order.
#[derive(Debug, Clone, Default)]
pub struct Layout {
    droppables: Vec<Droppable>,
}

impl Layout {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register or re-measure a droppable.
    pub fn register(&mut self, id: DroppableId, rect: Rect) {
        if let Some(existing) = self.droppables.iter_mut().find(|d| d.id == id) {
            existing.rect = rect;
        } else {
            self.droppables.push(Droppable { id, rect });
        }
    }

    pub fn unregister(&mut self, id: &DroppableId) {
        self.droppables.retain(|d| &d.id != id);
    }

    #[must_use]
    pub fn rect(&self, id: &DroppableId) -> Option<Rect> {
        self.droppables.iter().find(|d| &d.id == id).map(|d| d.rect)
    }

    #[must_use]
    pub fn item_rect(&self, id: &LinkId) -> Option<Rect> {
        self.droppables
            .iter()
            .find(|d| matches!(&d.id, DroppableId::Item(item) if item == id))
            .map(|d| d.rect)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Droppable> {
        self.droppables.iter()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.droppables.is_empty()
    }
}

/// Resolve the drop target for one frame. `None` means nothing qualified;
/// the caller decides whether to fall back to its last stable target.
#[must_use]
pub fn detect(
    active: &DragItem,
    frame: &DragFrame,
    layout: &Layout,
    buckets: &Buckets,
    last_stable: Option<&DropTarget>,
) -> Option<DropTarget> {
    let preferred = last_stable.map(DropTarget::droppable_id);
    let center = frame.rect.center();

    if let DragItem::Bucket(_) = active {
        let scored: Vec<(&Droppable, f64)> = layout
            .iter()
            .filter(|d| matches!(d.id, DroppableId::Bucket(_)))
            .map(|d| (d, d.rect.center().distance(center)))
            .collect();
        return match pick(&scored, Rank::Lowest, preferred.as_ref())?.id.clone() {
            DroppableId::Bucket(bucket) => Some(DropTarget::BucketEdge(bucket)),
            _ => None,
        };
    }

    let first = pointer_within(frame, layout, preferred.as_ref())
        .or_else(|| rect_intersection(frame, layout, preferred.as_ref()))?;

    match &first.id {
        DroppableId::Trash => Some(DropTarget::Trash),
        DroppableId::Item(id) => buckets
            .bucket_of(id)
            .map(|bucket| DropTarget::Item { bucket: bucket.clone(), id: id.clone() }),
        DroppableId::Bucket(bucket) => {
            let links = buckets.links(bucket)?;
            if links.is_empty() {
                return Some(DropTarget::BucketEdge(bucket.clone()));
            }
            Some(
                nearest_item(active, center, links, layout, preferred.as_ref())
                    .map_or_else(
                        || DropTarget::BucketEdge(bucket.clone()),
                        |id| DropTarget::Item { bucket: bucket.clone(), id },
                    ),
            )
        }
    }
}

// =============================================================================
// STRATEGIES
// =============================================================================

fn pointer_within<'a>(frame: &DragFrame, layout: &'a Layout, preferred: Option<&DroppableId>) -> Option<&'a Droppable> {
    let pointer = frame.pointer?;
    let scored: Vec<(&Droppable, f64)> = layout
        .iter()
        .filter(|d| d.rect.contains(pointer))
        .map(|d| (d, d.rect.mean_corner_distance(pointer)))
        .collect();
    pick(&scored, Rank::Lowest, preferred)
}

fn rect_intersection<'a>(
    frame: &DragFrame,
    layout: &'a Layout,
    preferred: Option<&DroppableId>,
) -> Option<&'a Droppable> {
    let scored: Vec<(&Droppable, f64)> = layout
        .iter()
        .map(|d| (d, d.rect.intersection_ratio(&frame.rect)))
        .filter(|(_, ratio)| *ratio > 0.0)
        .collect();
    pick(&scored, Rank::Highest, preferred)
}

fn nearest_item(
    active: &DragItem,
    center: Point,
    links: &[LinkId],
    layout: &Layout,
    preferred: Option<&DroppableId>,
) -> Option<LinkId> {
    let active_link = active.link_id();
    let candidates: Vec<Droppable> = links
        .iter()
        .filter(|id| Some(*id) != active_link)
        .filter_map(|id| {
            layout
                .item_rect(id)
                .map(|rect| Droppable { id: DroppableId::Item(id.clone()), rect })
        })
        .collect();
    let scored: Vec<(&Droppable, f64)> = candidates
        .iter()
        .map(|d| (d, d.rect.center().distance(center)))
        .collect();
    match &pick(&scored, Rank::Lowest, preferred)?.id {
        DroppableId::Item(id) => Some(id.clone()),
        _ => None,
    }
}

// =============================================================================
// RANKING
// =============================================================================

#[derive(Clone, Copy)]
enum Rank {
    Lowest,
    Highest,
}

/// Best-scoring candidate. Among candidates tied with the best, the preferred
/// one wins, otherwise the earliest registered.
fn pick<'a>(scored: &[(&'a Droppable, f64)], rank: Rank, preferred: Option<&DroppableId>) -> Option<&'a Droppable> {
    let better = |a: f64, b: f64| match rank {
        Rank::Lowest => a.partial_cmp(&b),
        Rank::Highest => b.partial_cmp(&a),
    };
    let best = scored
        .iter()
        .map(|(_, score)| *score)
        .min_by(|a, b| better(*a, *b).unwrap_or(Ordering::Equal))?;
    let tolerance = match rank {
        Rank::Lowest => DISTANCE_EPSILON,
        Rank::Highest => RATIO_EPSILON,
    };
    let mut tied = scored.iter().filter(|(_, score)| (score - best).abs() <= tolerance);
    let first = tied.clone().next().map(|(d, _)| *d);
    tied.find(|(d, _)| Some(&d.id) == preferred)
        .map(|(d, _)| *d)
        .or(first)
}
