use std::collections::HashSet;

use super::*;
use crate::issue::{Issue, IssueId, Link, Snapshot, Topic, TopicId};

// =============================================================
// Helpers
// =============================================================

const COLUMN_WIDTH: f64 = 200.0;
const COLUMN_GAP: f64 = 100.0;
const CARD_HEIGHT: f64 = 40.0;
const CARD_STRIDE: f64 = 50.0;

fn link(id: &str) -> Link {
    Link::from_url(LinkId::from(id), "https://example.com")
}

/// Buckets laid out as columns left to right, cards stacked top to bottom,
/// trash below the first column.
fn fixture(unassigned: &[&str], topics: &[(&str, &[&str])]) -> (Buckets, Layout) {
    let snap = Snapshot {
        issue: Issue {
            id: IssueId::new("I1"),
            title: "t".into(),
            comment: None,
            topics: topics
                .iter()
                .enumerate()
                .map(|(i, (id, links))| Topic {
                    id: TopicId::from(*id),
                    title: (*id).into(),
                    position: i64::try_from(i).unwrap(),
                    links: links.iter().map(|l| link(l)).collect(),
                })
                .collect(),
        },
        unassigned: unassigned.iter().map(|l| link(l)).collect(),
    };
    let buckets = Buckets::rebuild(&snap, &HashSet::new());
    let mut layout = Layout::new();
    for (col, bucket) in buckets.iter().enumerate() {
        let x = col as f64 * (COLUMN_WIDTH + COLUMN_GAP);
        layout.register(DroppableId::Bucket(bucket.id.clone()), Rect::new(x, 0.0, COLUMN_WIDTH, 600.0));
        for (row, id) in bucket.links.iter().enumerate() {
            let y = 10.0 + row as f64 * CARD_STRIDE;
            layout.register(DroppableId::Item(id.clone()), Rect::new(x + 10.0, y, COLUMN_WIDTH - 20.0, CARD_HEIGHT));
        }
    }
    layout.register(DroppableId::Trash, Rect::new(0.0, 700.0, COLUMN_WIDTH, 100.0));
    (buckets, layout)
}

fn frame_at(x: f64, y: f64) -> DragFrame {
    DragFrame { pointer: Some(Point::new(x, y)), rect: Rect::new(x - 90.0, y - 20.0, 180.0, CARD_HEIGHT) }
}

fn dragging(id: &str) -> DragItem {
    DragItem::Link(LinkId::from(id))
}

fn t(id: &str) -> BucketId {
    BucketId::Topic(TopicId::from(id))
}

// =============================================================
// Pointer-within
// =============================================================

#[test]
fn pointer_over_card_targets_that_card() {
    let (buckets, layout) = fixture(&["L1"], &[("T1", &["L2", "L3"])]);
    let target = detect(&dragging("L1"), &frame_at(400.0, 80.0), &layout, &buckets, None);
    assert_eq!(target, Some(DropTarget::Item { bucket: t("T1"), id: LinkId::from("L3") }));
}

#[test]
fn pointer_over_bucket_gap_refines_to_nearest_card() {
    let (buckets, layout) = fixture(&["L1"], &[("T1", &["L2", "L3"])]);
    // Below the last card, still inside the T1 column.
    let target = detect(&dragging("L1"), &frame_at(400.0, 300.0), &layout, &buckets, None);
    assert_eq!(target, Some(DropTarget::Item { bucket: t("T1"), id: LinkId::from("L3") }));
}

#[test]
fn pointer_over_empty_bucket_targets_bucket_edge() {
    let (buckets, layout) = fixture(&["L1"], &[("T1", &[])]);
    let target = detect(&dragging("L1"), &frame_at(400.0, 300.0), &layout, &buckets, None);
    assert_eq!(target, Some(DropTarget::BucketEdge(t("T1"))));
}

#[test]
fn refinement_skips_the_dragged_card() {
    let (buckets, layout) = fixture(&["L1"], &[]);
    let target = detect(&dragging("L1"), &frame_at(100.0, 300.0), &layout, &buckets, None);
    assert_eq!(target, Some(DropTarget::BucketEdge(BucketId::Unassigned)));
}

#[test]
fn trash_is_terminal() {
    let (buckets, layout) = fixture(&["L1"], &[]);
    let target = detect(&dragging("L1"), &frame_at(100.0, 750.0), &layout, &buckets, None);
    assert_eq!(target, Some(DropTarget::Trash));
}

// =============================================================
// Rect-intersection fallback
// =============================================================

#[test]
fn falls_back_to_intersection_when_pointer_is_outside() {
    let (buckets, layout) = fixture(&["L1"], &[("T1", &[])]);
    // Pointer in the gap between columns, dragged card mostly over T1.
    let frame = DragFrame { pointer: Some(Point::new(250.0, 300.0)), rect: Rect::new(260.0, 280.0, 180.0, 40.0) };
    let target = detect(&dragging("L1"), &frame, &layout, &buckets, None);
    assert_eq!(target, Some(DropTarget::BucketEdge(t("T1"))));
}

#[test]
fn nothing_under_pointer_or_rect_yields_none() {
    let (buckets, layout) = fixture(&["L1"], &[]);
    let frame = DragFrame { pointer: Some(Point::new(5000.0, 5000.0)), rect: Rect::new(4900.0, 4980.0, 180.0, 40.0) };
    assert_eq!(detect(&dragging("L1"), &frame, &layout, &buckets, None), None);
}

#[test]
fn no_pointer_uses_rect_only() {
    let (buckets, layout) = fixture(&["L1"], &[("T1", &[])]);
    let frame = DragFrame { pointer: None, rect: Rect::new(320.0, 100.0, 160.0, 40.0) };
    assert_eq!(detect(&dragging("L1"), &frame, &layout, &buckets, None), Some(DropTarget::BucketEdge(t("T1"))));
}

// =============================================================
// Bucket drags
// =============================================================

#[test]
fn dragging_bucket_considers_only_buckets() {
    let (buckets, layout) = fixture(&["L1"], &[("T1", &["L2"]), ("T2", &[])]);
    let frame = DragFrame { pointer: Some(Point::new(400.0, 30.0)), rect: Rect::new(560.0, 0.0, 200.0, 600.0) };
    let target = detect(&DragItem::Bucket(t("T1")), &frame, &layout, &buckets, None);
    assert_eq!(target, Some(DropTarget::BucketEdge(t("T2"))));
}

// =============================================================
// Tie stability
// =============================================================

#[test]
fn ties_prefer_registration_order_without_history() {
    let mut layout = Layout::new();
    let (buckets, _) = fixture(&[], &[("T1", &[]), ("T2", &[])]);
    layout.register(DroppableId::Bucket(t("T1")), Rect::new(0.0, 0.0, 100.0, 100.0));
    layout.register(DroppableId::Bucket(t("T2")), Rect::new(0.0, 0.0, 100.0, 100.0));
    let target = detect(&dragging("X"), &frame_at(50.0, 50.0), &layout, &buckets, None);
    assert_eq!(target, Some(DropTarget::BucketEdge(t("T1"))));
}

#[test]
fn ties_prefer_last_stable_target() {
    let mut layout = Layout::new();
    let (buckets, _) = fixture(&[], &[("T1", &[]), ("T2", &[])]);
    layout.register(DroppableId::Bucket(t("T1")), Rect::new(0.0, 0.0, 100.0, 100.0));
    layout.register(DroppableId::Bucket(t("T2")), Rect::new(0.0, 0.0, 100.0, 100.0));
    let last = DropTarget::BucketEdge(t("T2"));
    let target = detect(&dragging("X"), &frame_at(50.0, 50.0), &layout, &buckets, Some(&last));
    assert_eq!(target, Some(last));
}

// =============================================================
// Layout registry
// =============================================================

#[test]
fn register_replaces_existing_rect() {
    let mut layout = Layout::new();
    layout.register(DroppableId::Trash, Rect::new(0.0, 0.0, 1.0, 1.0));
    layout.register(DroppableId::Trash, Rect::new(5.0, 5.0, 1.0, 1.0));
    assert_eq!(layout.iter().count(), 1);
    assert_eq!(layout.rect(&DroppableId::Trash), Some(Rect::new(5.0, 5.0, 1.0, 1.0)));
    layout.unregister(&DroppableId::Trash);
    assert!(layout.is_empty());
}

#[test]
fn drop_target_bucket_accessor() {
    assert_eq!(DropTarget::Trash.bucket(), None);
    assert_eq!(DropTarget::BucketEdge(t("T1")).bucket(), Some(&t("T1")));
    assert_eq!(DropTarget::Item { bucket: t("T2"), id: LinkId::from("L") }.bucket(), Some(&t("T2")));
}
