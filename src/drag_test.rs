use std::collections::HashSet;

use super::*;
use crate::collision::DroppableId;
use crate::geometry::Point;
use crate::issue::{Issue, IssueId, Link, Snapshot, Topic, TopicId};

// =============================================================
// Helpers
// =============================================================

fn link(id: &str) -> Link {
    Link::from_url(LinkId::from(id), "https://example.com")
}

/// Columns 200 wide with 100 gaps; cards 40 tall every 50; trash under column 0.
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
    (buckets.clone(), layout_for(&buckets))
}

fn layout_for(buckets: &Buckets) -> Layout {
    let mut layout = Layout::new();
    for (col, bucket) in buckets.iter().enumerate() {
        let x = col as f64 * 300.0;
        layout.register(DroppableId::Bucket(bucket.id.clone()), Rect::new(x, 0.0, 200.0, 600.0));
        for (row, id) in bucket.links.iter().enumerate() {
            layout.register(DroppableId::Item(id.clone()), Rect::new(x + 10.0, 10.0 + row as f64 * 50.0, 180.0, 40.0));
        }
    }
    layout.register(DroppableId::Trash, Rect::new(0.0, 700.0, 200.0, 100.0));
    layout
}

fn frame_at(x: f64, y: f64) -> DragFrame {
    DragFrame { pointer: Some(Point::new(x, y)), rect: Rect::new(x - 90.0, y - 20.0, 180.0, 40.0) }
}

fn lid(id: &str) -> LinkId {
    LinkId::from(id)
}

fn t(id: &str) -> BucketId {
    BucketId::Topic(TopicId::from(id))
}

fn ids(raw: &[&str]) -> Vec<LinkId> {
    raw.iter().map(|r| lid(r)).collect()
}

/// One frame: detect, then apply the live reshuffle.
fn step(ctl: &mut DragController, frame: &DragFrame, layout: &Layout, buckets: &mut Buckets) -> Option<DropTarget> {
    let target = ctl.detect(frame, layout, buckets);
    ctl.over(target.as_ref(), frame, layout, buckets);
    target
}

// =============================================================
// Start
// =============================================================

#[test]
fn start_captures_snapshot() {
    let (buckets, _) = fixture(&["L1"], &[("T1", &[])]);
    let mut ctl = DragController::new();
    assert!(!ctl.is_dragging());
    ctl.start(DragItem::Link(lid("L1")), &buckets);
    assert!(ctl.is_dragging());
    assert_eq!(ctl.pre_drag_snapshot(), Some(&buckets));
    assert_eq!(ctl.active(), Some(&DragItem::Link(lid("L1"))));
    assert!(ctl.submission().is_none());
}

#[test]
fn start_records_submission_payload() {
    let (buckets, _) = fixture(&[], &[]);
    let submission = Submission { id: "S1".into(), url: "https://a.b".into(), title: None };
    let mut ctl = DragController::new();
    ctl.start(DragItem::Submission(submission.clone()), &buckets);
    assert_eq!(ctl.submission(), Some(&submission));
}

// =============================================================
// Cross-bucket moves
// =============================================================

#[test]
fn drag_into_empty_topic_moves_link() {
    let (mut buckets, layout) = fixture(&["L1"], &[("T1", &[])]);
    let mut ctl = DragController::new();
    ctl.start(DragItem::Link(lid("L1")), &buckets);

    let frame = frame_at(400.0, 300.0);
    let target = step(&mut ctl, &frame, &layout, &mut buckets);
    assert_eq!(target, Some(DropTarget::BucketEdge(t("T1"))));
    assert!(buckets.links(&BucketId::Unassigned).unwrap().is_empty());
    assert_eq!(buckets.links(&t("T1")).unwrap(), ids(&["L1"]).as_slice());

    let outcome = ctl.end(target.as_ref(), &frame, &layout, &mut buckets);
    assert_eq!(outcome, DragOutcome::Moved { id: lid("L1"), from: BucketId::Unassigned, to: t("T1") });
    assert!(!ctl.is_dragging());
}

#[test]
fn over_inserts_before_card_when_above_midpoint() {
    let (mut buckets, layout) = fixture(&["L1"], &[("T1", &["A", "B"])]);
    let mut ctl = DragController::new();
    ctl.start(DragItem::Link(lid("L1")), &buckets);
    // Card B spans y 60..100; midpoint 80.
    step(&mut ctl, &frame_at(400.0, 65.0), &layout, &mut buckets);
    assert_eq!(buckets.links(&t("T1")).unwrap(), ids(&["A", "L1", "B"]).as_slice());
}

#[test]
fn over_inserts_after_card_when_below_midpoint() {
    let (mut buckets, layout) = fixture(&["L1"], &[("T1", &["A", "B"])]);
    let mut ctl = DragController::new();
    ctl.start(DragItem::Link(lid("L1")), &buckets);
    step(&mut ctl, &frame_at(400.0, 95.0), &layout, &mut buckets);
    assert_eq!(buckets.links(&t("T1")).unwrap(), ids(&["A", "B", "L1"]).as_slice());
}

#[test]
fn over_same_bucket_is_not_a_live_move() {
    let (mut buckets, layout) = fixture(&["L1", "L2"], &[]);
    let before = buckets.clone();
    let mut ctl = DragController::new();
    ctl.start(DragItem::Link(lid("L1")), &buckets);
    step(&mut ctl, &frame_at(100.0, 80.0), &layout, &mut buckets);
    assert_eq!(buckets, before);
}

#[test]
fn move_out_and_back_is_not_a_move() {
    let (mut buckets, layout) = fixture(&["L1"], &[("T1", &[])]);
    let mut ctl = DragController::new();
    ctl.start(DragItem::Link(lid("L1")), &buckets);
    step(&mut ctl, &frame_at(400.0, 300.0), &layout, &mut buckets);
    // Settling frame after the cross-bucket move.
    step(&mut ctl, &frame_at(400.0, 300.0), &layout, &mut buckets);
    let frame = frame_at(100.0, 300.0);
    let target = step(&mut ctl, &frame, &layout, &mut buckets);
    assert_eq!(buckets.bucket_of(&lid("L1")), Some(&BucketId::Unassigned));
    let outcome = ctl.end(target.as_ref(), &frame, &layout, &mut buckets);
    assert_eq!(outcome, DragOutcome::Nothing);
}

#[test]
fn release_over_topic_without_moves_lands_there() {
    let (mut buckets, layout) = fixture(&["L1"], &[("T1", &[])]);
    let mut ctl = DragController::new();
    ctl.start(DragItem::Link(lid("L1")), &buckets);

    let frame = frame_at(400.0, 300.0);
    let target = ctl.detect_release(&frame, &layout, &buckets);
    let outcome = ctl.end(target.as_ref(), &frame, &layout, &mut buckets);

    assert_eq!(outcome, DragOutcome::Moved { id: lid("L1"), from: BucketId::Unassigned, to: t("T1") });
    assert_eq!(buckets.links(&t("T1")).unwrap(), ids(&["L1"]).as_slice());
    assert!(buckets.links(&BucketId::Unassigned).unwrap().is_empty());
}

#[test]
fn release_while_settling_follows_the_pointer() {
    let (mut buckets, layout) = fixture(&["L1"], &[("T1", &[]), ("T2", &[])]);
    let mut ctl = DragController::new();
    ctl.start(DragItem::Link(lid("L1")), &buckets);
    step(&mut ctl, &frame_at(400.0, 300.0), &layout, &mut buckets);
    assert_eq!(buckets.bucket_of(&lid("L1")), Some(&t("T1")));

    let frame = frame_at(700.0, 300.0);
    let target = ctl.detect_release(&frame, &layout, &buckets);
    assert_eq!(target, Some(DropTarget::BucketEdge(t("T2"))));
    let outcome = ctl.end(target.as_ref(), &frame, &layout, &mut buckets);

    assert_eq!(outcome, DragOutcome::Moved { id: lid("L1"), from: BucketId::Unassigned, to: t("T2") });
    assert!(buckets.links(&t("T1")).unwrap().is_empty());
    assert_eq!(buckets.links(&t("T2")).unwrap(), ids(&["L1"]).as_slice());
}

#[test]
fn release_over_card_in_other_topic_uses_insertion_index() {
    let (mut buckets, layout) = fixture(&["L1"], &[("T1", &["A", "B"])]);
    let mut ctl = DragController::new();
    ctl.start(DragItem::Link(lid("L1")), &buckets);
    // Card A spans y 10..50; below its midpoint.
    let frame = frame_at(400.0, 45.0);
    let target = ctl.detect_release(&frame, &layout, &buckets);
    let outcome = ctl.end(target.as_ref(), &frame, &layout, &mut buckets);
    assert!(matches!(outcome, DragOutcome::Moved { ref to, .. } if *to == t("T1")));
    assert_eq!(buckets.links(&t("T1")).unwrap(), ids(&["A", "L1", "B"]).as_slice());
}

// =============================================================
// Drop on trash / reorder
// =============================================================

#[test]
fn drop_on_trash_deletes() {
    let (mut buckets, layout) = fixture(&["L1", "L2"], &[]);
    let mut ctl = DragController::new();
    ctl.start(DragItem::Link(lid("L1")), &buckets);
    let frame = frame_at(100.0, 750.0);
    let target = step(&mut ctl, &frame, &layout, &mut buckets);
    let outcome = ctl.end(target.as_ref(), &frame, &layout, &mut buckets);
    assert_eq!(outcome, DragOutcome::Deleted(lid("L1")));
    assert!(!buckets.contains(&lid("L1")));
    assert_eq!(buckets.link_count(), 1);
}

#[test]
fn drop_on_sibling_reorders_without_move() {
    let (mut buckets, layout) = fixture(&["A", "B", "C"], &[]);
    let mut ctl = DragController::new();
    ctl.start(DragItem::Link(lid("A")), &buckets);
    let frame = frame_at(100.0, 120.0);
    let target = step(&mut ctl, &frame, &layout, &mut buckets);
    assert_eq!(target, Some(DropTarget::Item { bucket: BucketId::Unassigned, id: lid("C") }));
    let outcome = ctl.end(target.as_ref(), &frame, &layout, &mut buckets);
    assert_eq!(outcome, DragOutcome::Reordered { id: lid("A"), bucket: BucketId::Unassigned });
    assert_eq!(buckets.links(&BucketId::Unassigned).unwrap(), ids(&["B", "C", "A"]).as_slice());
}

#[test]
fn drop_in_place_is_nothing() {
    let (mut buckets, layout) = fixture(&["A", "B"], &[]);
    let mut ctl = DragController::new();
    ctl.start(DragItem::Link(lid("A")), &buckets);
    let frame = frame_at(100.0, 30.0);
    let target = step(&mut ctl, &frame, &layout, &mut buckets);
    assert_eq!(ctl.end(target.as_ref(), &frame, &layout, &mut buckets), DragOutcome::Nothing);
}

// =============================================================
// Cancel
// =============================================================

#[test]
fn cancel_restores_pre_drag_layout_exactly() {
    let (mut buckets, layout) = fixture(&["L1", "L2"], &[("T1", &["A"]), ("T2", &[])]);
    let before_drag = buckets.clone();
    let mut ctl = DragController::new();
    ctl.start(DragItem::Link(lid("L1")), &buckets);
    for (x, y) in [(400.0, 30.0), (400.0, 30.0), (700.0, 300.0), (700.0, 300.0), (400.0, 95.0)] {
        step(&mut ctl, &frame_at(x, y), &layout, &mut buckets);
    }
    assert_ne!(buckets, before_drag);
    assert!(ctl.cancel(&mut buckets));
    assert_eq!(buckets, before_drag);
    assert!(!ctl.is_dragging());
}

#[test]
fn cancel_without_session_is_noop() {
    let (mut buckets, _) = fixture(&["L1"], &[]);
    let mut ctl = DragController::new();
    assert!(!ctl.cancel(&mut buckets));
}

// =============================================================
// Stability
// =============================================================

#[test]
fn detect_reuses_last_stable_when_nothing_hit() {
    let (buckets, layout) = fixture(&["L1"], &[("T1", &[])]);
    let mut ctl = DragController::new();
    ctl.start(DragItem::Link(lid("L1")), &buckets);
    let first = ctl.detect(&frame_at(400.0, 300.0), &layout, &buckets);
    let lost = ctl.detect(&frame_at(5000.0, 5000.0), &layout, &buckets);
    assert_eq!(first, lost);
    assert_eq!(ctl.last_stable_target(), first.as_ref());
}

#[test]
fn frame_after_cross_move_keeps_previous_target() {
    let (mut buckets, layout) = fixture(&["L1"], &[("T1", &[]), ("T2", &[])]);
    let mut ctl = DragController::new();
    ctl.start(DragItem::Link(lid("L1")), &buckets);
    let moved = step(&mut ctl, &frame_at(400.0, 300.0), &layout, &mut buckets);
    let settling = ctl.detect(&frame_at(700.0, 300.0), &layout, &buckets);
    assert_eq!(moved, settling);
    let next = ctl.detect(&frame_at(700.0, 300.0), &layout, &buckets);
    assert_eq!(next, Some(DropTarget::BucketEdge(t("T2"))));
}

#[test]
fn detect_without_session_is_none() {
    let (buckets, layout) = fixture(&["L1"], &[]);
    let mut ctl = DragController::new();
    assert_eq!(ctl.detect(&frame_at(100.0, 30.0), &layout, &buckets), None);
}

// =============================================================
// Bucket and submission drags
// =============================================================

#[test]
fn dragging_topic_reorders_buckets() {
    let (mut buckets, layout) = fixture(&[], &[("T1", &[]), ("T2", &[]), ("T3", &[])]);
    let mut ctl = DragController::new();
    ctl.start(DragItem::Bucket(t("T1")), &buckets);
    let frame = DragFrame { pointer: Some(Point::new(1000.0, 300.0)), rect: Rect::new(900.0, 0.0, 200.0, 600.0) };
    let target = ctl.detect(&frame, &layout, &buckets);
    assert_eq!(target, Some(DropTarget::BucketEdge(t("T3"))));
    let outcome = ctl.end(target.as_ref(), &frame, &layout, &mut buckets);
    assert_eq!(outcome, DragOutcome::BucketReordered { bucket: t("T1"), index: 3 });
    assert_eq!(buckets.topic_order(), vec![TopicId::from("T2"), TopicId::from("T3"), TopicId::from("T1")]);
}

#[test]
fn submission_dropped_into_bucket_reports_index() {
    let (mut buckets, layout) = fixture(&[], &[("T1", &["A", "B"])]);
    let submission = Submission { id: "S1".into(), url: "https://a.b".into(), title: Some("hi".into()) };
    let mut ctl = DragController::new();
    ctl.start(DragItem::Submission(submission.clone()), &buckets);
    let frame = frame_at(400.0, 65.0);
    let target = step(&mut ctl, &frame, &layout, &mut buckets);
    assert_eq!(buckets.link_count(), 2);
    let outcome = ctl.end(target.as_ref(), &frame, &layout, &mut buckets);
    assert_eq!(outcome, DragOutcome::SubmissionDropped { submission, bucket: t("T1"), index: 1 });
}

#[test]
fn submission_dropped_on_trash_is_nothing() {
    let (mut buckets, layout) = fixture(&[], &[]);
    let submission = Submission { id: "S1".into(), url: "https://a.b".into(), title: None };
    let mut ctl = DragController::new();
    ctl.start(DragItem::Submission(submission), &buckets);
    let frame = frame_at(100.0, 750.0);
    let target = ctl.detect(&frame, &layout, &buckets);
    assert_eq!(ctl.end(target.as_ref(), &frame, &layout, &mut buckets), DragOutcome::Nothing);
}

// =============================================================
// Rekey
// =============================================================

#[test]
fn rekey_follows_active_link() {
    let temp = LinkId::temporary();
    let (mut buckets, _) = fixture(&[], &[]);
    buckets.push_link(&BucketId::Unassigned, temp.clone());
    let mut ctl = DragController::new();
    ctl.start(DragItem::Link(temp.clone()), &buckets);
    ctl.rekey(&temp, &lid("42"));
    assert_eq!(ctl.active(), Some(&DragItem::Link(lid("42"))));
    assert!(ctl.pre_drag_snapshot().unwrap().contains(&lid("42")));
    assert!(!ctl.pre_drag_snapshot().unwrap().contains(&temp));
}

#[test]
fn forget_keeps_removed_link_out_of_cancel() {
    let (mut buckets, _) = fixture(&["L1", "L2"], &[]);
    let mut ctl = DragController::new();
    ctl.start(DragItem::Link(lid("L1")), &buckets);
    buckets.remove_link(&lid("L2"));
    ctl.forget(&lid("L2"));
    assert!(ctl.cancel(&mut buckets));
    assert!(!buckets.contains(&lid("L2")));
    assert!(buckets.contains(&lid("L1")));
}
