//! Tests for the slurp queue state machine.

use proptest::prelude::*;
use rstest::{fixture, rstest};
use tokio::time::{Duration, Instant};

use super::*;
use crate::frame::{FrameImage, ImageHandle, InboundFrame};

#[fixture]
fn queue() -> SlurpQueue { SlurpQueue::new(SlurpConfig::default()) }

fn drain_ready(queue: &mut SlurpQueue) -> Vec<String> {
    let mut seen = Vec::new();
    while let Some(frame) = queue.pop_ready() {
        seen.push(frame.header().to_owned());
    }
    seen
}

#[rstest]
fn first_frame_arms_timer(mut queue: SlurpQueue) {
    let now = Instant::now();
    assert_eq!(queue.state(), SlurpState::Idle);
    queue.push(InboundFrame::text("a"), 7, now);
    assert_eq!(queue.state(), SlurpState::TimerArmed);
    assert_eq!(queue.deadline(), Some(now + Duration::from_millis(7)));
}

#[rstest]
fn rescheduled_timer_compensates_for_elapsed_time(mut queue: SlurpQueue) {
    let start = Instant::now();
    queue.push(InboundFrame::text("a"), 50, start);
    let rearm = start + Duration::from_millis(5);
    queue.push(InboundFrame::text("b"), 10, rearm);
    let deadline = queue.deadline().expect("armed");
    let wait = deadline - rearm;
    assert!(wait >= Duration::from_millis(1));
    assert!(wait <= Duration::from_millis(5));
}

#[rstest]
fn timer_during_transaction_is_deferred_then_rearmed(mut queue: SlurpQueue) {
    let now = Instant::now();
    queue.push(InboundFrame::text("a"), 1, now);
    assert_eq!(queue.fire(), Fire::Emit);
    let id = queue.begin_transaction();
    assert_eq!(drain_ready(&mut queue), vec!["a"]);
    assert_eq!(queue.state(), SlurpState::Emitting);

    queue.push(InboundFrame::text("b"), 1, now);
    assert_eq!(queue.fire(), Fire::Deferred);
    assert_eq!(queue.state(), SlurpState::EmittingBlockedInTransaction);
    assert_eq!(queue.deadline(), None);

    let later = now + Duration::from_millis(3);
    assert!(queue.end_transaction(id, later));
    assert_eq!(queue.deadline(), Some(later + Duration::from_millis(1)));
    assert_eq!(queue.state(), SlurpState::TimerArmed);
}

#[rstest]
fn stale_transaction_completion_is_ignored(mut queue: SlurpQueue) {
    let now = Instant::now();
    let first = queue.begin_transaction();
    let second = queue.begin_transaction();
    assert!(!queue.end_transaction(first, now));
    assert_eq!(queue.state(), SlurpState::Emitting);
    assert!(!queue.end_transaction(second, now));
    assert_eq!(queue.state(), SlurpState::Idle);
}

#[rstest]
fn incomplete_frame_blocks_everything_behind_it(mut queue: SlurpQueue) {
    let now = Instant::now();
    let (handle, completer) = ImageHandle::pending();
    queue.push(InboundFrame::text("A"), 1, now);
    queue.push(
        InboundFrame::text("B").with_image(FrameImage::Png(handle)),
        1,
        now,
    );
    queue.push(InboundFrame::text("C"), 1, now);

    let _ = queue.begin_transaction();
    assert_eq!(drain_ready(&mut queue), vec!["A"]);
    assert!(queue.is_blocked());
    assert_eq!(queue.len(), 2);

    completer.complete(Err(crate::frame::ImageError::NotPng));
    assert!(!queue.is_blocked());
    assert_eq!(drain_ready(&mut queue), vec!["B", "C"]);
    assert!(queue.is_empty());
}

#[rstest]
fn discard_empties_the_queue(mut queue: SlurpQueue) {
    let now = Instant::now();
    queue.push(InboundFrame::text("a"), 1, now);
    queue.push(InboundFrame::text("b"), 1, now);
    assert_eq!(queue.discard(), 2);
    assert!(queue.pop_ready().is_none());
}

proptest! {
    #[test]
    fn complete_frames_keep_arrival_order(
        headers in proptest::collection::vec("[a-z]{1,8}: [0-9]{0,4}", 1..64),
        costs in proptest::collection::vec(0_u32..200, 64),
    ) {
        let mut queue = SlurpQueue::new(SlurpConfig::default());
        let start = Instant::now();
        for (i, header) in headers.iter().enumerate() {
            let at = start + Duration::from_millis(i as u64);
            queue.push(InboundFrame::text(header.clone()), costs[i], at);
        }
        let _ = queue.fire();
        let _ = queue.begin_transaction();
        prop_assert_eq!(drain_ready(&mut queue), headers);
    }

    #[test]
    fn delay_is_clamped_between_one_and_fifty(cost in any::<u32>()) {
        let delay = SlurpConfig::default().delay_for(cost);
        prop_assert!(delay >= Duration::from_millis(1));
        prop_assert!(delay <= Duration::from_millis(50));
        if cost == 0 {
            prop_assert_eq!(delay, Duration::from_millis(1));
        }
        if cost >= 50 {
            prop_assert_eq!(delay, Duration::from_millis(50));
        }
    }
}
