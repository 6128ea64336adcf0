#![cfg(feature = "metrics")]
//! Counters recorded while a session runs.
//!
//! Each test drives a session on a current-thread runtime inside
//! `metrics::with_local_recorder`, so the actor task records into the
//! test's `DebuggingRecorder`.

mod common;

use common::{config, open_and_load, start};
use docwire::{BATCHES_EMITTED, CONNECT_ATTEMPTS, FRAMES_DISPATCHED, HANDLER_FAILURES};
use docwire_testing::settle;
use metrics_util::debugging::{DebugValue, DebuggingRecorder, Snapshotter};

/// Creates a debugging recorder and snapshotter for metrics testing.
fn debugging_recorder_setup() -> (Snapshotter, DebuggingRecorder) {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    (snapshotter, recorder)
}

fn counter(snapshotter: &Snapshotter, name: &str, label: Option<(&str, &str)>) -> u64 {
    snapshotter
        .snapshot()
        .into_vec()
        .into_iter()
        .filter(|(k, ..)| {
            k.key().name() == name
                && label.is_none_or(|(key, value)| {
                    k.key().labels().any(|l| l.key() == key && l.value() == value)
                })
        })
        .map(|(.., v)| match v {
            DebugValue::Counter(c) => c,
            _ => 0,
        })
        .sum()
}

/// Run `scenario` on a paused current-thread runtime.
fn drive<F: Future<Output = ()>>(scenario: impl FnOnce() -> F) {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .start_paused(true)
        .build()
        .expect("runtime");
    runtime.block_on(scenario());
}

#[test]
fn loading_records_connects_batches_and_frames() {
    let (snapshotter, recorder) = debugging_recorder_setup();
    metrics::with_local_recorder(&recorder, || {
        drive(|| async {
            let running = start(config());
            let peer = open_and_load(&running).await;
            peer.send_text("invalidatetiles: part=0");
            settle(&running.handle).await;
            running.stop().await;
        });
    });

    assert_eq!(counter(&snapshotter, CONNECT_ATTEMPTS, None), 1);
    assert!(counter(&snapshotter, BATCHES_EMITTED, None) >= 1);
    assert_eq!(counter(&snapshotter, FRAMES_DISPATCHED, Some(("route", "engine"))), 1);
    assert_eq!(counter(&snapshotter, FRAMES_DISPATCHED, Some(("route", "document"))), 2);
}

#[test]
fn malformed_frames_count_as_handler_failures() {
    let (snapshotter, recorder) = debugging_recorder_setup();
    metrics::with_local_recorder(&recorder, || {
        drive(|| async {
            let running = start(config());
            let peer = open_and_load(&running).await;
            peer.send_all(&["perm: superuser", "wopi: {broken"]);
            settle(&running.handle).await;
            running.stop().await;
        });
    });

    assert_eq!(counter(&snapshotter, HANDLER_FAILURES, None), 2);
}

#[test]
fn reconnects_are_counted() {
    let (snapshotter, recorder) = debugging_recorder_setup();
    metrics::with_local_recorder(&recorder, || {
        drive(|| async {
            let running = start(config());
            let peer = open_and_load(&running).await;
            peer.drop_connection("network");
            settle(&running.handle).await;
            running.stop().await;
        });
    });

    assert_eq!(counter(&snapshotter, CONNECT_ATTEMPTS, None), 2);
}
