//! Tests for the recovery state machine.

use rstest::{fixture, rstest};
use tokio::time::{Duration, Instant};

use super::*;

#[fixture]
fn recovery() -> Recovery { Recovery::with_seed(RecoveryConfig::default(), 42) }

fn ms(value: u64) -> Duration { Duration::from_millis(value) }

#[rstest]
fn starts_healthy(recovery: Recovery) {
    assert_eq!(recovery.state(), RecoveryState::Healthy);
    assert_eq!(recovery.next_deadline(), None);
}

#[rstest]
fn unloading_backoff_is_quadratic_and_gives_up_on_eleventh(mut recovery: Recovery) {
    let mut now = Instant::now();
    for n in 1..=10_u32 {
        let outcome = recovery.unloading_retry(now);
        let UnloadingRetry::Scheduled {
            attempt,
            delay,
            first,
        } = outcome
        else {
            panic!("attempt {n} should be scheduled, got {outcome:?}");
        };
        assert_eq!(attempt, n);
        assert_eq!(delay, ms(500 * u64::from(n * n)));
        assert_eq!(first, n == 1);
        assert_eq!(recovery.next_deadline(), Some(now + delay));

        now += delay;
        assert_eq!(
            recovery.take_due(now),
            vec![(RetryCategory::DocumentUnloading, RetryAction::Reconnect)]
        );
        assert_eq!(
            recovery.state(),
            RecoveryState::Recovering(RetryCategory::DocumentUnloading)
        );
    }
    assert_eq!(recovery.unloading_retry(now), UnloadingRetry::GaveUp);
    assert_eq!(recovery.state(), RecoveryState::GivenUp);
    assert_eq!(recovery.next_deadline(), None);
}

#[rstest]
fn activation_notifies_once(mut recovery: Recovery) {
    assert!(recovery.activate(RetryCategory::ConnectionLost));
    assert!(!recovery.activate(RetryCategory::ConnectionLost));
    assert!(recovery.cancel(RetryCategory::ConnectionLost));
    assert!(recovery.activate(RetryCategory::ConnectionLost));
}

#[rstest]
fn recycling_loop_repeats_with_jitter_until_reconnected(mut recovery: Recovery) {
    let start = Instant::now();
    let (period, first) = recovery.recycling(start);
    assert!(first);
    assert!(period >= ms(5000) && period < ms(10_000));
    assert_eq!(recovery.next_deadline(), Some(start + period));

    let fired_at = start + period;
    assert_eq!(
        recovery.take_due(fired_at),
        vec![(RetryCategory::ConnectionLost, RetryAction::Reconnect)]
    );
    assert_eq!(recovery.next_deadline(), Some(fired_at + period));
    assert!(!recovery.connection_lost(fired_at));
    assert_eq!(recovery.loop_period(), Some(period));

    assert!(recovery.reconnected());
    assert_eq!(recovery.next_deadline(), None);
    assert_eq!(recovery.state(), RecoveryState::Healthy);
    assert!(recovery.take_due(fired_at + ms(60_000)).is_empty());
}

#[rstest]
fn connection_lost_fires_first_attempt_quickly(mut recovery: Recovery) {
    let now = Instant::now();
    assert!(recovery.connection_lost(now));
    assert_eq!(recovery.next_deadline(), Some(now + ms(1)));
    let period = recovery.loop_period().expect("periodic");
    assert!(period >= ms(5000) && period < ms(10_000));
}

#[rstest]
fn rearming_a_category_replaces_its_timer(mut recovery: Recovery) {
    let now = Instant::now();
    recovery.schedule_reload(ms(3000), RetryAction::Reconnect, now);
    recovery.schedule_reload(ms(5000), RetryAction::ReloadPage, now);
    assert_eq!(recovery.next_deadline(), Some(now + ms(5000)));
    assert!(recovery.take_due(now + ms(3000)).is_empty());
    assert_eq!(
        recovery.take_due(now + ms(5000)),
        vec![(RetryCategory::ScheduledReload, RetryAction::ReloadPage)]
    );
    assert_eq!(recovery.state(), RecoveryState::Healthy);
}

#[rstest]
fn reroute_leaves_a_pending_reload_alone(mut recovery: Recovery) {
    let now = Instant::now();
    recovery.schedule_reload(ms(5000), RetryAction::ReloadPage, now);
    assert!(recovery.schedule_reroute(ms(3000), now));
    assert_eq!(recovery.deadline_of(RetryCategory::ScheduledReload), Some(now + ms(5000)));
    assert_eq!(
        recovery.take_due(now + ms(3000)),
        vec![(RetryCategory::Rerouting, RetryAction::Reconnect)]
    );
    assert!(!recovery.is_active(RetryCategory::Rerouting));
    assert_eq!(
        recovery.take_due(now + ms(5000)),
        vec![(RetryCategory::ScheduledReload, RetryAction::ReloadPage)]
    );
    assert_eq!(recovery.state(), RecoveryState::Healthy);
}

#[rstest]
fn wrong_server_allows_three_retries(mut recovery: Recovery) {
    for attempt in 1..=3 {
        assert_eq!(recovery.wrong_server(), WrongServer::Retry { attempt });
    }
    assert_eq!(recovery.wrong_server(), WrongServer::GiveUp);
    assert_eq!(recovery.wrong_server_attempts(), 0);
}

#[rstest]
fn confirmed_server_resets_the_wrong_server_count(mut recovery: Recovery) {
    let _ = recovery.wrong_server();
    let _ = recovery.wrong_server();
    recovery.server_confirmed();
    assert_eq!(recovery.wrong_server(), WrongServer::Retry { attempt: 1 });
}

#[rstest]
fn fatal_is_terminal(mut recovery: Recovery) {
    let now = Instant::now();
    recovery.connection_lost(now);
    recovery.mark_fatal();
    assert_eq!(recovery.state(), RecoveryState::Fatal);
    assert_eq!(recovery.next_deadline(), None);
    assert!(!recovery.activate(RetryCategory::PasswordRetry));
    assert_eq!(recovery.unloading_retry(now), UnloadingRetry::GaveUp);
    assert!(!recovery.schedule_reload(ms(1), RetryAction::Reconnect, now));
}

#[rstest]
fn document_ready_clears_transient_categories(mut recovery: Recovery) {
    let now = Instant::now();
    let _ = recovery.unloading_retry(now);
    recovery.connection_lost(now);
    recovery.await_password();
    recovery.schedule_reload(ms(5000), RetryAction::ReloadPage, now);
    recovery.document_ready();
    assert_eq!(recovery.unloading_attempts(), 0);
    assert_eq!(
        recovery.state(),
        RecoveryState::Recovering(RetryCategory::ScheduledReload)
    );
}
