//! Assertion macros shared by integration tests.

/// Assert that a [`RecordingView`](crate::RecordingView) saw a notification
/// matching `pattern`.
#[macro_export]
macro_rules! assert_notified {
    ($view:expr, $pat:pat $(if $guard:expr)?) => {{
        let seen = $view.notifications();
        assert!(
            seen.iter().any(|n| matches!(n, $pat $(if $guard)?)),
            "no notification matching `{}` at {}:{}; saw {:#?}",
            stringify!($pat),
            file!(),
            line!(),
            seen
        );
    }};
}

/// Assert that a [`RecordingView`](crate::RecordingView) saw no
/// notification matching `pattern`.
#[macro_export]
macro_rules! assert_not_notified {
    ($view:expr, $pat:pat $(if $guard:expr)?) => {{
        let seen = $view.notifications();
        assert!(
            !seen.iter().any(|n| matches!(n, $pat $(if $guard)?)),
            "unexpected notification matching `{}` at {}:{}; saw {:#?}",
            stringify!($pat),
            file!(),
            line!(),
            seen
        );
    }};
}

pub use crate::{assert_not_notified, assert_notified};
