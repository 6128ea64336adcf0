//! Metric helpers for `docwire`.
//!
//! This module defines metric names and simple helper functions wrapping the
//! [`metrics`](https://docs.rs/metrics) crate. Without the `metrics` feature
//! every helper compiles to nothing.

#[cfg(feature = "metrics")]
use metrics::counter;

/// Name of the counter tracking frames handed to the dispatcher.
pub const FRAMES_DISPATCHED: &str = "docwire_frames_dispatched_total";
/// Name of the counter tracking emitted batches.
pub const BATCHES_EMITTED: &str = "docwire_batches_emitted_total";
/// Name of the counter tracking handlers that failed or panicked.
pub const HANDLER_FAILURES: &str = "docwire_handler_failures_total";
/// Name of the counter tracking socket creations.
pub const CONNECT_ATTEMPTS: &str = "docwire_connect_attempts_total";

/// Outcome of a dispatched frame.
#[derive(Clone, Copy, Debug)]
pub enum Route {
    /// Handled by the engine.
    Engine,
    /// Forwarded to the document layer.
    Document,
}

impl Route {
    #[cfg_attr(not(feature = "metrics"), expect(dead_code, reason = "only read by metric labels"))]
    fn as_str(self) -> &'static str {
        match self {
            Route::Engine => "engine",
            Route::Document => "document",
        }
    }
}

/// Record a dispatched frame.
pub fn inc_frames(route: Route) {
    #[cfg(feature = "metrics")]
    counter!(FRAMES_DISPATCHED, "route" => route.as_str()).increment(1);
    #[cfg(not(feature = "metrics"))]
    let _ = route;
}

/// Record an emitted batch.
pub fn inc_batches() {
    #[cfg(feature = "metrics")]
    counter!(BATCHES_EMITTED).increment(1);
}

/// Record a handler failure.
pub fn inc_handler_failures() {
    #[cfg(feature = "metrics")]
    counter!(HANDLER_FAILURES).increment(1);
}

/// Record a socket creation.
pub fn inc_connects() {
    #[cfg(feature = "metrics")]
    counter!(CONNECT_ATTEMPTS).increment(1);
}
