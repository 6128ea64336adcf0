//! Inbound path: decode, buffer, and emit batches inside render transactions.

use log::{debug, trace};
use tokio::time::Instant;

use super::{SessionActor, SessionEvent};
use crate::{
    dispatch::Flow,
    frame::{self, RawFrame, loggable},
    metrics,
    slurp::{Fire, TransactionId},
    transport::ReadyState,
    view::{TransactionDone, View},
};

impl<V: View> SessionActor<V> {
    /// Decode a frame from the current socket and buffer it.
    pub(super) fn on_frame(&mut self, raw: RawFrame) {
        let decoded = frame::decode(raw);
        if let Some(pending) = decoded.pending {
            let tx = self.tx.clone();
            tokio::task::spawn_blocking(move || {
                pending.run();
                if tx.send(SessionEvent::ImageSettled).is_err() {
                    debug!("image settled after the session stopped");
                }
            });
        }
        let frame = decoded.frame;
        trace!(
            "frame buffered: header={}, binary={}",
            loggable(frame.header(), self.config.log_frame_limit),
            frame.is_binary()
        );
        let cost = self.view.predict_render_cost();
        self.slurp.push(frame, cost, Instant::now());
    }

    /// An image decode finished; restart emission if it was waiting on one.
    pub(super) fn on_image_settled(&mut self) {
        if self.slurp.is_empty() || self.slurp.is_blocked() || self.slurp.deadline().is_some() {
            return;
        }
        let delay = self.slurp.config().min_delay;
        self.slurp.schedule(delay, Instant::now());
    }

    pub(super) fn on_slurp_due(&mut self) {
        match self.slurp.fire() {
            Fire::Emit => self.emit_batch(),
            Fire::Deferred => debug!("emission deferred: render transaction still open"),
        }
    }

    /// Dispatch every ready frame, in order, inside one render transaction.
    ///
    /// Stops at the first incomplete frame, or when a handler halts. A halt
    /// that closed the connection or failed the session drops the rest of the
    /// batch; a halt on a pending prompt leaves the rest waiting for the
    /// answer. Any other halt only ends that frame.
    fn emit_batch(&mut self) {
        let id = self.slurp.begin_transaction();
        self.view.begin_render_transaction();
        let mut dispatched = 0_usize;
        while let Some(frame) = self.slurp.pop_ready() {
            dispatched += 1;
            if self.dispatch_isolated(&frame) != Flow::Halt {
                continue;
            }
            let connected = matches!(
                self.ready_state(),
                Some(ReadyState::Connecting | ReadyState::Open)
            );
            if !connected || self.recovery.is_fatal() {
                let dropped = self.slurp.discard();
                debug!("batch halted: dropped={dropped}");
                break;
            }
            if self.prompt.is_some() {
                self.paused = true;
                debug!("batch paused: remaining={}", self.slurp.len());
                break;
            }
        }
        if self.slurp.is_blocked() {
            trace!("batch stopped at an incomplete frame: remaining={}", self.slurp.len());
        }
        metrics::inc_batches();
        trace!("batch emitted: frames={dispatched}, transaction={id:?}");
        self.view
            .end_render_transaction(TransactionDone::new(id, self.tx.clone()));
    }

    pub(super) fn on_transaction_complete(&mut self, id: TransactionId) {
        if self.slurp.end_transaction(id, Instant::now()) {
            debug!("deferred emission rescheduled: transaction={id:?}");
        }
    }
}
