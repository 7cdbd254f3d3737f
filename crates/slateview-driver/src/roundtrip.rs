//! Synchronous round trips layered over the async outbound channel.
//!
//! [`BlockingLink`] holds at most one outstanding blocking request. The
//! caller allocates a sequence number, registers the waiter, sends the frame,
//! and parks on a timed wait; the inbound dispatch path (running on another
//! task) delivers the reply through [`BlockingLink::try_consume`].
//!
//! Because the engine invokes text-measurement and locale callbacks
//! synchronously from inside the frame loop, the frame-loop task can itself
//! become the blocked waiter. Reply delivery therefore must happen on a
//! different thread; with the multi-thread tokio runtime the inbound pump
//! provides that. On a current-thread runtime a blocking round trip issued
//! from the frame loop will always time out.

use std::sync::mpsc::{sync_channel, SyncSender};
use std::sync::Mutex;
use std::time::Duration;

use serde_json::Value;
use tracing::{debug, warn};

use slateview_core::protocol::Envelope;

struct Waiter {
    seqno: u64,
    tx: SyncSender<Value>,
}

/// Single-slot blocking request state.
#[derive(Default)]
pub struct BlockingLink {
    /// Serializes callers: at most one round trip in flight.
    gate: Mutex<()>,
    slot: Mutex<Option<Waiter>>,
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

impl BlockingLink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Consume an inbound envelope if it answers the awaited request.
    ///
    /// Returns true when the message was delivered to the waiter; such a
    /// message must not reach the normal dispatch table.
    pub fn try_consume(&self, envelope: &Envelope) -> bool {
        let mut slot = lock(&self.slot);
        if !matches!(slot.as_ref(), Some(w) if w.seqno == envelope.seqno) {
            return false;
        }
        if let Some(waiter) = slot.take() {
            if waiter.tx.try_send(envelope.payload.clone()).is_err() {
                // Waiter timed out between the seqno check and delivery.
                debug!(seqno = envelope.seqno, "Blocking reply arrived after timeout");
            }
        }
        true
    }

    /// Perform one round trip: register the waiter under `seqno`, run `send`,
    /// and wait up to `timeout` for the reply payload.
    ///
    /// On timeout the waiter slot is cleared and `Value::Null` is returned so
    /// the caller can fall back to a safe default; a later round trip is not
    /// affected.
    pub fn round_trip(&self, seqno: u64, timeout: Duration, send: impl FnOnce()) -> Value {
        let _gate = lock(&self.gate);

        let (tx, rx) = sync_channel(1);
        *lock(&self.slot) = Some(Waiter { seqno, tx });

        send();

        match rx.recv_timeout(timeout) {
            Ok(payload) => payload,
            Err(_) => {
                warn!(seqno, ?timeout, "Blocking round trip timed out");
                *lock(&self.slot) = None;
                Value::Null
            }
        }
    }

    /// Whether a blocking request is currently awaiting a reply.
    pub fn awaiting(&self) -> Option<u64> {
        lock(&self.slot).as_ref().map(|w| w.seqno)
    }
}
