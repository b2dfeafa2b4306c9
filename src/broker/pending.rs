//! Table of calls waiting for a correlated reply.

use crate::{BookingError, Result, TransportMessage};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::oneshot;
use tracing::debug;

struct PendingCall {
    token: u64,
    sender: oneshot::Sender<TransportMessage>,
    registered_at: Instant,
}

/// A registered slot as seen by the waiting caller.
///
/// `token` identifies this registration, so releasing it can never remove a
/// later registration that reuses the same correlation id.
#[derive(Debug)]
pub struct PendingSlot {
    pub token: u64,
    pub receiver: oneshot::Receiver<TransportMessage>,
}

/// What happened to a reply handed to [`PendingCalls::deliver`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// The waiting caller received the message.
    Delivered { waited: Duration },
    /// No slot for this id: the caller already gave up, or the reply is a duplicate.
    NoWaiter,
    /// The slot existed but its caller was dropped before the handoff.
    CallerGone,
}

/// Correlation id → one-shot delivery slot.
///
/// Every slot is removed exactly once, either by [`deliver`](Self::deliver), by
/// [`release`](Self::release) with its own token, or by [`close_all`](Self::close_all).
/// Each operation only holds the shard lock for the id it touches.
#[derive(Default)]
pub struct PendingCalls {
    slots: DashMap<String, PendingCall>,
    next_token: AtomicU64,
    closed: AtomicBool,
}

impl PendingCalls {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve a slot for `id`. Fails if a call with the same id is already
    /// waiting or the table has been closed.
    pub fn register(&self, id: &str) -> Result<PendingSlot> {
        let entry = self.slots.entry(id.to_string());
        // Checked under the entry lock: `close_all` sets the flag before it
        // sweeps the shards, so a slot inserted here is either refused or swept.
        if self.is_closed() {
            return Err(BookingError::BrokerClosed);
        }

        match entry {
            Entry::Occupied(_) => Err(BookingError::DuplicateCorrelationId(id.to_string())),
            Entry::Vacant(vacant) => {
                let token = self.next_token.fetch_add(1, Ordering::Relaxed);
                let (sender, receiver) = oneshot::channel();
                vacant.insert(PendingCall {
                    token,
                    sender,
                    registered_at: Instant::now(),
                });
                Ok(PendingSlot { token, receiver })
            }
        }
    }

    /// Take the slot for `id` and hand it the message.
    pub fn deliver(&self, id: &str, message: TransportMessage) -> Delivery {
        // The slot leaves the map before the send, so the lock is not held during handoff.
        let Some((_, call)) = self.slots.remove(id) else {
            return Delivery::NoWaiter;
        };

        let waited = call.registered_at.elapsed();
        match call.sender.send(message) {
            Ok(()) => Delivery::Delivered { waited },
            Err(_) => {
                debug!(correlation_id = id, "Caller dropped before reply arrived");
                Delivery::CallerGone
            }
        }
    }

    /// Release the slot registered for `id` under `token`. Returns false if that
    /// registration is already gone, even when another call now holds the id.
    pub fn release(&self, id: &str, token: u64) -> bool {
        self.slots
            .remove_if(id, |_, call| call.token == token)
            .is_some()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.slots.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Refuse new calls and drop every slot; waiting callers observe a closed
    /// channel. Returns how many slots were dropped.
    pub fn close_all(&self) -> usize {
        self.closed.store(true, Ordering::SeqCst);
        let mut dropped = 0;
        self.slots.retain(|_, _| {
            dropped += 1;
            false
        });
        dropped
    }
}
