// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-process publish/subscribe of named events.
//!
//! Each subscription owns an unbounded channel, so listeners see events
//! in emission order and the emitter never blocks or fails. Listeners
//! for [`EventName::All`] receive every event together with its name.
//! A listener whose receiver is gone is pruned on the next emit; the
//! last listener leaving removes the bucket.

use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tbot_core::EventName;
use tokio::sync::mpsc;

/// One delivered event.
#[derive(Debug, Clone)]
pub struct BusMessage {
    pub event: EventName,
    pub payload: Value,
}

struct Listener {
    id: u64,
    tx: mpsc::UnboundedSender<BusMessage>,
}

#[derive(Default)]
struct BusInner {
    next_id: u64,
    listeners: HashMap<EventName, Vec<Listener>>,
}

/// The process-wide event bus.
#[derive(Clone, Default)]
pub struct Bus {
    inner: Arc<Mutex<BusInner>>,
}

impl Bus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener for `event`. Dropping the subscription
    /// unsubscribes.
    pub fn subscribe(&self, event: EventName) -> Subscription {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = {
            let mut inner = self.inner.lock();
            inner.next_id += 1;
            let id = inner.next_id;
            inner
                .listeners
                .entry(event)
                .or_default()
                .push(Listener { id, tx });
            id
        };
        Subscription {
            bus: self.clone(),
            event,
            id,
            rx,
        }
    }

    /// Remove a listener. No-op when already gone.
    pub fn unsubscribe(&self, event: EventName, id: u64) {
        let mut inner = self.inner.lock();
        if let Some(bucket) = inner.listeners.get_mut(&event) {
            bucket.retain(|l| l.id != id);
            if bucket.is_empty() {
                inner.listeners.remove(&event);
            }
        }
    }

    /// Fan an event out to its listeners and to the `ALL` channel.
    ///
    /// Delivery is fire-and-forget: sends never block, and a failed
    /// listener only unsubscribes itself.
    pub fn emit(&self, event: EventName, payload: Value) {
        let message = BusMessage { event, payload };
        let mut inner = self.inner.lock();
        for channel in [event, EventName::All] {
            if channel == EventName::All && event == EventName::All {
                continue;
            }
            if let Some(bucket) = inner.listeners.get_mut(&channel) {
                bucket.retain(|l| l.tx.send(message.clone()).is_ok());
                if bucket.is_empty() {
                    inner.listeners.remove(&channel);
                }
            }
        }
    }

    /// Number of live listeners for an event (inspection/tests).
    pub fn listener_count(&self, event: EventName) -> usize {
        self.inner
            .lock()
            .listeners
            .get(&event)
            .map(|b| b.len())
            .unwrap_or(0)
    }
}

/// A live subscription handed out by [`Bus::subscribe`].
pub struct Subscription {
    bus: Bus,
    event: EventName,
    id: u64,
    rx: mpsc::UnboundedReceiver<BusMessage>,
}

impl Subscription {
    /// Wait for the next event. `None` after the subscription is dead.
    pub async fn recv(&mut self) -> Option<BusMessage> {
        self.rx.recv().await
    }

    /// Non-blocking drain, for tests and polling consumers.
    pub fn try_recv(&mut self) -> Option<BusMessage> {
        self.rx.try_recv().ok()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.bus.unsubscribe(self.event, self.id);
    }
}

#[cfg(test)]
#[path = "bus_tests.rs"]
mod tests;
