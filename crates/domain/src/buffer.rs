//! Pending classified events waiting for the next digest.

use std::{
    collections::{BTreeMap, VecDeque},
    sync::{Mutex, MutexGuard},
    time::Duration,
};

use chrono::{DateTime, TimeDelta, Utc};
use metrics::{counter, gauge};
use strum::IntoEnumIterator;
use tracing::warn;

use crate::{
    amount::RawAmount,
    model::{ClassifiedEvent, EventKind},
};

/// Running per-kind sums of raw amounts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KindTotals(BTreeMap<EventKind, RawAmount>);

impl Default for KindTotals {
    fn default() -> Self {
        Self(
            EventKind::iter()
                .filter(|kind| kind.carries_amount())
                .map(|kind| (kind, RawAmount::ZERO))
                .collect(),
        )
    }
}

impl KindTotals {
    pub fn get(&self, kind: EventKind) -> RawAmount {
        self.0.get(&kind).copied().unwrap_or_default()
    }

    pub fn is_zero(&self) -> bool {
        self.0.values().all(|amount| amount.is_zero())
    }

    fn add(&mut self, kind: EventKind, amount: RawAmount) {
        let slot = self.0.entry(kind).or_default();
        *slot = slot.saturating_add(amount);
    }

    fn subtract(&mut self, kind: EventKind, amount: RawAmount) {
        let slot = self.0.entry(kind).or_default();
        *slot = slot.saturating_sub(amount);
    }
}

/// Events and totals handed out by a successful drain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DrainedBatch {
    pub events: Vec<ClassifiedEvent>,
    pub totals: KindTotals,
}

#[derive(Debug)]
struct BufferState {
    pending: VecDeque<ClassifiedEvent>,
    totals: KindTotals,
    last_flush: DateTime<Utc>,
}

/// Shared between the stream worker (append) and the digest dispatcher
/// (drain); a single mutex serializes the two.
#[derive(Debug)]
pub struct NotificationBuffer {
    capacity: usize,
    state: Mutex<BufferState>,
}

impl Default for NotificationBuffer {
    fn default() -> Self {
        Self::with_capacity(0)
    }
}

impl NotificationBuffer {
    /// `capacity == 0` leaves the buffer unbounded; otherwise the oldest
    /// pending event is evicted once `capacity` events are waiting.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity,
            state: Mutex::new(BufferState {
                pending: VecDeque::new(),
                totals: KindTotals::default(),
                last_flush: DateTime::UNIX_EPOCH,
            }),
        }
    }

    pub fn append(&self, event: ClassifiedEvent) {
        let mut state = self.lock();
        if self.capacity > 0 && state.pending.len() >= self.capacity {
            if let Some(evicted) = state.pending.pop_front() {
                if let Some(amount) = evicted.amount {
                    state.totals.subtract(evicted.kind, amount);
                }
                warn!(
                    capacity = self.capacity,
                    dropped = %evicted.text.plain,
                    "notification buffer full, dropping oldest event"
                );
                counter!("notify_buffer_dropped_total").increment(1);
            }
        }
        if let Some(amount) = event.amount {
            state.totals.add(event.kind, amount);
        }
        state.pending.push_back(event);
        gauge!("notify_buffer_pending").set(state.pending.len() as f64);
    }

    /// Takes everything pending when there is something to send and more
    /// than `min_interval` has passed since the previous drain.
    pub fn drain_if_due(&self, now: DateTime<Utc>, min_interval: Duration) -> Option<DrainedBatch> {
        let mut state = self.lock();
        if state.pending.is_empty() {
            return None;
        }
        let interval = TimeDelta::from_std(min_interval).unwrap_or(TimeDelta::MAX);
        let due = state
            .last_flush
            .checked_add_signed(interval)
            .is_some_and(|deadline| now > deadline);
        if !due {
            return None;
        }

        let events = state.pending.drain(..).collect();
        let totals = std::mem::take(&mut state.totals);
        state.last_flush = state.last_flush.max(now);
        gauge!("notify_buffer_pending").set(0.0);
        Some(DrainedBatch { events, totals })
    }

    pub fn pending_len(&self) -> usize {
        self.lock().pending.len()
    }

    pub fn totals(&self) -> KindTotals {
        self.lock().totals.clone()
    }

    pub fn last_flush(&self) -> DateTime<Utc> {
        self.lock().last_flush
    }

    fn lock(&self) -> MutexGuard<'_, BufferState> {
        // Every mutation completes before the guard drops; poisoning is harmless.
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
