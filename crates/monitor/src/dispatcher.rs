use std::{sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use metrics::counter;
use nano_notify_domain::{DrainedBatch, EventKind, NotificationBuffer};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info};

use crate::notifier::{Digest, Notifier};

pub const DIGEST_SUBJECT: &str = "Nano Address Notifier: Transaction events";

/// Renders a drained batch into the digest handed to the notifier.
pub fn render_digest(batch: &DrainedBatch) -> Digest {
    let mut html_body = String::from("<strong>Transactions occured:</strong><br><br>");
    for event in &batch.events {
        html_body.push_str(&event.text.markup);
        html_body.push_str("<br>");
    }
    html_body.push_str(&format!(
        "<br><strong>Totals:</strong> sent {} NANO, received {} NANO, incoming {} NANO",
        batch.totals.get(EventKind::Send),
        batch.totals.get(EventKind::Receive),
        batch.totals.get(EventKind::Incoming),
    ));

    Digest {
        subject: DIGEST_SUBJECT.to_string(),
        html_body,
        lines: batch
            .events
            .iter()
            .map(|event| event.text.plain.clone())
            .collect(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Nothing pending, or the interval has not elapsed yet.
    Idle,
    /// Delivery is disabled; the batch was drained and dropped.
    Discarded(usize),
    Delivered(usize),
    /// The notifier failed; the batch is gone either way.
    Failed(usize),
}

/// Periodically drains the buffer and hands each batch to the notifier.
pub struct DigestDispatcher<N> {
    buffer: Arc<NotificationBuffer>,
    notifier: Option<N>,
    tick: Duration,
    min_interval: Duration,
}

impl<N> DigestDispatcher<N>
where
    N: Notifier,
{
    /// `notifier == None` disables delivery without stopping the drain cycle.
    pub fn new(
        buffer: Arc<NotificationBuffer>,
        notifier: Option<N>,
        tick: Duration,
        min_interval: Duration,
    ) -> Self {
        Self {
            buffer,
            notifier,
            tick,
            min_interval,
        }
    }

    pub async fn run(&self) {
        info!(
            tick_ms = self.tick.as_millis() as u64,
            interval_secs = self.min_interval.as_secs(),
            delivery = self.notifier.is_some(),
            "digest dispatcher started"
        );
        let mut ticker = interval(self.tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            self.tick_once(Utc::now()).await;
        }
    }

    pub async fn tick_once(&self, now: DateTime<Utc>) -> TickOutcome {
        let Some(batch) = self.buffer.drain_if_due(now, self.min_interval) else {
            return TickOutcome::Idle;
        };
        let count = batch.events.len();

        let Some(notifier) = &self.notifier else {
            debug!(events = count, "delivery disabled, discarding digest");
            counter!("notify_digests_total", "result" => "discarded").increment(1);
            return TickOutcome::Discarded(count);
        };

        let digest = render_digest(&batch);
        info!(events = count, "sending digest");
        match notifier.send(&digest).await {
            Ok(()) => {
                counter!("notify_digests_total", "result" => "delivered").increment(1);
                TickOutcome::Delivered(count)
            }
            Err(err) => {
                error!(error = %err, events = count, "failed to deliver digest");
                counter!("notify_digests_total", "result" => "failed").increment(1);
                TickOutcome::Failed(count)
            }
        }
    }
}
