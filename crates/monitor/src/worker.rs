use std::{future::Future, io, sync::Arc, time::Duration};

use metrics::{counter, gauge};
use thiserror::Error;
use tokio::time::sleep;
use tracing::{info, warn};

use nano_notify_domain::{
    config::ConfigError, services::telemetry::TelemetryError, EventClassifier, NotificationBuffer,
};

use crate::{
    notifier::NotifierError,
    pipeline::{process_frame, FrameError, FrameOutcome},
    stream::{FrameStream, StreamConnector, SubscribeRequest},
};

#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("telemetry error: {0}")]
    Telemetry(#[from] TelemetryError),
    #[error("connection error: {0}")]
    Connection(String),
    #[error("notifier error: {0}")]
    Notifier(#[from] NotifierError),
}

/// Delay before the n-th consecutive reconnect: `base * 2^(n-1)`, capped at
/// `max`. With `base == max` every retry waits the same fixed delay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub base: Duration,
    pub max: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            base: Duration::from_secs(5),
            max: Duration::from_secs(5),
        }
    }
}

impl ReconnectPolicy {
    pub fn delay_for(&self, failures: u32) -> Duration {
        let exponent = failures.saturating_sub(1).min(16);
        self.base.saturating_mul(1 << exponent).min(self.max.max(self.base))
    }
}

/// How a single connection ended.
#[derive(Debug)]
struct SessionEnd {
    acknowledged: bool,
    reason: MonitorError,
}

/// Keeps one confirmation subscription alive for the life of the process and
/// feeds every relevant event into the shared buffer.
pub struct SubscriptionClient<C> {
    connector: C,
    classifier: EventClassifier,
    buffer: Arc<NotificationBuffer>,
    subscribe_all: bool,
    policy: ReconnectPolicy,
}

impl<C> SubscriptionClient<C>
where
    C: StreamConnector,
{
    pub fn new(
        connector: C,
        classifier: EventClassifier,
        buffer: Arc<NotificationBuffer>,
        subscribe_all: bool,
        policy: ReconnectPolicy,
    ) -> Self {
        Self {
            connector,
            classifier,
            buffer,
            subscribe_all,
            policy,
        }
    }

    /// Filter derived from the registry; `None` in subscribe-all mode.
    pub fn subscribe_request(&self) -> SubscribeRequest {
        if self.subscribe_all {
            return SubscribeRequest::confirmations(None);
        }
        SubscribeRequest::confirmations(Some(
            self.classifier.registry().tracked_addresses().to_vec(),
        ))
    }

    /// Never returns; connection failures only lead to another attempt.
    pub async fn run(&self) {
        if !self.subscribe_all && self.classifier.registry().is_empty() {
            warn!("no tracked accounts loaded, subscription filter is empty");
        }

        let mut failures: u32 = 0;
        loop {
            let request = self.subscribe_request();
            let end = self.run_session(&request).await;
            if end.acknowledged {
                failures = 0;
            }
            failures = failures.saturating_add(1);
            let delay = self.policy.delay_for(failures);

            counter!("notify_stream_reconnects_total").increment(1);
            gauge!("notify_stream_connected").set(0.0);
            warn!(
                error = %end.reason,
                attempt = failures,
                delay_secs = delay.as_secs_f64(),
                "confirmation stream failed, reconnecting"
            );
            sleep(delay).await;
        }
    }

    async fn run_session(&self, request: &SubscribeRequest) -> SessionEnd {
        let mut stream = match self.connector.connect(request).await {
            Ok(stream) => stream,
            Err(reason) => {
                counter!("notify_stream_connections_total", "result" => "error").increment(1);
                return SessionEnd {
                    acknowledged: false,
                    reason,
                };
            }
        };
        counter!("notify_stream_connections_total", "result" => "ok").increment(1);
        gauge!("notify_stream_connected").set(1.0);

        let mut acknowledged = false;
        loop {
            let text = match stream.next_frame().await {
                Some(Ok(text)) => text,
                Some(Err(reason)) => {
                    return SessionEnd {
                        acknowledged,
                        reason,
                    }
                }
                None => {
                    return SessionEnd {
                        acknowledged,
                        reason: MonitorError::Connection("stream closed by server".into()),
                    }
                }
            };

            match process_frame(&text, &self.classifier, &self.buffer) {
                Ok(FrameOutcome::Acknowledged) => {
                    acknowledged = true;
                    info!("subscription acknowledged, waiting for transactions");
                }
                Ok(_) => {}
                Err(FrameError::Decode(err)) => {
                    warn!(error = %err, frame = %text, "dropping undecodable frame");
                }
                Err(FrameError::Classification(err)) => {
                    warn!(error = %err, frame = %text, "dropping unclassifiable confirmation");
                }
            }
        }
    }
}

/// Resolves once `signal` fires. A signal that cannot be installed never
/// resolves, so the worker racing against it keeps running.
pub async fn shutdown_signal<F>(signal: F)
where
    F: Future<Output = io::Result<()>>,
{
    if let Err(err) = signal.await {
        warn!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
