//! Notifier binary: follows the confirmation stream for the configured
//! accounts and mails periodic digests.

use std::{io, sync::Arc};

use nano_notify_domain::{
    classifier::ClassifierSettings,
    config::NotifierConfig,
    services::telemetry::{init_telemetry, TelemetryConfig},
    AccountRegistry, EventClassifier, NotificationBuffer,
};
use nano_notify_monitor::{
    shutdown_signal, DigestDispatcher, MonitorError, ReconnectPolicy, SendGridNotifier,
    SubscriptionClient, WebSocketConnector,
};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> io::Result<()> {
    if let Err(err) = bootstrap().await {
        eprintln!("[notifier] bootstrap failed: {err}");
        return Err(io::Error::other(err.to_string()));
    }

    Ok(())
}

async fn bootstrap() -> Result<(), MonitorError> {
    let _ = rustls::crypto::ring::default_provider().install_default();

    let config = NotifierConfig::load_from_env()?;
    let telemetry_config = TelemetryConfig::from_env("NOTIFY");
    let _telemetry = init_telemetry(&telemetry_config)?;

    let registry = AccountRegistry::load_or_default(config.accounts_file());

    let classifier = EventClassifier::new(
        Arc::new(registry),
        ClassifierSettings {
            min_amount: config.min_amount(),
            explorer_url: config.explorer_url().to_string(),
        },
    );
    let buffer = Arc::new(NotificationBuffer::with_capacity(config.buffer_capacity()));

    let notifier = config.email().cloned().map(SendGridNotifier::new).transpose()?;
    if notifier.is_none() {
        warn!("email delivery disabled, events are only logged");
    }
    let dispatcher = DigestDispatcher::new(
        Arc::clone(&buffer),
        notifier,
        config.tick_interval(),
        config.notify_interval(),
    );
    tokio::spawn(async move { dispatcher.run().await });

    let client = SubscriptionClient::new(
        WebSocketConnector::new(config.stream_url()),
        classifier,
        buffer,
        config.subscribe_all(),
        ReconnectPolicy {
            base: config.reconnect_delay(),
            max: config.reconnect_max_delay(),
        },
    );

    tokio::select! {
        _ = client.run() => {}
        _ = shutdown_signal(tokio::signal::ctrl_c()) => info!("shutting down"),
    }

    Ok(())
}
