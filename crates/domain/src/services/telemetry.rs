use std::{
    env,
    future::Future,
    fs::{File, OpenOptions},
    net::SocketAddr,
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;
use thiserror::Error;
use tracing::warn;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::hydrate_env_file;

pub const DEFAULT_LOG_FILE: &str = "events.log";

static SUBSCRIBER_INSTALLED: OnceCell<()> = OnceCell::new();
static METRICS_HANDLE: OnceCell<Arc<PrometheusHandle>> = OnceCell::new();

/// Shared observability options for binaries.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    log_filter: String,
    metrics_address: Option<String>,
    log_file: Option<PathBuf>,
}

impl TelemetryConfig {
    /// Loads telemetry knobs from optional environment variables prefixed with
    /// `<PREFIX>_`, e.g. `NOTIFY_LOG_FILTER`. The operational log lands in
    /// `<PREFIX>_LOG_FILE` (default `events.log`); setting it to `-` keeps
    /// logging on stdout only.
    pub fn from_env(prefix: &str) -> Self {
        let _ = hydrate_env_file();
        let upper = prefix.trim().to_ascii_uppercase();
        let log_key = format!("{}_LOG_FILTER", upper);
        let metrics_key = format!("{}_METRICS_ADDRESS", upper);
        let file_key = format!("{}_LOG_FILE", upper);

        let log_filter = env::var(log_key).unwrap_or_else(|_| "info".to_string());
        let metrics_address = env::var(metrics_key).ok().and_then(|value| {
            if value.trim().is_empty() {
                None
            } else {
                Some(value)
            }
        });
        let log_file = match env::var(file_key) {
            Ok(value) if value.trim() == "-" => None,
            Ok(value) if !value.trim().is_empty() => Some(PathBuf::from(value.trim())),
            _ => Some(PathBuf::from(DEFAULT_LOG_FILE)),
        };

        Self {
            log_filter,
            metrics_address,
            log_file,
        }
    }

    pub fn log_filter(&self) -> &str {
        &self.log_filter
    }

    pub fn metrics_address(&self) -> Option<&str> {
        self.metrics_address.as_deref()
    }

    pub fn log_file(&self) -> Option<&Path> {
        self.log_file.as_deref()
    }
}

/// Guard returned after telemetry initialization.
#[derive(Clone)]
pub struct TelemetryGuard {
    metrics: Arc<PrometheusHandle>,
}

impl TelemetryGuard {
    pub fn render_metrics(&self) -> String {
        self.metrics.render()
    }
}

/// Centralized helper to wire up tracing + metrics exporters once per process.
///
/// When a metrics address is configured the Prometheus listener is spawned
/// on the current Tokio runtime, so call this from inside one.
pub fn init_telemetry(config: &TelemetryConfig) -> Result<TelemetryGuard, TelemetryError> {
    install_tracing(config)?;
    let metrics = install_metrics(config)?;

    Ok(TelemetryGuard { metrics })
}

fn install_tracing(config: &TelemetryConfig) -> Result<(), TelemetryError> {
    if SUBSCRIBER_INSTALLED.get().is_some() {
        return Ok(());
    }

    let env_filter = EnvFilter::try_new(config.log_filter())
        .map_err(|err| TelemetryError::InvalidLogFilter(err.to_string()))?;

    let sink = config.log_file().map(open_log_sink).transpose()?;
    let file_layer = sink.map(|file| {
        tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_target(false)
            .with_writer(Mutex::new(file))
    });

    if SUBSCRIBER_INSTALLED.set(()).is_ok() {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().with_target(true))
            .with(file_layer)
            .try_init()
            .map_err(|err| TelemetryError::Tracing(err.to_string()))?;
    }

    Ok(())
}

fn open_log_sink(path: &Path) -> Result<File, TelemetryError> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|err| TelemetryError::LogFile(path.display().to_string(), err.to_string()))
}

fn install_metrics(config: &TelemetryConfig) -> Result<Arc<PrometheusHandle>, TelemetryError> {
    METRICS_HANDLE
        .get_or_try_init(|| {
            let mut builder = PrometheusBuilder::new();
            let Some(addr) = config.metrics_address() else {
                return builder
                    .install_recorder()
                    .map(Arc::new)
                    .map_err(|err| TelemetryError::Metrics(err.to_string()));
            };

            let socket: SocketAddr = addr.parse().map_err(|err: std::net::AddrParseError| {
                TelemetryError::InvalidMetricsAddress(addr.to_string(), err.to_string())
            })?;
            builder = builder.with_http_listener(socket);
            let (recorder, exporter) = builder
                .build()
                .map_err(|err| TelemetryError::Metrics(err.to_string()))?;
            let handle = recorder.handle();
            metrics::set_global_recorder(recorder)
                .map_err(|err| TelemetryError::Metrics(err.to_string()))?;
            spawn_exporter(exporter);
            Ok(Arc::new(handle))
        })
        .cloned()
}

fn spawn_exporter<F, E>(exporter: F)
where
    F: Future<Output = Result<(), E>> + Send + 'static,
    E: std::fmt::Debug + Send + 'static,
{
    match tokio::runtime::Handle::try_current() {
        Ok(runtime) => {
            runtime.spawn(async move {
                if let Err(err) = exporter.await {
                    warn!(?err, "metrics exporter stopped");
                }
            });
        }
        Err(_) => warn!("no tokio runtime, metrics listener not started"),
    }
}

#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("invalid log filter: {0}")]
    InvalidLogFilter(String),
    #[error("failed to install tracing subscriber: {0}")]
    Tracing(String),
    #[error("failed to open log file `{0}`: {1}")]
    LogFile(String, String),
    #[error("invalid metrics address `{0}`: {1}")]
    InvalidMetricsAddress(String, String),
    #[error("failed to install metrics recorder: {0}")]
    Metrics(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    static ENV_GUARD: Mutex<()> = Mutex::new(());

    fn clear(prefix: &str) {
        env::remove_var(format!("{prefix}_LOG_FILTER"));
        env::remove_var(format!("{prefix}_METRICS_ADDRESS"));
        env::remove_var(format!("{prefix}_LOG_FILE"));
    }

    #[test]
    fn telemetry_config_uses_defaults() {
        let _guard = ENV_GUARD.lock().unwrap();
        env::set_var("NANO_NOTIFY_SKIP_DOTENV", "1");
        clear("NOTIFY_TEST");

        let cfg = TelemetryConfig::from_env("notify_test");
        assert_eq!(cfg.log_filter(), "info");
        assert_eq!(cfg.metrics_address(), None);
        assert_eq!(cfg.log_file(), Some(Path::new(DEFAULT_LOG_FILE)));
    }

    #[test]
    fn telemetry_config_reads_env() {
        let _guard = ENV_GUARD.lock().unwrap();
        env::set_var("NANO_NOTIFY_SKIP_DOTENV", "1");
        env::set_var("NOTIFY_TEST_LOG_FILTER", "debug");
        env::set_var("NOTIFY_TEST_METRICS_ADDRESS", "127.0.0.1:9898");
        env::set_var("NOTIFY_TEST_LOG_FILE", "/var/log/notify.log");
        let cfg = TelemetryConfig::from_env("NOTIFY_TEST");
        assert_eq!(cfg.log_filter(), "debug");
        assert_eq!(cfg.metrics_address(), Some("127.0.0.1:9898"));
        assert_eq!(cfg.log_file(), Some(Path::new("/var/log/notify.log")));
        clear("NOTIFY_TEST");
    }

    #[test]
    fn dash_disables_log_file_and_blank_metrics_is_none() {
        let _guard = ENV_GUARD.lock().unwrap();
        env::set_var("NANO_NOTIFY_SKIP_DOTENV", "1");
        env::set_var("NOTIFY_TEST_LOG_FILE", "-");
        env::set_var("NOTIFY_TEST_METRICS_ADDRESS", "  ");
        let cfg = TelemetryConfig::from_env("NOTIFY_TEST");
        assert_eq!(cfg.log_file(), None);
        assert_eq!(cfg.metrics_address(), None);
        clear("NOTIFY_TEST");
    }

    #[test]
    fn log_sink_opens_in_append_mode() {
        use std::io::Write;

        let path = env::temp_dir().join(format!("nano-notify-sink-{}.log", std::process::id()));
        std::fs::write(&path, "first\n").unwrap();
        let mut sink = open_log_sink(&path).expect("sink opens");
        sink.write_all(b"second\n").unwrap();
        drop(sink);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "first\nsecond\n");
        std::fs::remove_file(&path).ok();
    }
}
