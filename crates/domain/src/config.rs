//! Environment-driven configuration shared by the monitor binary and tests.

use std::{env, time::Duration};

use thiserror::Error;

use crate::amount::{AmountError, RawAmount};

pub const DEFAULT_STREAM_URL: &str = "wss://socket.nanos.cc";
pub const DEFAULT_ACCOUNTS_FILE: &str = "accounts.json";
pub const DEFAULT_MIN_AMOUNT: &str = "0.0000001";
pub const DEFAULT_EXPLORER_URL: &str = "https://nanolooker.com/account/";

/// Email delivery settings; only present when delivery is enabled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailConfig {
    from: String,
    to: Vec<String>,
    api_key: String,
}

impl EmailConfig {
    pub fn new(from: impl Into<String>, to: Vec<String>, api_key: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to,
            api_key: api_key.into(),
        }
    }

    pub fn from(&self) -> &str {
        &self.from
    }

    pub fn to(&self) -> &[String] {
        &self.to
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }
}

/// Everything the monitor needs besides telemetry knobs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotifierConfig {
    stream_url: String,
    accounts_file: String,
    subscribe_all: bool,
    min_amount: RawAmount,
    notify_interval: Duration,
    tick_interval: Duration,
    reconnect_delay: Duration,
    reconnect_max_delay: Duration,
    buffer_capacity: usize,
    explorer_url: String,
    email: Option<EmailConfig>,
}

impl NotifierConfig {
    /// Hydrates `.env` (if present) and reads `NOTIFY_*` variables, falling
    /// back to defaults for everything except the email identities, which
    /// are required once `NOTIFY_EMAIL_ENABLED` is set.
    pub fn load_from_env() -> Result<Self, ConfigError> {
        hydrate_env_file()?;

        let min_amount_raw =
            get_optional_var("NOTIFY_MIN_AMOUNT").unwrap_or_else(|| DEFAULT_MIN_AMOUNT.into());
        let min_amount =
            RawAmount::from_nano_str(&min_amount_raw).map_err(|source| {
                ConfigError::InvalidAmount {
                    key: "NOTIFY_MIN_AMOUNT",
                    source,
                }
            })?;

        let reconnect_secs = get_number("NOTIFY_RECONNECT_SECS", 5)?.max(1);
        let reconnect_max_secs = get_number("NOTIFY_RECONNECT_MAX_SECS", reconnect_secs)?;

        let email = if get_bool("NOTIFY_EMAIL_ENABLED", false)? {
            let to = get_required_var("NOTIFY_EMAIL_TO")?
                .split(',')
                .map(str::trim)
                .filter(|addr| !addr.is_empty())
                .map(str::to_string)
                .collect::<Vec<_>>();
            if to.is_empty() {
                return Err(ConfigError::MissingVar {
                    key: "NOTIFY_EMAIL_TO",
                });
            }
            Some(EmailConfig {
                from: get_required_var("NOTIFY_EMAIL_FROM")?,
                to,
                api_key: get_required_var("SENDGRID_API_KEY")?,
            })
        } else {
            None
        };

        Ok(Self {
            stream_url: get_optional_var("NOTIFY_STREAM_URL")
                .unwrap_or_else(|| DEFAULT_STREAM_URL.into()),
            accounts_file: get_optional_var("NOTIFY_ACCOUNTS_FILE")
                .unwrap_or_else(|| DEFAULT_ACCOUNTS_FILE.into()),
            subscribe_all: get_bool("NOTIFY_SUBSCRIBE_ALL", false)?,
            min_amount,
            notify_interval: Duration::from_secs(get_number("NOTIFY_INTERVAL_SECS", 3600)?),
            tick_interval: Duration::from_millis(get_number("NOTIFY_TICK_MILLIS", 1000)?.max(1)),
            reconnect_delay: Duration::from_secs(reconnect_secs),
            reconnect_max_delay: Duration::from_secs(reconnect_max_secs.max(reconnect_secs)),
            buffer_capacity: get_number("NOTIFY_BUFFER_CAPACITY", 10_000)? as usize,
            explorer_url: get_optional_var("NOTIFY_EXPLORER_URL")
                .unwrap_or_else(|| DEFAULT_EXPLORER_URL.into()),
            email,
        })
    }

    pub fn stream_url(&self) -> &str {
        &self.stream_url
    }

    pub fn accounts_file(&self) -> &str {
        &self.accounts_file
    }

    pub fn subscribe_all(&self) -> bool {
        self.subscribe_all
    }

    pub fn min_amount(&self) -> RawAmount {
        self.min_amount
    }

    pub fn notify_interval(&self) -> Duration {
        self.notify_interval
    }

    pub fn tick_interval(&self) -> Duration {
        self.tick_interval
    }

    pub fn reconnect_delay(&self) -> Duration {
        self.reconnect_delay
    }

    pub fn reconnect_max_delay(&self) -> Duration {
        self.reconnect_max_delay
    }

    pub fn buffer_capacity(&self) -> usize {
        self.buffer_capacity
    }

    pub fn explorer_url(&self) -> &str {
        &self.explorer_url
    }

    /// `None` when delivery is disabled.
    pub fn email(&self) -> Option<&EmailConfig> {
        self.email.as_ref()
    }
}

fn get_required_var(key: &'static str) -> Result<String, ConfigError> {
    get_optional_var(key).ok_or(ConfigError::MissingVar { key })
}

fn get_optional_var(key: &'static str) -> Option<String> {
    env::var(key).ok().and_then(|value| {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

fn get_number(key: &'static str, default: u64) -> Result<u64, ConfigError> {
    match get_optional_var(key) {
        Some(value) => value
            .parse()
            .map_err(|source| ConfigError::InvalidNumber { key, source }),
        None => Ok(default),
    }
}

fn get_bool(key: &'static str, default: bool) -> Result<bool, ConfigError> {
    let Some(value) = get_optional_var(key) else {
        return Ok(default);
    };
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidBool { key, value }),
    }
}

pub fn hydrate_env_file() -> Result<(), ConfigError> {
    if env::var_os("NANO_NOTIFY_SKIP_DOTENV").is_some() {
        return Ok(());
    }
    match dotenvy::dotenv() {
        Ok(_) => {}
        Err(dotenvy::Error::Io(err)) if err.kind() == std::io::ErrorKind::NotFound => {}
        Err(err) => return Err(ConfigError::Dotenv { source: err }),
    }

    Ok(())
}

/// Errors emitted when `.env` hydration or environment parsing fails.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable `{key}`")]
    MissingVar { key: &'static str },
    #[error("invalid integer in `{key}`: {source}")]
    InvalidNumber {
        key: &'static str,
        #[source]
        source: std::num::ParseIntError,
    },
    #[error("invalid boolean `{value}` in `{key}`")]
    InvalidBool { key: &'static str, value: String },
    #[error("invalid amount in `{key}`: {source}")]
    InvalidAmount {
        key: &'static str,
        #[source]
        source: AmountError,
    },
    #[error("failed to load .env file: {source}")]
    Dotenv {
        #[from]
        source: dotenvy::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    static ENV_GUARD: Mutex<()> = Mutex::new(());

    const KEYS: [&str; 14] = [
        "NOTIFY_STREAM_URL",
        "NOTIFY_ACCOUNTS_FILE",
        "NOTIFY_SUBSCRIBE_ALL",
        "NOTIFY_MIN_AMOUNT",
        "NOTIFY_INTERVAL_SECS",
        "NOTIFY_TICK_MILLIS",
        "NOTIFY_RECONNECT_SECS",
        "NOTIFY_RECONNECT_MAX_SECS",
        "NOTIFY_BUFFER_CAPACITY",
        "NOTIFY_EXPLORER_URL",
        "NOTIFY_EMAIL_ENABLED",
        "NOTIFY_EMAIL_FROM",
        "NOTIFY_EMAIL_TO",
        "SENDGRID_API_KEY",
    ];

    fn reset_env() {
        env::set_var("NANO_NOTIFY_SKIP_DOTENV", "1");
        for key in KEYS {
            env::remove_var(key);
        }
    }

    #[test]
    fn defaults_match_baseline() {
        let _guard = ENV_GUARD.lock().unwrap();
        reset_env();

        let config = NotifierConfig::load_from_env().expect("config loads");
        assert_eq!(config.stream_url(), DEFAULT_STREAM_URL);
        assert_eq!(config.accounts_file(), DEFAULT_ACCOUNTS_FILE);
        assert!(!config.subscribe_all());
        assert_eq!(
            config.min_amount(),
            RawAmount::new(100_000_000_000_000_000_000_000)
        );
        assert_eq!(config.notify_interval(), Duration::from_secs(3600));
        assert_eq!(config.tick_interval(), Duration::from_secs(1));
        assert_eq!(config.reconnect_delay(), Duration::from_secs(5));
        assert_eq!(config.reconnect_max_delay(), Duration::from_secs(5));
        assert_eq!(config.buffer_capacity(), 10_000);
        assert!(config.email().is_none());
    }

    #[test]
    fn reads_overrides() {
        let _guard = ENV_GUARD.lock().unwrap();
        reset_env();
        env::set_var("NOTIFY_STREAM_URL", " ws://localhost:7078 ");
        env::set_var("NOTIFY_SUBSCRIBE_ALL", "yes");
        env::set_var("NOTIFY_MIN_AMOUNT", "1.5");
        env::set_var("NOTIFY_INTERVAL_SECS", "60");
        env::set_var("NOTIFY_RECONNECT_MAX_SECS", "120");

        let config = NotifierConfig::load_from_env().expect("config loads");
        assert_eq!(config.stream_url(), "ws://localhost:7078");
        assert!(config.subscribe_all());
        assert_eq!(config.min_amount().to_nano_string(), "1.5");
        assert_eq!(config.notify_interval(), Duration::from_secs(60));
        assert_eq!(config.reconnect_max_delay(), Duration::from_secs(120));

        reset_env();
    }

    #[test]
    fn email_requires_identities() {
        let _guard = ENV_GUARD.lock().unwrap();
        reset_env();
        env::set_var("NOTIFY_EMAIL_ENABLED", "true");
        env::set_var("NOTIFY_EMAIL_FROM", "send@example.com");
        env::set_var("SENDGRID_API_KEY", "key");

        let err = NotifierConfig::load_from_env().unwrap_err();
        assert!(matches!(
            err,
            ConfigError::MissingVar {
                key: "NOTIFY_EMAIL_TO"
            }
        ));

        env::set_var("NOTIFY_EMAIL_TO", "a@example.com, b@example.com,");
        let config = NotifierConfig::load_from_env().expect("config loads");
        let email = config.email().expect("email enabled");
        assert_eq!(email.from(), "send@example.com");
        assert_eq!(email.to(), ["a@example.com", "b@example.com"]);
        assert_eq!(email.api_key(), "key");

        reset_env();
    }

    #[test]
    fn malformed_values_are_rejected() {
        let _guard = ENV_GUARD.lock().unwrap();
        reset_env();
        env::set_var("NOTIFY_SUBSCRIBE_ALL", "maybe");
        assert!(matches!(
            NotifierConfig::load_from_env().unwrap_err(),
            ConfigError::InvalidBool { .. }
        ));

        reset_env();
        env::set_var("NOTIFY_MIN_AMOUNT", "0.1x");
        assert!(matches!(
            NotifierConfig::load_from_env().unwrap_err(),
            ConfigError::InvalidAmount { .. }
        ));

        reset_env();
        env::set_var("NOTIFY_INTERVAL_SECS", "-1");
        assert!(matches!(
            NotifierConfig::load_from_env().unwrap_err(),
            ConfigError::InvalidNumber {
                key: "NOTIFY_INTERVAL_SECS",
                ..
            }
        ));

        reset_env();
    }
}
