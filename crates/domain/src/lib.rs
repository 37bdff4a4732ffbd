//! Domain-level building blocks for the Nano address notifier.
//!
//! The account registry, exact amount handling, the confirmation classifier
//! and the notification buffer shared between the stream worker and the
//! digest dispatcher are all synchronous. The async plumbing lives in
//! `nano_notify_monitor`; only telemetry setup touches the Tokio runtime.

pub mod amount;
pub mod buffer;
pub mod classifier;
pub mod config;
pub mod model;
pub mod registry;
pub mod services;

pub use amount::{AmountError, RawAmount, NANO_DECIMALS};
pub use buffer::{DrainedBatch, KindTotals, NotificationBuffer};
pub use classifier::{ClassificationError, ClassifierSettings, EventClassifier};
pub use config::{ConfigError, EmailConfig, NotifierConfig};
pub use model::{
    Account, BlockSubtype, ClassifiedEvent, EventKind, EventText, RawConfirmationEvent,
};
pub use registry::{AccountRegistry, ConfigLoadError};
