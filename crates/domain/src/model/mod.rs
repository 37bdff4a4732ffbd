//! Data structures shared by the classifier, the buffer and the monitor.

use std::fmt;

use strum_macros::{AsRefStr, EnumIter, IntoStaticStr};

use crate::amount::RawAmount;

/// Alias used when the account source does not name an account.
pub const DEFAULT_ALIAS: &str = "N/A";

/// A tracked ledger address together with its display alias.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Account {
    pub address: String,
    pub alias: String,
}

impl Account {
    pub fn new(address: impl Into<String>, alias: Option<String>) -> Self {
        Self {
            address: address.into(),
            alias: alias.unwrap_or_else(|| DEFAULT_ALIAS.to_string()),
        }
    }
}

/// Block subtype reported by the confirmation feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockSubtype {
    Send,
    Receive,
    Change,
    /// `open`, `epoch` and anything else the feed may add.
    Other(String),
}

impl BlockSubtype {
    pub fn parse(value: &str) -> Self {
        match value {
            "send" => Self::Send,
            "receive" => Self::Receive,
            "change" => Self::Change,
            other => Self::Other(other.to_string()),
        }
    }
}

/// One confirmed block, validated at the decode boundary.
///
/// Only the fields every confirmation must carry are mandatory; the
/// subtype-specific ones stay optional and are checked by the classifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawConfirmationEvent {
    /// Account that signed the block.
    pub account: String,
    /// `None` when the feed omitted the amount (e.g. some change blocks).
    pub amount: Option<RawAmount>,
    pub subtype: Option<BlockSubtype>,
    /// Destination for sends, source hash rendered as an address otherwise.
    pub link_as_account: Option<String>,
    pub representative: Option<String>,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, AsRefStr, EnumIter, IntoStaticStr,
)]
#[strum(serialize_all = "snake_case")]
pub enum EventKind {
    Send,
    Receive,
    Change,
    Incoming,
}

impl EventKind {
    /// Stable snake_case name, usable as a metrics label.
    pub fn label(self) -> &'static str {
        self.into()
    }

    /// Kinds that move funds and therefore contribute to digest totals.
    pub fn carries_amount(self) -> bool {
        !matches!(self, EventKind::Change)
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_ref())
    }
}

/// Both renderings of a classified event: plain text for the log sink and
/// markup for the notification body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventText {
    pub plain: String,
    pub markup: String,
}

/// A confirmation that concerns a tracked account.
///
/// `amount` is `None` exactly when `kind` is [`EventKind::Change`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifiedEvent {
    pub kind: EventKind,
    pub account: String,
    pub alias: String,
    pub amount: Option<RawAmount>,
    pub counterpart: Option<String>,
    pub text: EventText,
}
