//! Decides whether a confirmation concerns a tracked account and describes it.

use std::sync::Arc;

use metrics::counter;
use thiserror::Error;
use tracing::warn;

use crate::{
    amount::{is_above_threshold, RawAmount},
    model::{BlockSubtype, ClassifiedEvent, EventKind, EventText, RawConfirmationEvent},
    registry::AccountRegistry,
};

/// Classification knobs taken from configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifierSettings {
    pub min_amount: RawAmount,
    /// Prefix turned into `<a href="{prefix}{address}">` in markup.
    pub explorer_url: String,
}

#[derive(Debug, Clone)]
pub struct EventClassifier {
    registry: Arc<AccountRegistry>,
    settings: ClassifierSettings,
}

impl EventClassifier {
    pub fn new(registry: Arc<AccountRegistry>, settings: ClassifierSettings) -> Self {
        Self { registry, settings }
    }

    pub fn registry(&self) -> &AccountRegistry {
        &self.registry
    }

    /// Returns `Ok(None)` for confirmations that are not relevant.
    ///
    /// When both the signer and the link account are tracked only the
    /// signer's framing is produced.
    pub fn classify(
        &self,
        event: &RawConfirmationEvent,
    ) -> Result<Option<ClassifiedEvent>, ClassificationError> {
        let amount = event.amount.unwrap_or(RawAmount::ZERO);
        let amount_ok = is_above_threshold(amount, self.settings.min_amount);

        if self.registry.contains(&event.account) {
            let subtype = event
                .subtype
                .as_ref()
                .ok_or(ClassificationError::MissingField("block.subtype"))?;
            return match subtype {
                BlockSubtype::Send if amount_ok => {
                    let link = required(&event.link_as_account, "block.link_as_account")?;
                    self.build(EventKind::Send, &event.account, Some(amount), Some(link))
                        .map(Some)
                }
                BlockSubtype::Receive if amount_ok => self
                    .build(EventKind::Receive, &event.account, Some(amount), None)
                    .map(Some),
                BlockSubtype::Change => {
                    let rep = required(&event.representative, "block.representative")?;
                    self.build(EventKind::Change, &event.account, None, Some(rep))
                        .map(Some)
                }
                _ => Ok(None),
            };
        }

        match (&event.link_as_account, &event.subtype) {
            (Some(link), Some(BlockSubtype::Send)) if self.registry.contains(link) => {
                if !amount_ok {
                    return Ok(None);
                }
                self.build(EventKind::Incoming, link, Some(amount), Some(&event.account))
                    .map(Some)
            }
            _ => Ok(None),
        }
    }

    fn build(
        &self,
        kind: EventKind,
        account: &str,
        amount: Option<RawAmount>,
        counterpart: Option<&str>,
    ) -> Result<ClassifiedEvent, ClassificationError> {
        let Some(alias) = self.registry.alias_of(account) else {
            warn!(account, kind = kind.as_ref(), "tracked account has no alias");
            counter!("notify_classification_errors_total", "reason" => "unknown_alias")
                .increment(1);
            return Err(ClassificationError::UnknownAlias(account.to_string()));
        };

        let text = EventText {
            plain: describe(kind, alias, account, amount, counterpart, &|address: &str| {
                address.to_string()
            }),
            markup: describe(
                kind,
                &escape_html(alias),
                account,
                amount,
                counterpart,
                &|address: &str| self.link(address),
            ),
        };

        Ok(ClassifiedEvent {
            kind,
            account: account.to_string(),
            alias: alias.to_string(),
            amount,
            counterpart: counterpart.map(str::to_string),
            text,
        })
    }

    fn link(&self, address: &str) -> String {
        let address = escape_html(address);
        format!(
            "<a href=\"{}{address}\">{address}</a>",
            escape_html(&self.settings.explorer_url)
        )
    }
}

fn required<'a>(
    field: &'a Option<String>,
    name: &'static str,
) -> Result<&'a str, ClassificationError> {
    field
        .as_deref()
        .ok_or(ClassificationError::MissingField(name))
}

fn describe(
    kind: EventKind,
    alias: &str,
    account: &str,
    amount: Option<RawAmount>,
    counterpart: Option<&str>,
    address: &dyn Fn(&str) -> String,
) -> String {
    let head = format!("Account {alias} ({})", address(account));
    let amount = amount.unwrap_or_default();
    let other = counterpart.map(address).unwrap_or_default();
    match kind {
        EventKind::Send => format!("{head} sent {amount} NANO to {other}"),
        EventKind::Receive => format!("{head} received {amount} NANO"),
        EventKind::Change => format!("{head} changed rep to {other}"),
        EventKind::Incoming => format!("{head} got incoming {amount} NANO from {other}"),
    }
}

fn escape_html(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

/// A decoded confirmation is missing data its subtype requires.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ClassificationError {
    #[error("confirmation is missing `{0}`")]
    MissingField(&'static str),
    #[error("no alias registered for tracked account {0}")]
    UnknownAlias(String),
}
