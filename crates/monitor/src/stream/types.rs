//! Wire format of the node's websocket confirmation topic.

use nano_notify_domain::{
    amount::{AmountError, RawAmount},
    model::{BlockSubtype, RawConfirmationEvent},
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

pub const CONFIRMATION_TOPIC: &str = "confirmation";
pub const SUBSCRIPTION_ID: &str = "12345";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubscribeRequest {
    pub action: &'static str,
    pub topic: &'static str,
    pub ack: &'static str,
    pub id: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<SubscribeOptions>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubscribeOptions {
    pub accounts: Vec<String>,
}

impl SubscribeRequest {
    /// `None` subscribes to every confirmation on the network.
    pub fn confirmations(accounts: Option<Vec<String>>) -> Self {
        Self {
            action: "subscribe",
            topic: CONFIRMATION_TOPIC,
            ack: "true",
            id: SUBSCRIPTION_ID,
            options: accounts.map(|accounts| SubscribeOptions { accounts }),
        }
    }

    pub fn is_filtered(&self) -> bool {
        self.options.is_some()
    }
}

/// A decoded server frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerMessage {
    Ack,
    Confirmation(RawConfirmationEvent),
    /// Any other topic (or none); carries the topic for logging.
    Other(Option<String>),
}

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    ack: Option<Value>,
    #[serde(default)]
    topic: Option<String>,
    #[serde(default)]
    message: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct WireConfirmation {
    #[serde(default)]
    account: Option<String>,
    #[serde(default)]
    amount: Option<String>,
    #[serde(default)]
    block: Option<WireBlock>,
}

#[derive(Debug, Deserialize)]
struct WireBlock {
    #[serde(default)]
    account: Option<String>,
    #[serde(default)]
    subtype: Option<String>,
    #[serde(default)]
    link_as_account: Option<String>,
    #[serde(default)]
    representative: Option<String>,
}

pub fn decode_frame(text: &str) -> Result<ServerMessage, DecodeError> {
    let envelope: Envelope = serde_json::from_str(text)?;
    if envelope.ack.is_some() {
        return Ok(ServerMessage::Ack);
    }
    if envelope.topic.as_deref() != Some(CONFIRMATION_TOPIC) {
        return Ok(ServerMessage::Other(envelope.topic));
    }

    let message = envelope.message.ok_or(DecodeError::MissingField("message"))?;
    let wire: WireConfirmation = serde_json::from_value(message)?;
    let block = wire.block.ok_or(DecodeError::MissingField("message.block"))?;
    let account = block
        .account
        .or(wire.account)
        .ok_or(DecodeError::MissingField("message.block.account"))?;
    let amount = wire.amount.as_deref().map(RawAmount::parse).transpose()?;

    Ok(ServerMessage::Confirmation(RawConfirmationEvent {
        account,
        amount,
        subtype: block.subtype.as_deref().map(BlockSubtype::parse),
        link_as_account: block.link_as_account,
        representative: block.representative,
    }))
}

/// A frame that could not be turned into a [`ServerMessage`].
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("malformed frame: {0}")]
    Json(#[from] serde_json::Error),
    #[error("frame is missing `{0}`")]
    MissingField(&'static str),
    #[error("invalid amount: {0}")]
    InvalidAmount(#[from] AmountError),
}
