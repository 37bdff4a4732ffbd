use metrics::counter;
use nano_notify_domain::{
    classifier::{ClassificationError, EventClassifier},
    model::EventKind,
    NotificationBuffer,
};
use thiserror::Error;
use tracing::{debug, info};

use crate::stream::{decode_frame, DecodeError, ServerMessage};

/// What happened to a single text frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    Acknowledged,
    Buffered(EventKind),
    /// A confirmation that does not concern a tracked account.
    Irrelevant,
    /// Not a confirmation at all.
    Ignored,
}

/// Per-frame failures; the stream keeps running after either.
#[derive(Debug, Error)]
pub enum FrameError {
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),
    #[error("classification error: {0}")]
    Classification(#[from] ClassificationError),
}

/// Decodes one frame, classifies it and buffers the result when relevant.
pub fn process_frame(
    text: &str,
    classifier: &EventClassifier,
    buffer: &NotificationBuffer,
) -> Result<FrameOutcome, FrameError> {
    let message = decode_frame(text).inspect_err(|_| {
        counter!("notify_frames_total", "result" => "decode_error").increment(1);
    })?;

    let event = match message {
        ServerMessage::Ack => {
            counter!("notify_frames_total", "result" => "ack").increment(1);
            return Ok(FrameOutcome::Acknowledged);
        }
        ServerMessage::Other(topic) => {
            debug!(?topic, "ignoring non-confirmation frame");
            counter!("notify_frames_total", "result" => "ignored").increment(1);
            return Ok(FrameOutcome::Ignored);
        }
        ServerMessage::Confirmation(event) => event,
    };
    counter!("notify_frames_total", "result" => "decoded").increment(1);

    let Some(classified) = classifier.classify(&event).inspect_err(|_| {
        counter!("notify_classifications_total", "kind" => "error").increment(1);
    })?
    else {
        counter!("notify_classifications_total", "kind" => "irrelevant").increment(1);
        return Ok(FrameOutcome::Irrelevant);
    };

    let kind = classified.kind;
    info!(kind = kind.label(), "{}", classified.text.plain);
    counter!("notify_classifications_total", "kind" => kind.label()).increment(1);
    buffer.append(classified);
    Ok(FrameOutcome::Buffered(kind))
}
