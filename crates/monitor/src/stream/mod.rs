use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::{
    connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream,
};
use tracing::{debug, info};

use crate::worker::MonitorError;

mod types;

pub use types::{
    decode_frame, DecodeError, ServerMessage, SubscribeOptions, SubscribeRequest,
    CONFIRMATION_TOPIC,
};

/// A live subscription yielding raw text frames.
#[async_trait]
pub trait FrameStream: Send {
    /// `None` once the server has closed the connection.
    async fn next_frame(&mut self) -> Option<Result<String, MonitorError>>;
}

/// Opens a connection and sends the subscribe request.
#[async_trait]
pub trait StreamConnector: Send + Sync {
    type Stream: FrameStream;

    async fn connect(&self, request: &SubscribeRequest) -> Result<Self::Stream, MonitorError>;
}

pub struct WebSocketConnector {
    url: String,
}

impl WebSocketConnector {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

#[async_trait]
impl StreamConnector for WebSocketConnector {
    type Stream = WebSocketFrames;

    async fn connect(&self, request: &SubscribeRequest) -> Result<WebSocketFrames, MonitorError> {
        let (mut socket, _) = connect_async(self.url.as_str())
            .await
            .map_err(|err| MonitorError::Connection(format!("connect {}: {err}", self.url)))?;

        let payload = serde_json::to_string(request)
            .map_err(|err| MonitorError::Connection(format!("encode subscribe: {err}")))?;
        socket
            .send(Message::Text(payload))
            .await
            .map_err(|err| MonitorError::Connection(format!("send subscribe: {err}")))?;

        info!(
            url = %self.url,
            filtered = request.is_filtered(),
            "subscribed to confirmations, waiting for acknowledgement"
        );
        Ok(WebSocketFrames { socket })
    }
}

pub struct WebSocketFrames {
    socket: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait]
impl FrameStream for WebSocketFrames {
    async fn next_frame(&mut self) -> Option<Result<String, MonitorError>> {
        loop {
            match self.socket.next().await? {
                Ok(Message::Text(text)) => return Some(Ok(text)),
                Ok(Message::Close(frame)) => {
                    debug!(?frame, "server closed websocket");
                    return None;
                }
                Ok(_) => continue,
                Err(err) => return Some(Err(MonitorError::Connection(format!("ws: {err}")))),
            }
        }
    }
}
