//! Async side of the notifier: the websocket subscription, the frame
//! pipeline feeding the shared buffer, and the digest dispatcher. The binary
//! in `main.rs` wires these together; tests drive them through the
//! [`stream::StreamConnector`] and [`notifier::Notifier`] seams.

pub mod dispatcher;
pub mod notifier;
pub mod pipeline;
pub mod stream;
pub mod worker;

pub use dispatcher::{render_digest, DigestDispatcher, TickOutcome};
pub use notifier::{Digest, Notifier, NotifierError, SendGridNotifier};
pub use pipeline::{process_frame, FrameError, FrameOutcome};
pub use stream::{StreamConnector, WebSocketConnector};
pub use worker::{shutdown_signal, MonitorError, ReconnectPolicy, SubscriptionClient};
