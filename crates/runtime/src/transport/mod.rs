//! Persistent duplex transport.
//!
//! The session never touches a socket directly. A [`Connector`] opens a channel
//! and hands back [`TransportParts`]: an outbound frame sender and a stream of
//! [`TransportEvent`]s. Reader and writer tasks live behind the connector, so
//! the session's event loop only ever does non-blocking channel operations.
//!
//! - [`WebSocketConnector`] - `tokio-tungstenite` client
//! - [`MemoryConnector`] - in-process link, used by tests and embedders

use std::future::Future;
use std::pin::Pin;

use tokio::sync::mpsc;
use url::Url;

use crate::error::Result;

pub mod memory;
pub mod websocket;

pub use memory::{MemoryConnector, ServerEnd};
pub use websocket::WebSocketConnector;

/// Input event produced by an open channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
	/// Text frame from the server
	Frame(String),
	/// Channel-level failure; the channel may still close afterwards
	Error(String),
	/// Channel closed, with the peer's reason when it gave one
	Closed(Option<String>),
}

/// Both halves of an open channel.
///
/// Dropping `outbound` asks the channel to close. A closed `events` receiver
/// is equivalent to [`TransportEvent::Closed`].
pub struct TransportParts {
	pub outbound: mpsc::UnboundedSender<String>,
	pub events: mpsc::UnboundedReceiver<TransportEvent>,
}

/// Opens duplex channels to an endpoint.
///
/// Returning `Ok` is the channel's open event.
pub trait Connector: Send + Sync {
	fn open<'a>(
		&'a self,
		endpoint: &'a Url,
	) -> Pin<Box<dyn Future<Output = Result<TransportParts>> + Send + 'a>>;
}
