//! In-process transport.
//!
//! Each successful [`MemoryConnector::open`] yields a [`ServerEnd`] on the
//! connector's accept queue, from which the peer reads client frames and
//! pushes frames, errors and closes back.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use cinder_protocol::{Command, Message, Reply};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use url::Url;

use super::{Connector, TransportEvent, TransportParts};
use crate::error::{Error, Result};

/// Creates a connected client/peer pair.
pub fn link() -> (TransportParts, ServerEnd) {
	let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
	let (events_tx, events_rx) = mpsc::unbounded_channel();
	(
		TransportParts {
			outbound: outbound_tx,
			events: events_rx,
		},
		ServerEnd {
			inbound: outbound_rx,
			events: events_tx,
		},
	)
}

/// Peer side of an in-process channel.
///
/// Dropping it closes the channel from the client's point of view.
pub struct ServerEnd {
	inbound: mpsc::UnboundedReceiver<String>,
	events: mpsc::UnboundedSender<TransportEvent>,
}

impl ServerEnd {
	/// Next frame written by the client, or `None` once the client dropped the channel.
	pub async fn next_frame(&mut self) -> Option<String> {
		self.inbound.recv().await
	}

	/// Next frame written by the client, decoded as a command.
	pub async fn next_command(&mut self) -> Option<Command> {
		while let Some(frame) = self.next_frame().await {
			match Message::parse(&frame) {
				Ok(Message::Command(command)) => return Some(command),
				_ => tracing::debug!(frame, "Peer skipped non-command frame"),
			}
		}
		None
	}

	/// Pushes a raw text frame to the client.
	pub fn push(&self, frame: impl Into<String>) -> bool {
		self.events.send(TransportEvent::Frame(frame.into())).is_ok()
	}

	/// Pushes a command envelope to the client.
	pub fn push_command(&self, command: &Command) -> bool {
		match command.to_frame() {
			Ok(frame) => self.push(frame),
			Err(_) => false,
		}
	}

	/// Pushes a reply envelope to the client.
	pub fn reply(&self, reply: &Reply) -> bool {
		match serde_json::to_string(reply) {
			Ok(frame) => self.push(frame),
			Err(_) => false,
		}
	}

	/// Reports a channel-level error without closing.
	pub fn fail(&self, message: impl Into<String>) -> bool {
		self.events.send(TransportEvent::Error(message.into())).is_ok()
	}

	/// Closes the channel.
	pub fn close(self, reason: Option<&str>) {
		let _ = self.events.send(TransportEvent::Closed(reason.map(str::to_string)));
	}

	/// True once the client has dropped its side.
	pub fn is_abandoned(&self) -> bool {
		self.events.is_closed()
	}
}

/// Connector that hands every opened channel's peer side to the caller.
pub struct MemoryConnector {
	accepted: mpsc::UnboundedSender<ServerEnd>,
	refusals: AtomicUsize,
	opens: AtomicUsize,
	endpoints: Mutex<Vec<Url>>,
}

impl MemoryConnector {
	/// Returns the connector and the queue of accepted peers.
	pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<ServerEnd>) {
		let (tx, rx) = mpsc::unbounded_channel();
		let connector = Arc::new(Self {
			accepted: tx,
			refusals: AtomicUsize::new(0),
			opens: AtomicUsize::new(0),
			endpoints: Mutex::new(Vec::new()),
		});
		(connector, rx)
	}

	/// Makes the next `count` open attempts fail.
	pub fn refuse_next(&self, count: usize) {
		self.refusals.store(count, Ordering::SeqCst);
	}

	/// Number of open attempts so far, refused ones included.
	pub fn open_attempts(&self) -> usize {
		self.opens.load(Ordering::SeqCst)
	}

	/// Endpoints of every open attempt, in order.
	pub fn endpoints(&self) -> Vec<Url> {
		self.endpoints.lock().clone()
	}
}

impl Connector for MemoryConnector {
	fn open<'a>(
		&'a self,
		endpoint: &'a Url,
	) -> Pin<Box<dyn Future<Output = Result<TransportParts>> + Send + 'a>> {
		Box::pin(async move {
			self.opens.fetch_add(1, Ordering::SeqCst);
			self.endpoints.lock().push(endpoint.clone());

			let refused = self
				.refusals
				.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
				.is_ok();
			if refused {
				return Err(Error::ConnectionFailed(format!("{endpoint}: refused")));
			}

			let (parts, server) = link();
			self.accepted
				.send(server)
				.map_err(|_| Error::ConnectionFailed(format!("{endpoint}: no listener")))?;
			Ok(parts)
		})
	}
}
