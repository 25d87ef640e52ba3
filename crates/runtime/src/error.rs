//! Error types for the Cinder runtime.

use cinder_protocol::{CorrelationId, Payload};
use thiserror::Error;

/// Result type alias for runtime operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the Cinder runtime.
#[derive(Debug, Error)]
pub enum Error {
	/// Channel-level failure reported by the transport.
	#[error("Transport error: {0}")]
	Transport(String),

	/// The channel could not be opened, or closed before the handshake finished.
	#[error("Failed to connect: {0}")]
	ConnectionFailed(String),

	/// The `connect` command was rejected or timed out.
	#[error("Handshake failed: {0}")]
	Handshake(#[source] Box<Error>),

	/// No reply arrived within the configured window.
	#[error("Reply timeout after {timeout_ms}ms for '{command}' (id {id})")]
	ReplyTimeout {
		command: String,
		id: CorrelationId,
		timeout_ms: u64,
	},

	/// The server answered with `ok = false`.
	#[error("Server rejected '{command}'")]
	Rejected {
		command: String,
		/// Reply payload, kept as context for the caller
		payload: Payload,
	},

	/// The request was swept by a registry-wide cancellation.
	#[error("Request cancelled: {0}")]
	Cancelled(String),

	/// A command was sent while no channel was open.
	#[error("Not connected")]
	NotConnected,

	/// The session driver is no longer running.
	#[error("Session closed")]
	SessionClosed,

	/// A command with this id is already awaiting a reply.
	#[error("Duplicate correlation id: {0}")]
	DuplicateId(CorrelationId),

	/// The hosting page URL cannot be turned into a socket endpoint.
	#[error("Invalid endpoint: {0}")]
	InvalidEndpoint(String),

	/// A component-tagged node has no identity attribute.
	#[error("Component '{kind}' is missing its data-cinder-id attribute")]
	MissingComponentId { kind: String },

	#[error("URL error: {0}")]
	Url(#[from] url::ParseError),

	#[error("JSON error: {0}")]
	Json(#[from] serde_json::Error),
}

impl Error {
	/// Returns true if this is a reply timeout, directly or behind a handshake failure.
	pub fn is_timeout(&self) -> bool {
		match self {
			Error::ReplyTimeout { .. } => true,
			Error::Handshake(inner) => inner.is_timeout(),
			_ => false,
		}
	}

	/// Returns true if the request was cancelled by the registry.
	pub fn is_cancelled(&self) -> bool {
		match self {
			Error::Cancelled(_) => true,
			Error::Handshake(inner) => inner.is_cancelled(),
			_ => false,
		}
	}

	/// Returns the reply payload if the server rejected the command.
	pub fn rejection_payload(&self) -> Option<&Payload> {
		match self {
			Error::Rejected { payload, .. } => Some(payload),
			Error::Handshake(inner) => inner.rejection_payload(),
			_ => None,
		}
	}
}
