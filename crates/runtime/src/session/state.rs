use std::fmt;

/// Lifecycle state of the session's transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TransportState {
	/// No connection has been requested yet
	#[default]
	Idle,
	/// Opening the channel or waiting for the `connect` reply
	Connecting,
	/// Handshake accepted; pushed commands are dispatched
	Open,
	/// Channel lost after the first handshake; a new attempt follows
	Reconnecting,
	/// No channel, and no attempt in progress
	Closed,
}

impl TransportState {
	pub fn as_str(self) -> &'static str {
		match self {
			TransportState::Idle => "idle",
			TransportState::Connecting => "connecting",
			TransportState::Open => "open",
			TransportState::Reconnecting => "reconnecting",
			TransportState::Closed => "closed",
		}
	}
}

impl fmt::Display for TransportState {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}
