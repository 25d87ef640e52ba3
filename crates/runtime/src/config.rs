//! Session configuration.

use std::time::Duration;

use url::Url;

use crate::registry::DEFAULT_REPLY_TIMEOUT;

/// Fully owned session configuration.
#[derive(Debug, Clone)]
pub struct SessionConfig {
	/// Socket endpoint, usually derived from the hosting page URL.
	pub endpoint: Url,
	/// Navigational location reported in the handshake.
	pub path: Option<String>,
	/// Reply window for sends that do not override it.
	pub reply_timeout: Duration,
	/// Reply window for the `connect` handshake.
	pub handshake_timeout: Duration,
}

impl SessionConfig {
	/// Creates a config with the default reply windows.
	pub fn new(endpoint: Url) -> Self {
		Self {
			endpoint,
			path: None,
			reply_timeout: DEFAULT_REPLY_TIMEOUT,
			handshake_timeout: DEFAULT_REPLY_TIMEOUT,
		}
	}

	pub fn with_path(mut self, path: impl Into<String>) -> Self {
		self.path = Some(path.into());
		self
	}

	pub fn with_reply_timeout(mut self, timeout: Duration) -> Self {
		self.reply_timeout = timeout;
		self
	}

	pub fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
		self.handshake_timeout = timeout;
		self
	}
}
