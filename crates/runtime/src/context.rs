//! Application context handed to component factories.

use std::sync::Arc;

use cinder_protocol::Command;
use parking_lot::Mutex;

use crate::session::{Session, WeakSession};

/// Navigation history of the hosting view.
pub trait History: Send + Sync {
	/// Records `path` as the current location.
	fn push(&self, path: &str);

	fn current(&self) -> Option<String>;
}

/// History that only remembers the visited paths.
#[derive(Debug, Default)]
pub struct MemoryHistory {
	entries: Mutex<Vec<String>>,
}

impl MemoryHistory {
	pub fn new() -> Self {
		Self::default()
	}

	/// Starts with `path` as the current location.
	pub fn starting_at(path: impl Into<String>) -> Self {
		Self {
			entries: Mutex::new(vec![path.into()]),
		}
	}

	pub fn entries(&self) -> Vec<String> {
		self.entries.lock().clone()
	}
}

impl History for MemoryHistory {
	fn push(&self, path: &str) {
		self.entries.lock().push(path.to_string());
	}

	fn current(&self) -> Option<String> {
		self.entries.lock().last().cloned()
	}
}

/// Session and history, passed explicitly to everything that needs them.
///
/// Holds the session weakly: the context lives inside components, which live
/// inside the session's own command handler.
#[derive(Clone)]
pub struct Cinder {
	session: WeakSession,
	history: Arc<dyn History>,
}

impl Cinder {
	pub fn new(session: &Session, history: Arc<dyn History>) -> Self {
		Self {
			session: session.downgrade(),
			history,
		}
	}

	/// The session, unless every owning handle is gone.
	pub fn session(&self) -> Option<Session> {
		self.session.upgrade()
	}

	pub fn history(&self) -> &Arc<dyn History> {
		&self.history
	}

	/// Asks the server to navigate to `target` and records it in the history.
	///
	/// The history is updated whether or not the command reaches the server.
	pub fn transition_to(&self, target: &str) {
		tracing::debug!(path = target, "Transition");
		match self.session.upgrade() {
			Some(session) => session.post(Command::transition_to(target)),
			None => tracing::warn!(path = target, "Session gone, dropping transitionTo"),
		}
		self.history.push(target);
	}
}
