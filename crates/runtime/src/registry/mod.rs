//! Correlation registry for in-flight requests.
//!
//! Turns the fire-and-forget duplex channel into a request/response facility:
//!
//! 1. [`CorrelationRegistry::register`] stores a pending entry keyed by the
//!    command's [`CorrelationId`] and arms a timer
//! 2. The caller awaits the returned [`PendingReply`]
//! 3. The entry leaves the registry exactly once: a matching reply
//!    ([`resolve`](CorrelationRegistry::resolve)), a timer expiry
//!    ([`expire_next`](CorrelationRegistry::expire_next)), or a sweep
//!    ([`cancel_all`](CorrelationRegistry::cancel_all))
//!
//! The registry is owned by the session driver and mutated only from its
//! event loop, so it carries no locks.

use std::collections::HashMap;
use std::future::{Future, poll_fn};
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use cinder_protocol::{Command, CorrelationId, Reply};
use tokio::sync::oneshot;
use tokio_util::time::{DelayQueue, delay_queue};

use crate::error::{Error, Result};

/// Reply window used when a send does not override it.
pub const DEFAULT_REPLY_TIMEOUT: Duration = Duration::from_millis(5000);

struct PendingRequest {
	command: Command,
	timeout: Duration,
	responder: oneshot::Sender<Result<Reply>>,
	timer: delay_queue::Key,
}

impl PendingRequest {
	fn settle(self, result: Result<Reply>) {
		// The caller may have stopped waiting; nothing to do then.
		let _ = self.responder.send(result);
	}
}

/// Deferred result of a registered command.
#[must_use = "a pending reply does nothing unless awaited"]
pub struct PendingReply {
	state: PendingState,
}

enum PendingState {
	Ready(Option<Reply>),
	Waiting(oneshot::Receiver<Result<Reply>>),
}

impl PendingReply {
	fn ready(reply: Reply) -> Self {
		Self {
			state: PendingState::Ready(Some(reply)),
		}
	}

	fn waiting(rx: oneshot::Receiver<Result<Reply>>) -> Self {
		Self {
			state: PendingState::Waiting(rx),
		}
	}

	/// True when the reply was settled at registration time.
	pub fn is_immediate(&self) -> bool {
		matches!(self.state, PendingState::Ready(_))
	}
}

impl Future for PendingReply {
	type Output = Result<Reply>;

	fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
		match &mut self.get_mut().state {
			PendingState::Ready(reply) => Poll::Ready(reply.take().ok_or(Error::SessionClosed)),
			PendingState::Waiting(rx) => match Pin::new(rx).poll(cx) {
				Poll::Ready(result) => Poll::Ready(result.map_err(|_| Error::SessionClosed).and_then(|r| r)),
				Poll::Pending => Poll::Pending,
			},
		}
	}
}

/// Pending requests keyed by correlation id, each with a deadline.
pub struct CorrelationRegistry {
	pending: HashMap<CorrelationId, PendingRequest>,
	timers: DelayQueue<CorrelationId>,
	default_timeout: Duration,
}

impl Default for CorrelationRegistry {
	fn default() -> Self {
		Self::new(DEFAULT_REPLY_TIMEOUT)
	}
}

impl CorrelationRegistry {
	pub fn new(default_timeout: Duration) -> Self {
		Self {
			pending: HashMap::new(),
			timers: DelayQueue::new(),
			default_timeout,
		}
	}

	/// Registers `command` and returns its deferred reply.
	///
	/// Commands that expect no reply resolve at once with a synthetic
	/// `ok = true` reply and never reach the timer set.
	pub fn register(&mut self, command: &Command, timeout: Option<Duration>) -> Result<PendingReply> {
		if !command.expects_reply() {
			return Ok(PendingReply::ready(Reply::synthetic(command)));
		}

		let id = command.id().clone();
		if self.pending.contains_key(&id) {
			return Err(Error::DuplicateId(id));
		}

		let timeout = timeout.unwrap_or(self.default_timeout);
		let (tx, rx) = oneshot::channel();
		let timer = self.timers.insert(id.clone(), timeout);

		tracing::debug!(id = %id, command = command.name(), timeout_ms = timeout.as_millis() as u64, "Registered pending request");

		self.pending.insert(
			id,
			PendingRequest {
				command: command.clone(),
				timeout,
				responder: tx,
				timer,
			},
		);

		Ok(PendingReply::waiting(rx))
	}

	/// Settles the pending request matching `reply.in_reply_to`.
	///
	/// Returns false for stale or duplicate replies, which are otherwise ignored.
	pub fn resolve(&mut self, reply: Reply) -> bool {
		let Some(request) = self.pending.remove(&reply.in_reply_to) else {
			tracing::debug!(id = %reply.in_reply_to, "Reply for unknown request (ignored)");
			return false;
		};

		self.timers.remove(&request.timer);

		let result = if reply.ok {
			Ok(reply)
		} else {
			Err(Error::Rejected {
				command: request.command.name().to_string(),
				payload: reply.payload,
			})
		};

		request.settle(result);
		true
	}

	/// Rejects every pending request with `reason` and empties the registry.
	pub fn cancel_all(&mut self, reason: &str) -> usize {
		if self.pending.is_empty() {
			return 0;
		}

		self.timers.clear();
		let swept = self.pending.len();
		for (_, request) in self.pending.drain() {
			request.settle(Err(Error::Cancelled(reason.to_string())));
		}

		tracing::debug!(swept, reason, "Cancelled pending requests");
		swept
	}

	/// Like [`cancel_all`](Self::cancel_all), but leaves `keep` pending with its timer armed.
	pub fn cancel_all_except(&mut self, keep: &CorrelationId, reason: &str) -> usize {
		let doomed: Vec<CorrelationId> = self.pending.keys().filter(|id| *id != keep).cloned().collect();
		for id in &doomed {
			if let Some(request) = self.pending.remove(id) {
				self.timers.remove(&request.timer);
				request.settle(Err(Error::Cancelled(reason.to_string())));
			}
		}

		if !doomed.is_empty() {
			tracing::debug!(swept = doomed.len(), kept = %keep, reason, "Cancelled pending requests");
		}
		doomed.len()
	}

	/// Polls for the next expired deadline, rejecting its caller.
	pub fn poll_expired(&mut self, cx: &mut Context<'_>) -> Poll<Option<CorrelationId>> {
		match self.timers.poll_expired(cx) {
			Poll::Ready(Some(expired)) => {
				let id = expired.into_inner();
				if let Some(request) = self.pending.remove(&id) {
					let timeout_ms = request.timeout.as_millis() as u64;
					tracing::debug!(id = %id, command = request.command.name(), timeout_ms, "Reply timeout");
					let error = Error::ReplyTimeout {
						command: request.command.name().to_string(),
						id: id.clone(),
						timeout_ms,
					};
					request.settle(Err(error));
				}
				Poll::Ready(Some(id))
			}
			Poll::Ready(None) => Poll::Ready(None),
			Poll::Pending => Poll::Pending,
		}
	}

	/// Waits for the next deadline to fire and rejects its caller.
	///
	/// Resolves to `None` at once when no timer is armed.
	pub async fn expire_next(&mut self) -> Option<CorrelationId> {
		poll_fn(|cx| self.poll_expired(cx)).await
	}

	pub fn len(&self) -> usize {
		self.pending.len()
	}

	pub fn is_empty(&self) -> bool {
		self.pending.is_empty()
	}

	pub fn contains(&self, id: &CorrelationId) -> bool {
		self.pending.contains_key(id)
	}

	/// Number of deadlines currently armed.
	pub fn armed_timers(&self) -> usize {
		self.timers.len()
	}
}
