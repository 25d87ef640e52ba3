//! Session transport: connection lifecycle, handshake, and frame routing.
//!
//! A [`Session`] is a cheap handle; the work happens in a [`SessionDriver`]
//! that the caller spawns. The driver is a single event loop, so every
//! mutation of the registry and of the connection phase happens in one task.
//!
//! # State machine
//!
//! ```text
//!  Idle ──connect()──► Connecting ──handshake ok──► Open
//!                         ▲   │                       │
//!                         │   └─ failure before the   │ close (after the first
//!                         │      first handshake ──►  │ successful handshake)
//!                         │      Closed (no retry)    ▼
//!                    Reconnecting ◄──────────────── Closed
//! ```
//!
//! The reconnect loop is unconditional: no backoff, no attempt cap. Every
//! attempt resends `connect` with the last request id the server issued.
//!
//! # Suspension points
//!
//! The driver waits on exactly these inputs:
//!
//! 1. a handle input (`connect`, `send`, `post`, `shutdown`)
//! 2. the connector's open future, while opening
//! 3. the next transport event, while a channel exists
//! 4. the handshake reply, while handshaking
//! 5. the registry's next reply deadline

mod state;

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use cinder_protocol::{Command, CorrelationId, Message, Reply};
use parking_lot::RwLock;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;

pub use self::state::TransportState;
use crate::config::SessionConfig;
use crate::error::{Error, Result};
use crate::registry::{CorrelationRegistry, PendingReply};
use crate::transport::{Connector, TransportEvent, TransportParts};

/// Receives commands pushed by the server while the session is open.
pub trait CommandHandler: Send + Sync {
	fn handle_command(&self, command: Command);
}

enum Input {
	Connect {
		request_id: String,
		done: oneshot::Sender<Result<()>>,
	},
	Send {
		command: Command,
		timeout: Option<Duration>,
		respond: oneshot::Sender<Result<PendingReply>>,
	},
	Post {
		command: Command,
	},
	Shutdown,
}

struct Shared {
	state: watch::Sender<TransportState>,
	request_id: RwLock<String>,
}

/// Handle to a running session.
#[derive(Clone)]
pub struct Session {
	inputs: mpsc::UnboundedSender<Input>,
	shared: Arc<Shared>,
}

impl Session {
	/// Creates a session handle and the driver that must be run for it to work.
	pub fn new(
		config: SessionConfig,
		connector: Arc<dyn Connector>,
		handler: Arc<dyn CommandHandler>,
	) -> (Session, SessionDriver) {
		let (inputs_tx, inputs_rx) = mpsc::unbounded_channel();
		let (state_tx, _) = watch::channel(TransportState::Idle);
		let shared = Arc::new(Shared {
			state: state_tx,
			request_id: RwLock::new(String::new()),
		});

		let registry = CorrelationRegistry::new(config.reply_timeout);
		let driver = SessionDriver {
			config,
			connector,
			handler,
			inputs: inputs_rx,
			shared: Arc::clone(&shared),
			registry,
			phase: Phase::Idle,
			reconnect_enabled: false,
			connect_waiter: None,
		};

		(
			Session {
				inputs: inputs_tx,
				shared,
			},
			driver,
		)
	}

	/// Creates a session and spawns its driver on the current runtime.
	pub fn spawn(
		config: SessionConfig,
		connector: Arc<dyn Connector>,
		handler: Arc<dyn CommandHandler>,
	) -> (Session, JoinHandle<()>) {
		let (session, driver) = Self::new(config, connector, handler);
		(session, tokio::spawn(driver.run()))
	}

	/// Opens the channel and performs the `connect` handshake.
	///
	/// Resolves once the server accepts the handshake. Failures before the
	/// first successful handshake are returned here and not retried.
	pub async fn connect(&self, request_id: impl Into<String>) -> Result<()> {
		let (done, rx) = oneshot::channel();
		self.inputs
			.send(Input::Connect {
				request_id: request_id.into(),
				done,
			})
			.map_err(|_| Error::SessionClosed)?;
		rx.await.map_err(|_| Error::SessionClosed)?
	}

	/// Sends a command and waits for its reply using the default reply window.
	pub async fn send(&self, command: Command) -> Result<Reply> {
		self.send_inner(command, None).await
	}

	/// Sends a command and waits for its reply within `timeout`.
	pub async fn send_with_timeout(&self, command: Command, timeout: Duration) -> Result<Reply> {
		self.send_inner(command, Some(timeout)).await
	}

	async fn send_inner(&self, command: Command, timeout: Option<Duration>) -> Result<Reply> {
		let (respond, rx) = oneshot::channel();
		self.inputs
			.send(Input::Send {
				command,
				timeout,
				respond,
			})
			.map_err(|_| Error::SessionClosed)?;
		let pending = rx.await.map_err(|_| Error::SessionClosed)??;
		pending.await
	}

	/// Writes a command without waiting for anything.
	///
	/// Dropped with a warning when no channel is open; nothing is queued.
	pub fn post(&self, command: Command) {
		if self.inputs.send(Input::Post { command }).is_err() {
			tracing::warn!("Session driver gone, dropping posted command");
		}
	}

	/// Returns a handle that does not keep the driver running.
	pub fn downgrade(&self) -> WeakSession {
		WeakSession {
			inputs: self.inputs.downgrade(),
			shared: Arc::clone(&self.shared),
		}
	}

	/// Stops the driver, cancelling everything in flight.
	pub fn shutdown(&self) {
		let _ = self.inputs.send(Input::Shutdown);
	}

	pub fn state(&self) -> TransportState {
		*self.shared.state.borrow()
	}

	pub fn watch_state(&self) -> watch::Receiver<TransportState> {
		self.shared.state.subscribe()
	}

	/// Current session resumption token.
	pub fn request_id(&self) -> String {
		self.shared.request_id.read().clone()
	}
}

/// Non-owning handle to a session.
///
/// Holding one does not keep the driver alive: once every [`Session`] is
/// dropped the driver stops and [`WeakSession::upgrade`] returns `None`.
#[derive(Clone)]
pub struct WeakSession {
	inputs: mpsc::WeakUnboundedSender<Input>,
	shared: Arc<Shared>,
}

impl WeakSession {
	pub fn upgrade(&self) -> Option<Session> {
		let inputs = self.inputs.upgrade()?;
		Some(Session {
			inputs,
			shared: Arc::clone(&self.shared),
		})
	}
}

type OpenFuture = Pin<Box<dyn Future<Output = Result<TransportParts>> + Send>>;

enum Phase {
	Idle,
	Opening(OpenFuture),
	Handshaking {
		link: TransportParts,
		reply: PendingReply,
		connect_id: CorrelationId,
	},
	Open { link: TransportParts },
	Closed,
}

enum DriverEvent {
	Input(Option<Input>),
	Opened(Result<TransportParts>),
	Transport(Option<TransportEvent>),
	Handshake(Result<Reply>),
	Expired,
}

/// Event loop owning the transport and the correlation registry.
pub struct SessionDriver {
	config: SessionConfig,
	connector: Arc<dyn Connector>,
	handler: Arc<dyn CommandHandler>,
	inputs: mpsc::UnboundedReceiver<Input>,
	shared: Arc<Shared>,
	registry: CorrelationRegistry,
	phase: Phase,
	/// Steady-state close handler, installed by the first successful handshake.
	reconnect_enabled: bool,
	connect_waiter: Option<oneshot::Sender<Result<()>>>,
}

impl SessionDriver {
	/// Runs until [`Session::shutdown`] or until every [`Session`] handle is dropped.
	///
	/// [`WeakSession`] handles, such as the one inside [`crate::Cinder`], do
	/// not count, so a handler that reaches back into the session cannot keep
	/// the driver alive.
	pub async fn run(mut self) {
		loop {
			match self.next_event().await {
				DriverEvent::Input(Some(Input::Shutdown)) | DriverEvent::Input(None) => break,
				DriverEvent::Input(Some(input)) => self.on_input(input),
				DriverEvent::Opened(result) => self.on_opened(result),
				DriverEvent::Transport(event) => self.on_transport_event(event),
				DriverEvent::Handshake(result) => self.on_handshake(result),
				DriverEvent::Expired => {}
			}
		}

		self.registry.cancel_all("session shut down");
		self.phase = Phase::Closed;
		if let Some(waiter) = self.connect_waiter.take() {
			let _ = waiter.send(Err(Error::SessionClosed));
		}
		self.transition(TransportState::Closed);
		tracing::debug!("Session driver stopped");
	}

	async fn next_event(&mut self) -> DriverEvent {
		let Self {
			inputs,
			registry,
			phase,
			..
		} = self;

		tokio::select! {
			input = inputs.recv() => DriverEvent::Input(input),
			event = phase_event(phase) => event,
			Some(_) = registry.expire_next(), if registry.armed_timers() > 0 => DriverEvent::Expired,
		}
	}

	fn transition(&self, to: TransportState) {
		let from = *self.shared.state.borrow();
		if from != to {
			tracing::debug!("Transport state: {} -> {}", from, to);
		}
		self.shared.state.send_replace(to);
	}

	fn on_input(&mut self, input: Input) {
		match input {
			Input::Connect { request_id, done } => self.on_connect(request_id, done),
			Input::Send {
				command,
				timeout,
				respond,
			} => {
				let _ = respond.send(self.write_request(&command, timeout));
			}
			Input::Post { command } => {
				if let Err(e) = self.write(&command) {
					tracing::warn!("Dropping '{}' ({}): {}", command.name(), command.id(), e);
				}
			}
			Input::Shutdown => {}
		}
	}

	fn on_connect(&mut self, request_id: String, done: oneshot::Sender<Result<()>>) {
		match self.phase {
			Phase::Idle | Phase::Closed => {
				*self.shared.request_id.write() = request_id;
				self.connect_waiter = Some(done);
				self.begin_connecting();
			}
			Phase::Open { .. } => {
				let _ = done.send(Ok(()));
			}
			Phase::Opening(_) | Phase::Handshaking { .. } => {
				let _ = done.send(Err(Error::ConnectionFailed(
					"connection attempt already in progress".to_string(),
				)));
			}
		}
	}

	fn begin_connecting(&mut self) {
		tracing::info!(endpoint = %self.config.endpoint, "Connecting");
		self.transition(TransportState::Connecting);

		let connector = Arc::clone(&self.connector);
		let endpoint = self.config.endpoint.clone();
		self.phase = Phase::Opening(Box::pin(async move { connector.open(&endpoint).await }));
	}

	/// Channel opened: supersede the old connection's requests and handshake.
	fn on_opened(&mut self, result: Result<TransportParts>) {
		let link = match result {
			Ok(link) => link,
			Err(e) => {
				self.on_channel_lost(e);
				return;
			}
		};

		self.registry.cancel_all("superseded by new connection");

		let request_id = self.shared.request_id.read().clone();
		let command = Command::connect_from(&request_id, self.config.path.as_deref());
		tracing::debug!(id = %command.id(), request_id, "Sending connect");

		let reply = command
			.to_frame()
			.map_err(Error::from)
			.and_then(|frame| {
				let reply = self
					.registry
					.register(&command, Some(self.config.handshake_timeout))?;
				// A dead writer shows up as a close event on the same link.
				let _ = link.outbound.send(frame);
				Ok(reply)
			});

		match reply {
			Ok(reply) => {
				self.phase = Phase::Handshaking {
					link,
					reply,
					connect_id: command.id().clone(),
				}
			}
			Err(e) => self.on_handshake_failed(e),
		}
	}

	fn on_handshake(&mut self, result: Result<Reply>) {
		let reply = match result {
			Ok(reply) => reply,
			Err(e) => {
				self.on_handshake_failed(e);
				return;
			}
		};

		let Phase::Handshaking { link, .. } = std::mem::replace(&mut self.phase, Phase::Closed) else {
			return;
		};

		if let Some(renewed) = reply.get_str("requestId") {
			tracing::debug!(request_id = renewed, "Server renewed request id");
			*self.shared.request_id.write() = renewed.to_string();
		}

		self.phase = Phase::Open { link };
		self.reconnect_enabled = true;
		self.transition(TransportState::Open);
		tracing::info!(endpoint = %self.config.endpoint, "Session open");

		if let Some(waiter) = self.connect_waiter.take() {
			let _ = waiter.send(Ok(()));
		}
	}

	fn on_handshake_failed(&mut self, error: Error) {
		tracing::error!(endpoint = %self.config.endpoint, "Handshake failed: {}", error);

		// Dropping the link closes the channel.
		self.phase = Phase::Closed;
		self.transition(TransportState::Closed);

		if self.reconnect_enabled {
			self.reconnect();
		} else if let Some(waiter) = self.connect_waiter.take() {
			let _ = waiter.send(Err(Error::Handshake(Box::new(error))));
		}
	}

	fn on_transport_event(&mut self, event: Option<TransportEvent>) {
		match event {
			Some(TransportEvent::Frame(frame)) => self.route(&frame),
			Some(TransportEvent::Error(message)) => {
				let error = Error::Transport(message);
				tracing::warn!(endpoint = %self.config.endpoint, "{}", error);
				// The channel stays up, so an in-progress handshake keeps waiting.
				match &self.phase {
					Phase::Handshaking { connect_id, .. } => {
						self.registry.cancel_all_except(connect_id, &error.to_string());
					}
					_ => {
						self.registry.cancel_all(&error.to_string());
					}
				}
			}
			Some(TransportEvent::Closed(reason)) => {
				let reason = reason.unwrap_or_else(|| "closed".to_string());
				self.on_channel_lost(Error::ConnectionFailed(format!("channel closed: {reason}")));
			}
			None => self.on_channel_lost(Error::ConnectionFailed("channel closed".to_string())),
		}
	}

	fn on_channel_lost(&mut self, error: Error) {
		tracing::info!(endpoint = %self.config.endpoint, "Disconnected: {}", error);

		self.phase = Phase::Closed;
		self.registry.cancel_all("disconnected");
		self.transition(TransportState::Closed);

		if self.reconnect_enabled {
			self.reconnect();
		} else if let Some(waiter) = self.connect_waiter.take() {
			let _ = waiter.send(Err(error));
		}
	}

	fn reconnect(&mut self) {
		self.transition(TransportState::Reconnecting);
		self.begin_connecting();
	}

	fn route(&mut self, frame: &str) {
		match Message::parse(frame) {
			Ok(Message::Reply(reply)) => {
				tracing::debug!(id = %reply.in_reply_to, ok = reply.ok, "Received reply");
				self.registry.resolve(reply);
			}
			Ok(Message::Command(command)) => {
				if matches!(self.phase, Phase::Open { .. }) {
					tracing::debug!(id = %command.id(), command = command.name(), "Received pushed command");
					self.handler.handle_command(command);
				} else {
					tracing::debug!(command = command.name(), "Pushed command before handshake (ignored)");
				}
			}
			Ok(Message::Unknown(_)) => {
				tracing::debug!("Unroutable frame (forward-compatible, ignored): {}", frame);
			}
			Err(e) => {
				tracing::debug!("Unparseable frame (ignored): {}", e);
			}
		}
	}

	fn open_link(&self) -> Result<&TransportParts> {
		match &self.phase {
			Phase::Open { link } => Ok(link),
			_ => Err(Error::NotConnected),
		}
	}

	fn write(&self, command: &Command) -> Result<()> {
		let link = self.open_link()?;
		let frame = command.to_frame()?;
		link.outbound.send(frame).map_err(|_| Error::NotConnected)
	}

	fn write_request(&mut self, command: &Command, timeout: Option<Duration>) -> Result<PendingReply> {
		let frame = command.to_frame()?;
		self.open_link()?;
		let pending = self.registry.register(command, timeout)?;
		if let Phase::Open { link } = &self.phase {
			// A dead writer shows up as a close event, which cancels the request.
			let _ = link.outbound.send(frame);
		}
		Ok(pending)
	}
}

async fn phase_event(phase: &mut Phase) -> DriverEvent {
	match phase {
		Phase::Opening(open) => DriverEvent::Opened(open.await),
		Phase::Handshaking { link, reply, .. } => tokio::select! {
			event = link.events.recv() => DriverEvent::Transport(event),
			result = reply => DriverEvent::Handshake(result),
		},
		Phase::Open { link } => DriverEvent::Transport(link.events.recv().await),
		Phase::Idle | Phase::Closed => std::future::pending().await,
	}
}

#[cfg(test)]
mod tests;
