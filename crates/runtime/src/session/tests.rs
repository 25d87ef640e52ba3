use std::sync::Arc;
use std::time::Duration;

use cinder_protocol::{Command, Payload, Reply};
use serde_json::json;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use url::Url;

use super::*;
use crate::transport::{MemoryConnector, ServerEnd};

struct Forwarder(mpsc::UnboundedSender<Command>);

impl CommandHandler for Forwarder {
	fn handle_command(&self, command: Command) {
		let _ = self.0.send(command);
	}
}

struct Harness {
	session: Session,
	driver: JoinHandle<()>,
	connector: Arc<MemoryConnector>,
	accepted: mpsc::UnboundedReceiver<ServerEnd>,
	pushed: mpsc::UnboundedReceiver<Command>,
}

fn endpoint() -> Url {
	Url::parse("ws://localhost:4000/ws").unwrap()
}

fn data(key: &str, value: &str) -> Payload {
	Payload::from([(key.to_string(), json!(value))])
}

fn harness_with(config: SessionConfig) -> Harness {
	let (connector, accepted) = MemoryConnector::new();
	let (pushed_tx, pushed) = mpsc::unbounded_channel();
	let (session, driver) = Session::spawn(
		config,
		connector.clone(),
		Arc::new(Forwarder(pushed_tx)),
	);
	Harness {
		session,
		driver,
		connector,
		accepted,
		pushed,
	}
}

fn harness() -> Harness {
	harness_with(SessionConfig::new(endpoint()))
}

impl Harness {
	async fn accept(&mut self) -> ServerEnd {
		self.accepted.recv().await.expect("connector opened a channel")
	}

	/// Accepts the next channel and answers its `connect` frame.
	async fn handshake(&mut self, ok: bool, data: Payload) -> (ServerEnd, Command) {
		let mut server = self.accept().await;
		let connect = server.next_command().await.expect("connect frame");
		assert_eq!(connect.name(), "connect");
		server.reply(&Reply::new(connect.id().clone(), ok, data));
		(server, connect)
	}

	fn connect_in_background(&self, request_id: &str) -> JoinHandle<Result<()>> {
		let session = self.session.clone();
		let request_id = request_id.to_string();
		tokio::spawn(async move { session.connect(request_id).await })
	}

	async fn open(&mut self, request_id: &str) -> ServerEnd {
		let connecting = self.connect_in_background(request_id);
		let (server, _) = self.handshake(true, Payload::new()).await;
		connecting.await.unwrap().unwrap();
		server
	}

	fn send_in_background(&self, command: Command) -> JoinHandle<Result<Reply>> {
		let session = self.session.clone();
		tokio::spawn(async move { session.send(command).await })
	}
}

#[tokio::test]
async fn test_initial_state_is_idle() {
	let h = harness();
	assert_eq!(h.session.state(), TransportState::Idle);
	assert_eq!(h.session.request_id(), "");
}

#[tokio::test]
async fn test_handshake_renews_request_id() {
	let mut h = harness();
	let connecting = h.connect_in_background("r1");

	let (_server, connect) = h.handshake(true, data("requestId", "r2")).await;
	assert_eq!(connect.get_str("requestId"), Some("r1"));
	assert!(connect.payload().get("path").is_none());

	connecting.await.unwrap().unwrap();
	assert_eq!(h.session.state(), TransportState::Open);
	assert_eq!(h.session.request_id(), "r2");
	assert_eq!(h.connector.endpoints(), vec![endpoint()]);
}

#[tokio::test]
async fn test_handshake_without_new_id_keeps_token() {
	let mut h = harness();
	let _server = h.open("r1").await;
	assert_eq!(h.session.request_id(), "r1");
}

#[tokio::test]
async fn test_handshake_reports_path() {
	let mut h = harness_with(SessionConfig::new(endpoint()).with_path("/about?x=1"));
	let connecting = h.connect_in_background("r1");

	let (_server, connect) = h.handshake(true, Payload::new()).await;
	assert_eq!(connect.get_str("path"), Some("/about?x=1"));
	connecting.await.unwrap().unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_rejected_handshake_is_not_retried() {
	let mut h = harness();
	let connecting = h.connect_in_background("r1");
	let (server, _) = h.handshake(false, data("reason", "expired")).await;

	let err = connecting.await.unwrap().unwrap_err();
	assert!(matches!(err, Error::Handshake(_)), "got {err:?}");
	assert_eq!(err.rejection_payload().unwrap()["reason"], "expired");
	assert_eq!(h.session.state(), TransportState::Closed);

	tokio::time::sleep(Duration::from_secs(30)).await;
	assert_eq!(h.connector.open_attempts(), 1);
	assert!(h.accepted.try_recv().is_err());
	assert!(server.is_abandoned());
}

#[tokio::test(start_paused = true)]
async fn test_handshake_timeout_abandons_attempt() {
	let mut h = harness_with(
		SessionConfig::new(endpoint()).with_handshake_timeout(Duration::from_millis(200)),
	);
	let connecting = h.connect_in_background("r1");
	let mut server = h.accept().await;
	let _connect = server.next_command().await.unwrap();

	let err = connecting.await.unwrap().unwrap_err();
	assert!(err.is_timeout(), "got {err:?}");
	assert_eq!(h.session.state(), TransportState::Closed);
	assert!(server.is_abandoned());

	tokio::time::sleep(Duration::from_secs(30)).await;
	assert_eq!(h.connector.open_attempts(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_refused_open_before_handshake_is_not_retried() {
	let mut h = harness();
	h.connector.refuse_next(1);

	let err = h.session.connect("r1").await.unwrap_err();
	assert!(matches!(err, Error::ConnectionFailed(_)), "got {err:?}");
	assert_eq!(h.session.state(), TransportState::Closed);

	tokio::time::sleep(Duration::from_secs(30)).await;
	assert_eq!(h.connector.open_attempts(), 1);
	assert!(h.accepted.try_recv().is_err());
}

#[tokio::test(start_paused = true)]
async fn test_close_before_handshake_is_terminal() {
	let mut h = harness();
	let connecting = h.connect_in_background("r1");
	let mut server = h.accept().await;
	let _connect = server.next_command().await.unwrap();
	server.close(Some("going away"));

	let err = connecting.await.unwrap().unwrap_err();
	assert!(matches!(err, Error::ConnectionFailed(_)), "got {err:?}");

	tokio::time::sleep(Duration::from_secs(30)).await;
	assert_eq!(h.connector.open_attempts(), 1);
}

#[tokio::test]
async fn test_connect_after_failure_starts_fresh_attempt() {
	let mut h = harness();
	h.connector.refuse_next(1);
	assert!(h.session.connect("r1").await.is_err());

	let _server = h.open("r1").await;
	assert_eq!(h.session.state(), TransportState::Open);
	assert_eq!(h.connector.open_attempts(), 2);
}

#[tokio::test]
async fn test_connect_while_open_is_noop() {
	let mut h = harness();
	let _server = h.open("r1").await;

	h.session.connect("ignored").await.unwrap();
	assert_eq!(h.session.request_id(), "r1");
	assert_eq!(h.connector.open_attempts(), 1);
}

#[tokio::test]
async fn test_send_resolves_with_matching_reply() {
	let mut h = harness();
	let mut server = h.open("r1").await;

	let sending = h.send_in_background(Command::new("ping", Payload::new(), true, None));
	let ping = server.next_command().await.unwrap();
	assert_eq!(ping.name(), "ping");
	server.reply(&Reply::new(ping.id().clone(), true, data("echo", "pong")));

	let reply = sending.await.unwrap().unwrap();
	assert_eq!(&reply.in_reply_to, ping.id());
	assert_eq!(reply.get_str("echo"), Some("pong"));
}

#[tokio::test]
async fn test_send_rejected_by_server() {
	let mut h = harness();
	let mut server = h.open("r1").await;

	let sending = h.send_in_background(Command::new("save", Payload::new(), true, None));
	let save = server.next_command().await.unwrap();
	server.reply(&Reply::new(save.id().clone(), false, data("error", "invalid")));

	let err = sending.await.unwrap().unwrap_err();
	assert_eq!(err.rejection_payload().unwrap()["error"], "invalid");
}

#[tokio::test]
async fn test_rejection_with_null_data_fails_fast() {
	let mut h = harness();
	let mut server = h.open("r1").await;

	let sending = h.send_in_background(Command::new("save", Payload::new(), true, None));
	let save = server.next_command().await.unwrap();
	server.push(format!(r#"{{"replyTo": "{}", "ok": false, "data": null}}"#, save.id()));

	match sending.await.unwrap().unwrap_err() {
		Error::Rejected { command, payload } => {
			assert_eq!(command, "save");
			assert!(payload.is_empty());
		}
		other => panic!("Expected Rejected, got {other:?}"),
	}
}

#[tokio::test]
async fn test_out_of_order_replies() {
	let mut h = harness();
	let mut server = h.open("r1").await;

	let first = h.send_in_background(Command::new("first", Payload::new(), true, None));
	let first_cmd = server.next_command().await.unwrap();
	let second = h.send_in_background(Command::new("second", Payload::new(), true, None));
	let second_cmd = server.next_command().await.unwrap();

	server.reply(&Reply::new(second_cmd.id().clone(), true, data("n", "2")));
	server.reply(&Reply::new(first_cmd.id().clone(), true, data("n", "1")));

	assert_eq!(first.await.unwrap().unwrap().get_str("n"), Some("1"));
	assert_eq!(second.await.unwrap().unwrap().get_str("n"), Some("2"));
}

#[tokio::test]
async fn test_send_without_reply_resolves_immediately() {
	let mut h = harness();
	let mut server = h.open("r1").await;

	let command = Command::transition_to("/about");
	let reply = h.session.send(command.clone()).await.unwrap();
	assert!(reply.ok);
	assert_eq!(&reply.in_reply_to, command.id());

	let written = server.next_command().await.unwrap();
	assert_eq!(written.name(), "transitionTo");
	assert_eq!(written.get_str("target"), Some("/about"));
}

#[tokio::test]
async fn test_send_while_not_connected_fails_fast() {
	let h = harness();
	let err = h
		.session
		.send(Command::new("ping", Payload::new(), true, None))
		.await
		.unwrap_err();
	assert!(matches!(err, Error::NotConnected), "got {err:?}");

	let err = h.session.send(Command::transition_to("/")).await.unwrap_err();
	assert!(matches!(err, Error::NotConnected), "got {err:?}");
}

#[tokio::test(start_paused = true)]
async fn test_send_timeout_and_late_reply() {
	let mut h = harness();
	let mut server = h.open("r1").await;

	let session = h.session.clone();
	let sending = tokio::spawn(async move {
		session
			.send_with_timeout(
				Command::new("slow", Payload::new(), true, None),
				Duration::from_millis(100),
			)
			.await
	});
	let slow = server.next_command().await.unwrap();

	let err = sending.await.unwrap().unwrap_err();
	assert!(err.is_timeout(), "got {err:?}");

	// Late reply is ignored and the session keeps working
	server.reply(&Reply::new(slow.id().clone(), true, Payload::new()));
	let next = h.send_in_background(Command::new("ping", Payload::new(), true, None));
	let ping = server.next_command().await.unwrap();
	server.reply(&Reply::new(ping.id().clone(), true, Payload::new()));
	assert!(next.await.unwrap().is_ok());
	assert_eq!(h.session.state(), TransportState::Open);
}

#[tokio::test]
async fn test_close_after_handshake_reconnects_with_last_request_id() {
	let mut h = harness();
	let connecting = h.connect_in_background("r1");
	let (mut server, _) = h.handshake(true, data("requestId", "r2")).await;
	connecting.await.unwrap().unwrap();

	let pending = h.send_in_background(Command::new("ping", Payload::new(), true, None));
	let _ping = server.next_command().await.unwrap();
	server.close(None);

	match pending.await.unwrap().unwrap_err() {
		Error::Cancelled(reason) => assert_eq!(reason, "disconnected"),
		other => panic!("Expected Cancelled, got {other:?}"),
	}

	let (_server, reconnect) = h.handshake(true, data("requestId", "r3")).await;
	assert_eq!(reconnect.get_str("requestId"), Some("r2"));

	let mut state = h.session.watch_state();
	state.wait_for(|s| *s == TransportState::Open).await.unwrap();
	assert_eq!(h.session.request_id(), "r3");
	assert_eq!(h.connector.open_attempts(), 2);
}

#[tokio::test]
async fn test_reconnect_is_unbounded_and_without_backoff() {
	let mut h = harness();
	let server = h.open("r1").await;

	h.connector.refuse_next(25);
	server.close(None);

	let (_server, reconnect) = h.handshake(true, Payload::new()).await;
	assert_eq!(reconnect.get_str("requestId"), Some("r1"));
	assert_eq!(h.connector.open_attempts(), 1 + 25 + 1);
}

#[tokio::test]
async fn test_every_close_after_handshake_reconnects() {
	let mut h = harness();
	let mut server = h.open("r1").await;

	for _ in 0..5 {
		server.close(None);
		let (next, _) = h.handshake(true, Payload::new()).await;
		server = next;
	}
	assert_eq!(h.connector.open_attempts(), 6);
}

#[tokio::test]
async fn test_rejected_reconnect_handshake_keeps_looping() {
	let mut h = harness();
	let server = h.open("r1").await;
	server.close(None);

	let (_rejected, _) = h.handshake(false, Payload::new()).await;
	let (_accepted, reconnect) = h.handshake(true, Payload::new()).await;
	assert_eq!(reconnect.get_str("requestId"), Some("r1"));

	let mut state = h.session.watch_state();
	state.wait_for(|s| *s == TransportState::Open).await.unwrap();
	assert_eq!(h.connector.open_attempts(), 3);
}

#[tokio::test]
async fn test_transport_error_cancels_in_flight_but_stays_open() {
	let mut h = harness();
	let mut server = h.open("r1").await;

	let pending = h.send_in_background(Command::new("ping", Payload::new(), true, None));
	let _ping = server.next_command().await.unwrap();
	server.fail("boom");

	match pending.await.unwrap().unwrap_err() {
		Error::Cancelled(reason) => assert!(reason.contains("boom"), "reason: {reason}"),
		other => panic!("Expected Cancelled, got {other:?}"),
	}
	assert_eq!(h.session.state(), TransportState::Open);

	let next = h.send_in_background(Command::new("ping", Payload::new(), true, None));
	let ping = server.next_command().await.unwrap();
	server.reply(&Reply::new(ping.id().clone(), true, Payload::new()));
	assert!(next.await.unwrap().is_ok());
	assert_eq!(h.connector.open_attempts(), 1);
}

#[tokio::test]
async fn test_transport_error_during_handshake_keeps_attempt_alive() {
	let mut h = harness();
	let connecting = h.connect_in_background("r1");
	let mut server = h.accept().await;
	let connect = server.next_command().await.unwrap();

	server.fail("blip");
	server.reply(&Reply::new(connect.id().clone(), true, data("requestId", "r2")));

	connecting.await.unwrap().unwrap();
	assert_eq!(h.session.state(), TransportState::Open);
	assert_eq!(h.session.request_id(), "r2");
	assert!(!server.is_abandoned());
	assert_eq!(h.connector.open_attempts(), 1);
}

#[tokio::test]
async fn test_pushed_commands_reach_handler() {
	let mut h = harness();
	let server = h.open("r1").await;

	server.push(r#"{"command": "rerender", "id": "x", "data": {"page": "<div>Hi</div>"}}"#);
	let pushed = h.pushed.recv().await.unwrap();
	assert_eq!(pushed.name(), "rerender");
	assert_eq!(pushed.id().as_str(), "x");
	assert_eq!(pushed.get_str("page"), Some("<div>Hi</div>"));
}

#[tokio::test]
async fn test_unroutable_frames_are_dropped() {
	let mut h = harness();
	let server = h.open("r1").await;

	server.push("not json");
	server.push(r#"{"status": "connected", "request_id": "legacy"}"#);
	server.push(r#"[1, 2, 3]"#);
	server.push(r#"{"replyTo": "unknown", "ok": true, "data": {}}"#);
	server.push(r#"{"command": "rerender", "id": "y", "data": {"page": "ok"}}"#);

	let pushed = h.pushed.recv().await.unwrap();
	assert_eq!(pushed.id().as_str(), "y");
	assert_eq!(h.session.state(), TransportState::Open);
	assert_eq!(h.session.request_id(), "r1");
}

#[tokio::test]
async fn test_pushed_command_before_handshake_is_ignored() {
	let mut h = harness();
	let connecting = h.connect_in_background("r1");
	let mut server = h.accept().await;
	let connect = server.next_command().await.unwrap();

	server.push(r#"{"command": "rerender", "id": "early", "data": {"page": "x"}}"#);
	server.reply(&Reply::new(connect.id().clone(), true, Payload::new()));
	connecting.await.unwrap().unwrap();

	server.push(r#"{"command": "rerender", "id": "late", "data": {"page": "y"}}"#);
	assert_eq!(h.pushed.recv().await.unwrap().id().as_str(), "late");
}

#[tokio::test]
async fn test_post_writes_when_open() {
	let mut h = harness();
	let mut server = h.open("r1").await;

	h.session.post(Command::transition_to("/next"));
	let written = server.next_command().await.unwrap();
	assert_eq!(written.get_str("target"), Some("/next"));
}

#[tokio::test]
async fn test_shutdown_cancels_and_closes() {
	let mut h = harness();
	let mut server = h.open("r1").await;

	let pending = h.send_in_background(Command::new("ping", Payload::new(), true, None));
	let _ping = server.next_command().await.unwrap();
	h.session.shutdown();

	assert!(pending.await.unwrap().unwrap_err().is_cancelled());
	h.driver.await.unwrap();
	assert_eq!(h.session.state(), TransportState::Closed);
	assert!(matches!(
		h.session.connect("r1").await.unwrap_err(),
		Error::SessionClosed
	));
}
