//! Command envelope and the canonical commands.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::id::CorrelationId;

/// Command payload.
///
/// A sorted map keeps serialization deterministic regardless of insertion
/// order.
pub type Payload = BTreeMap<String, Value>;

/// Reads `data`, treating an explicit `null` as an empty payload.
pub(crate) fn nullable_payload<'de, D>(deserializer: D) -> Result<Payload, D::Error>
where
	D: Deserializer<'de>,
{
	Ok(Option::<Payload>::deserialize(deserializer)?.unwrap_or_default())
}

/// Names of the commands the runtime knows about.
pub mod names {
	/// Client → server session handshake.
	pub const CONNECT: &str = "connect";
	/// Client → server navigation intent.
	pub const TRANSITION_TO: &str = "transitionTo";
	/// Server → client view replacement.
	pub const RERENDER: &str = "rerender";
}

/// Immutable protocol command.
///
/// Serializes to the envelope `{ "command": name, "id": id, "data": payload }`.
/// `expects_reply` is local bookkeeping and never goes on the wire; commands
/// decoded from the server always have it unset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Command {
	#[serde(rename = "command")]
	name: String,
	id: CorrelationId,
	#[serde(rename = "data", default, deserialize_with = "nullable_payload")]
	payload: Payload,
	#[serde(skip)]
	expects_reply: bool,
}

impl Command {
	/// Creates a command, generating a correlation id when none is supplied.
	pub fn new(
		name: impl Into<String>,
		payload: Payload,
		expects_reply: bool,
		id: Option<CorrelationId>,
	) -> Self {
		Self {
			name: name.into(),
			id: id.unwrap_or_else(CorrelationId::generate),
			payload,
			expects_reply,
		}
	}

	/// Session handshake carrying the current resumption token.
	pub fn connect(request_id: &str) -> Self {
		Self::connect_from(request_id, None)
	}

	/// Session handshake that also reports the client's navigational location.
	pub fn connect_from(request_id: &str, path: Option<&str>) -> Self {
		let mut payload = Payload::new();
		payload.insert("requestId".into(), Value::from(request_id));
		if let Some(path) = path {
			payload.insert("path".into(), Value::from(path));
		}
		Self::new(names::CONNECT, payload, true, None)
	}

	/// Client-initiated navigation intent. No reply is expected.
	pub fn transition_to(target: &str) -> Self {
		let mut payload = Payload::new();
		payload.insert("target".into(), Value::from(target));
		Self::new(names::TRANSITION_TO, payload, false, None)
	}

	/// Server-pushed view replacement, keeping the originating id.
	pub fn rerender(page: &str, id: CorrelationId) -> Self {
		let mut payload = Payload::new();
		payload.insert("page".into(), Value::from(page));
		Self::new(names::RERENDER, payload, false, Some(id))
	}

	pub fn name(&self) -> &str {
		&self.name
	}

	pub fn id(&self) -> &CorrelationId {
		&self.id
	}

	pub fn payload(&self) -> &Payload {
		&self.payload
	}

	pub fn expects_reply(&self) -> bool {
		self.expects_reply
	}

	/// Returns a string field of the payload.
	pub fn get_str(&self, key: &str) -> Option<&str> {
		self.payload.get(key).and_then(Value::as_str)
	}

	/// Encodes the command as a wire frame.
	pub fn to_frame(&self) -> serde_json::Result<String> {
		serde_json::to_string(self)
	}
}

#[cfg(test)]
mod tests {
	use serde_json::json;

	use super::*;

	#[test]
	fn connect_expects_reply_and_carries_request_id() {
		let cmd = Command::connect("r1");
		assert_eq!(cmd.name(), "connect");
		assert!(cmd.expects_reply());
		assert_eq!(cmd.get_str("requestId"), Some("r1"));
		assert!(cmd.payload().get("path").is_none());
	}

	#[test]
	fn connect_from_includes_path() {
		let cmd = Command::connect_from("r1", Some("/about?tab=2"));
		assert_eq!(cmd.get_str("path"), Some("/about?tab=2"));
	}

	#[test]
	fn transition_to_does_not_expect_reply() {
		let cmd = Command::transition_to("/about");
		assert_eq!(cmd.name(), "transitionTo");
		assert!(!cmd.expects_reply());
		assert_eq!(cmd.get_str("target"), Some("/about"));
	}

	#[test]
	fn rerender_reuses_given_id() {
		let cmd = Command::rerender("<p>x</p>", CorrelationId::from("x"));
		assert_eq!(cmd.id().as_str(), "x");
		assert_eq!(cmd.get_str("page"), Some("<p>x</p>"));
	}

	#[test]
	fn explicit_id_is_kept() {
		let cmd = Command::new("ping", Payload::new(), true, Some("fixed".into()));
		assert_eq!(cmd.id().as_str(), "fixed");
	}

	#[test]
	fn frame_has_envelope_shape() {
		let cmd = Command::new(
			"connect",
			Payload::from([("requestId".to_string(), json!("r1"))]),
			true,
			Some("abc".into()),
		);
		let frame: Value = serde_json::from_str(&cmd.to_frame().unwrap()).unwrap();
		assert_eq!(
			frame,
			json!({"command": "connect", "id": "abc", "data": {"requestId": "r1"}})
		);
		assert!(frame.get("expects_reply").is_none());
	}

	#[test]
	fn serialization_is_independent_of_insertion_order() {
		let mut a = Payload::new();
		a.insert("b".into(), json!(2));
		a.insert("a".into(), json!({"nested": [1, 2]}));
		let mut b = Payload::new();
		b.insert("a".into(), json!({"nested": [1, 2]}));
		b.insert("b".into(), json!(2));

		let left = Command::new("x", a, false, Some("id".into())).to_frame().unwrap();
		let right = Command::new("x", b, false, Some("id".into())).to_frame().unwrap();
		assert_eq!(left, right);
		assert_eq!(left, r#"{"command":"x","id":"id","data":{"a":{"nested":[1,2]},"b":2}}"#);
	}
}
