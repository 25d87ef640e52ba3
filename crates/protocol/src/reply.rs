//! Reply envelope.

use serde::{Deserialize, Serialize};

use crate::command::{Command, Payload, nullable_payload};
use crate::id::CorrelationId;

/// Answer to a command, wire shape `{ "replyTo", "ok", "data" }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reply {
	/// Id of the command this reply answers.
	#[serde(rename = "replyTo")]
	pub in_reply_to: CorrelationId,
	/// Whether the server accepted the command. A missing flag reads as a rejection.
	#[serde(default)]
	pub ok: bool,
	#[serde(rename = "data", default, deserialize_with = "nullable_payload")]
	pub payload: Payload,
}

impl Reply {
	pub fn new(in_reply_to: CorrelationId, ok: bool, payload: Payload) -> Self {
		Self {
			in_reply_to,
			ok,
			payload,
		}
	}

	/// Client-side acknowledgement for commands that expect no reply.
	pub fn synthetic(command: &Command) -> Self {
		Self::new(command.id().clone(), true, Payload::new())
	}

	/// Returns a string field of the payload.
	pub fn get_str(&self, key: &str) -> Option<&str> {
		self.payload.get(key).and_then(serde_json::Value::as_str)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn synthetic_reply_is_ok_and_empty() {
		let cmd = Command::transition_to("/");
		let reply = Reply::synthetic(&cmd);
		assert!(reply.ok);
		assert_eq!(&reply.in_reply_to, cmd.id());
		assert!(reply.payload.is_empty());
	}

	#[test]
	fn decodes_wire_shape() {
		let reply: Reply =
			serde_json::from_str(r#"{"replyTo": "abc", "ok": true, "data": {"requestId": "r2"}}"#)
				.unwrap();
		assert_eq!(reply.in_reply_to.as_str(), "abc");
		assert!(reply.ok);
		assert_eq!(reply.get_str("requestId"), Some("r2"));
	}

	#[test]
	fn null_data_and_missing_ok_read_as_empty_rejection() {
		let reply: Reply = serde_json::from_str(r#"{"replyTo": "abc", "data": null}"#).unwrap();
		assert!(!reply.ok);
		assert!(reply.payload.is_empty());
	}

	#[test]
	fn data_defaults_to_empty() {
		let reply: Reply = serde_json::from_str(r#"{"replyTo": "abc", "ok": false}"#).unwrap();
		assert!(!reply.ok);
		assert!(reply.payload.is_empty());
	}
}
