//! Classification of inbound frames.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::command::Command;
use crate::reply::Reply;

/// Discriminated union of inbound protocol frames.
///
/// Frames are classified by key: anything carrying `replyTo` is a reply,
/// anything carrying `command` is a pushed command. A frame that has the key
/// but not the expected shape falls back to [`Message::Unknown`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Message {
	/// Reply to an earlier command (has `replyTo`)
	Reply(Reply),
	/// Server-pushed command (has `command`)
	Command(Command),
	/// Unknown frame shape (forward-compatible catch-all)
	Unknown(Value),
}

impl Message {
	/// Parses a text frame.
	///
	/// Fails only when the frame is not JSON; any JSON value classifies.
	pub fn parse(frame: &str) -> serde_json::Result<Self> {
		serde_json::from_str::<Value>(frame).map(Self::classify)
	}

	/// Classifies an already decoded JSON value.
	pub fn classify(value: Value) -> Self {
		let Some(object) = value.as_object() else {
			return Self::Unknown(value);
		};
		if object.contains_key("replyTo") {
			match Reply::deserialize(&value) {
				Ok(reply) => Self::Reply(reply),
				Err(_) => Self::Unknown(value),
			}
		} else if object.contains_key("command") {
			match Command::deserialize(&value) {
				Ok(command) => Self::Command(command),
				Err(_) => Self::Unknown(value),
			}
		} else {
			Self::Unknown(value)
		}
	}
}

impl<'de> Deserialize<'de> for Message {
	fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
		Value::deserialize(deserializer).map(Self::classify)
	}
}
