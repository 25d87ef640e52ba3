//! Correlation identifiers.

use std::fmt;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::{Deserialize, Serialize};

/// Number of random bytes behind a generated id.
const ID_BYTES: usize = 16;

/// Opaque identifier linking a command to its eventual reply.
///
/// Generated ids carry 128 bits from the thread-local CSPRNG, so collisions
/// are negligible. Ids issued by the server are accepted verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrelationId(String);

impl CorrelationId {
	/// Generates a fresh random id.
	pub fn generate() -> Self {
		let bytes: [u8; ID_BYTES] = rand::random();
		Self(URL_SAFE_NO_PAD.encode(bytes))
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}

	pub fn into_inner(self) -> String {
		self.0
	}
}

impl fmt::Display for CorrelationId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

impl From<String> for CorrelationId {
	fn from(value: String) -> Self {
		Self(value)
	}
}

impl From<&str> for CorrelationId {
	fn from(value: &str) -> Self {
		Self(value.to_string())
	}
}

impl AsRef<str> for CorrelationId {
	fn as_ref(&self) -> &str {
		&self.0
	}
}

#[cfg(test)]
mod tests {
	use std::collections::HashSet;

	use super::*;

	#[test]
	fn generated_ids_do_not_collide() {
		let ids: HashSet<CorrelationId> = (0..100_000).map(|_| CorrelationId::generate()).collect();
		assert_eq!(ids.len(), 100_000);
	}

	#[test]
	fn generated_id_is_url_safe_base64_of_sixteen_bytes() {
		let id = CorrelationId::generate();
		// 16 bytes without padding encode to 22 characters
		assert_eq!(id.as_str().len(), 22);
		assert!(
			id.as_str()
				.chars()
				.all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
		);
	}

	#[test]
	fn serializes_as_bare_string() {
		let id = CorrelationId::from("abc");
		assert_eq!(serde_json::to_string(&id).unwrap(), "\"abc\"");
	}
}
