//! Socket endpoint derivation from the hosting page URL.

use url::Url;

use crate::error::{Error, Result};

/// Path of the session socket on the page's host.
pub const SOCKET_PATH: &str = "/ws";

/// Maps `http` to `ws` and `https` to `wss`, keeping host and port.
pub fn derive(page_url: &Url) -> Result<Url> {
	let scheme = match page_url.scheme() {
		"http" => "ws",
		"https" => "wss",
		other => {
			return Err(Error::InvalidEndpoint(format!(
				"unsupported page scheme '{other}' in {page_url}"
			)));
		}
	};
	let host = page_url
		.host_str()
		.ok_or_else(|| Error::InvalidEndpoint(format!("no host in {page_url}")))?;

	let authority = match page_url.port() {
		Some(port) => format!("{host}:{port}"),
		None => host.to_string(),
	};
	Ok(Url::parse(&format!("{scheme}://{authority}{SOCKET_PATH}"))?)
}

/// Navigational location of the page: path plus `?query` when present.
pub fn navigation_path(page_url: &Url) -> String {
	match page_url.query() {
		Some(query) => format!("{}?{}", page_url.path(), query),
		None => page_url.path().to_string(),
	}
}
