use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, CliError>;

#[derive(Debug, Error)]
pub enum CliError {
	#[error("invalid page URL '{url}'")]
	PageUrl {
		url: String,
		#[source]
		source: url::ParseError,
	},

	#[error("failed to fetch {url}")]
	Fetch {
		url: String,
		#[source]
		source: reqwest::Error,
	},

	#[error("{url} has no cinder-request-id meta tag; pass --request-id")]
	MissingRequestId { url: String },

	#[error("cannot write view to {path}")]
	Output {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	#[error("session handle already installed")]
	HandleInstalled,

	#[error(transparent)]
	Io(#[from] std::io::Error),

	#[error(transparent)]
	Json(#[from] serde_json::Error),

	#[error(transparent)]
	Runtime(#[from] cinder_runtime::Error),

	#[error(transparent)]
	Anyhow(#[from] anyhow::Error),
}
