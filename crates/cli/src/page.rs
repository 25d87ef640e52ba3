//! Resolving a page URL into everything a session needs.

use std::time::Duration;

use cinder_runtime::{PageDocument, endpoint};
use serde::Serialize;
use url::Url;

use crate::cli::PageArgs;
use crate::error::{CliError, Result};

/// Session parameters derived from a hosting page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageTarget {
	pub page_url: Url,
	pub endpoint: Url,
	pub path: String,
	pub request_id: String,
	/// Initial view content, when the page was fetched.
	#[serde(skip)]
	pub main: Option<String>,
}

impl PageTarget {
	/// Derives the target, fetching the page only when no request id was given.
	pub async fn resolve(args: &PageArgs) -> Result<Self> {
		let page_url = parse_page_url(&args.page_url)?;
		let document = match &args.request_id {
			Some(_) => PageDocument::default(),
			None => fetch_page(&page_url, Duration::from_millis(args.fetch_timeout_ms)).await?,
		};
		Self::from_document(page_url, args.request_id.clone(), document)
	}

	/// Combines the URL, an optional explicit request id, and a parsed page.
	pub fn from_document(page_url: Url, request_id: Option<String>, document: PageDocument) -> Result<Self> {
		let endpoint = endpoint::derive(&page_url)?;
		let path = endpoint::navigation_path(&page_url);
		let request_id = request_id
			.or(document.request_id)
			.ok_or_else(|| CliError::MissingRequestId {
				url: page_url.to_string(),
			})?;

		Ok(Self {
			page_url,
			endpoint,
			path,
			request_id,
			main: document.main,
		})
	}
}

pub fn parse_page_url(raw: &str) -> Result<Url> {
	Url::parse(raw).map_err(|source| CliError::PageUrl {
		url: raw.to_string(),
		source,
	})
}

/// Fetches and parses the hosting page.
pub async fn fetch_page(page_url: &Url, timeout: Duration) -> Result<PageDocument> {
	let fetch_err = |source| CliError::Fetch {
		url: page_url.to_string(),
		source,
	};

	let client = reqwest::Client::builder().timeout(timeout).build().map_err(fetch_err)?;
	let response = client
		.get(page_url.clone())
		.send()
		.await
		.and_then(|r| r.error_for_status())
		.map_err(fetch_err)?;
	let html = response.text().await.map_err(fetch_err)?;

	tracing::debug!(url = %page_url, bytes = html.len(), "Fetched page");
	Ok(PageDocument::parse(&html))
}
