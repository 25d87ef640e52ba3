//! Bootstrap values read from the server-rendered page.

use scraper::{Html, Selector};

/// Selector of the element whose content rerenders replace.
pub const MAIN_SELECTOR: &str = r#"div[data="cinder-main"]"#;
/// Selector of the meta tag carrying the initial request id.
pub const REQUEST_ID_SELECTOR: &str = r#"meta[name="cinder-request-id"]"#;

/// What a hosting page hands the runtime at startup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageDocument {
	/// Initial session resumption token.
	pub request_id: Option<String>,
	/// Inner HTML of the view sink element.
	pub main: Option<String>,
}

impl PageDocument {
	pub fn parse(html: &str) -> Self {
		let document = Html::parse_document(html);

		let request_id = Selector::parse(REQUEST_ID_SELECTOR)
			.ok()
			.and_then(|s| document.select(&s).next())
			.and_then(|meta| meta.value().attr("content"))
			.map(str::trim)
			.filter(|id| !id.is_empty())
			.map(str::to_string);

		let main = Selector::parse(MAIN_SELECTOR)
			.ok()
			.and_then(|s| document.select(&s).next())
			.map(|el| el.inner_html());

		Self { request_id, main }
	}
}
