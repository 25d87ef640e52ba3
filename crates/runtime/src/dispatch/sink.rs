//! View sinks and component discovery.

use std::collections::BTreeMap;

use scraper::{Html, Selector};

use super::component::ComponentNode;
use crate::error::{Error, Result};

/// Attribute naming a node's component kind.
pub const COMPONENT_ATTR: &str = "data-cinder-component";
/// Attribute carrying a component node's identity.
pub const COMPONENT_ID_ATTR: &str = "data-cinder-id";

/// Mutable region of the rendered page that rerenders replace.
pub trait ViewSink: Send {
	/// Replaces the sink's whole content.
	fn replace(&mut self, html: &str);

	/// Current content as HTML.
	fn content(&self) -> &str;
}

/// Sink that keeps the rendered fragment in memory.
#[derive(Debug, Clone, Default)]
pub struct HtmlViewSink {
	html: String,
}

impl HtmlViewSink {
	pub fn new(initial: impl Into<String>) -> Self {
		Self { html: initial.into() }
	}
}

impl ViewSink for HtmlViewSink {
	fn replace(&mut self, html: &str) {
		self.html.clear();
		self.html.push_str(html);
	}

	fn content(&self) -> &str {
		&self.html
	}
}

/// Finds every component-tagged node in `html`, in document order.
///
/// A tagged node without an identity attribute yields
/// [`Error::MissingComponentId`] in its slot so the caller can report it.
pub fn scan_components(html: &str) -> Vec<Result<ComponentNode>> {
	let Ok(selector) = Selector::parse(&format!("[{COMPONENT_ATTR}]")) else {
		return Vec::new();
	};
	let fragment = Html::parse_fragment(html);

	fragment
		.select(&selector)
		.map(|element| {
			let el = element.value();
			let kind = el.attr(COMPONENT_ATTR).unwrap_or_default().to_string();
			let Some(id) = el.attr(COMPONENT_ID_ATTR) else {
				return Err(Error::MissingComponentId { kind });
			};
			let attributes: BTreeMap<String, String> = el
				.attrs()
				.map(|(name, value)| (name.to_string(), value.to_string()))
				.collect();
			Ok(ComponentNode::new(kind, id, attributes))
		})
		.collect()
}
