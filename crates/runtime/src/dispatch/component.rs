//! Component instances and the factories that build them.

use std::collections::{BTreeMap, HashMap};

use crate::context::Cinder;

/// Snapshot of a component-tagged node taken when it was bound.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentNode {
	kind: String,
	id: String,
	attributes: BTreeMap<String, String>,
}

impl ComponentNode {
	pub fn new(kind: impl Into<String>, id: impl Into<String>, attributes: BTreeMap<String, String>) -> Self {
		Self {
			kind: kind.into(),
			id: id.into(),
			attributes,
		}
	}

	pub fn kind(&self) -> &str {
		&self.kind
	}

	pub fn id(&self) -> &str {
		&self.id
	}

	pub fn attr(&self, name: &str) -> Option<&str> {
		self.attributes.get(name).map(String::as_str)
	}

	pub fn attributes(&self) -> &BTreeMap<String, String> {
		&self.attributes
	}
}

/// A user interaction delivered to a component.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentEvent {
	name: String,
	default_prevented: bool,
}

impl ComponentEvent {
	pub fn new(name: impl Into<String>) -> Self {
		Self {
			name: name.into(),
			default_prevented: false,
		}
	}

	pub fn name(&self) -> &str {
		&self.name
	}

	/// Suppresses the host's default action for this event.
	pub fn prevent_default(&mut self) {
		self.default_prevented = true;
	}

	pub fn is_default_prevented(&self) -> bool {
		self.default_prevented
	}
}

/// Callback run for a subscribed event.
pub type EventHandler = Box<dyn Fn(&ComponentNode, &mut ComponentEvent) + Send + Sync>;

/// Live binding between a node and its event subscriptions.
pub struct Component {
	node: ComponentNode,
	handlers: HashMap<String, EventHandler>,
}

impl Component {
	pub fn new(node: ComponentNode) -> Self {
		Self {
			node,
			handlers: HashMap::new(),
		}
	}

	pub fn id(&self) -> &str {
		self.node.id()
	}

	pub fn kind(&self) -> &str {
		self.node.kind()
	}

	pub fn node(&self) -> &ComponentNode {
		&self.node
	}

	/// Subscribes `handler` to events named `name`, replacing any previous one.
	pub fn register_event<F>(&mut self, name: impl Into<String>, handler: F)
	where
		F: Fn(&ComponentNode, &mut ComponentEvent) + Send + Sync + 'static,
	{
		self.handlers.insert(name.into(), Box::new(handler));
	}

	/// Runs the handler subscribed to `event`. Returns false when there is none.
	pub fn handle_event(&self, event: &mut ComponentEvent) -> bool {
		match self.handlers.get(event.name()) {
			Some(handler) => {
				handler(&self.node, event);
				true
			}
			None => {
				tracing::warn!(
					component = self.id(),
					kind = self.kind(),
					"Received unexpected event '{}'",
					event.name()
				);
				false
			}
		}
	}

	/// Names of subscribed events, sorted.
	pub fn supported_events(&self) -> Vec<&str> {
		let mut names: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
		names.sort_unstable();
		names
	}
}

impl std::fmt::Debug for Component {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Component")
			.field("node", &self.node)
			.field("events", &self.supported_events())
			.finish()
	}
}

/// Builds component instances for one component kind.
pub trait ComponentFactory: Send + Sync {
	fn build(&self, node: ComponentNode, cinder: &Cinder) -> Component;
}

impl<F> ComponentFactory for F
where
	F: Fn(ComponentNode, &Cinder) -> Component + Send + Sync,
{
	fn build(&self, node: ComponentNode, cinder: &Cinder) -> Component {
		self(node, cinder)
	}
}
