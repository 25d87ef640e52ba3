//! Dispatch of pushed commands into view mutations and component bindings.
//!
//! The [`Dispatcher`] owns the view sink and every live component. A
//! rerender replaces the sink's content, then drops all bindings and builds
//! fresh ones for the tagged nodes of the new content, so no component
//! outlives the node it was built for.

mod component;
mod sink;

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use cinder_protocol::{Command, names};
use parking_lot::Mutex;

pub use self::component::{Component, ComponentEvent, ComponentFactory, ComponentNode, EventHandler};
pub use self::sink::{COMPONENT_ATTR, COMPONENT_ID_ATTR, HtmlViewSink, ViewSink, scan_components};
use crate::context::Cinder;
use crate::session::CommandHandler;

struct Bindings {
	sink: Box<dyn ViewSink>,
	components: HashMap<String, Component>,
}

/// Applies pushed commands to a view sink and keeps components bound.
pub struct Dispatcher {
	factories: HashMap<String, Arc<dyn ComponentFactory>>,
	context: OnceLock<Cinder>,
	bindings: Mutex<Bindings>,
}

impl Dispatcher {
	pub fn new(sink: impl ViewSink + 'static) -> Self {
		Self {
			factories: HashMap::new(),
			context: OnceLock::new(),
			bindings: Mutex::new(Bindings {
				sink: Box::new(sink),
				components: HashMap::new(),
			}),
		}
	}

	/// Registers the factory for nodes tagged with `kind`.
	pub fn register(&mut self, kind: impl Into<String>, factory: impl ComponentFactory + 'static) -> &mut Self {
		self.factories.insert(kind.into(), Arc::new(factory));
		self
	}

	/// Builder form of [`Dispatcher::register`].
	pub fn with_component(mut self, kind: impl Into<String>, factory: impl ComponentFactory + 'static) -> Self {
		self.register(kind, factory);
		self
	}

	/// Hands the application context to future component factories.
	///
	/// Returns false if a context was already attached.
	pub fn attach(&self, cinder: Cinder) -> bool {
		self.context.set(cinder).is_ok()
	}

	/// Replaces the sink's content with `page` and rebinds components.
	///
	/// Returns the number of live components afterwards.
	pub fn apply_rerender(&self, page: &str) -> usize {
		let mut bindings = self.bindings.lock();
		bindings.sink.replace(page);
		self.rebind(&mut bindings)
	}

	/// Drops every live component and binds fresh ones for the current content.
	pub fn rebind_components(&self) -> usize {
		let mut bindings = self.bindings.lock();
		self.rebind(&mut bindings)
	}

	fn rebind(&self, bindings: &mut Bindings) -> usize {
		bindings.components.clear();

		let Some(cinder) = self.context.get() else {
			tracing::warn!("No application context attached, components stay unbound");
			return 0;
		};

		for node in scan_components(bindings.sink.content()) {
			let node = match node {
				Ok(node) => node,
				Err(e) => {
					tracing::warn!("Skipping component: {}", e);
					continue;
				}
			};
			let Some(factory) = self.factories.get(node.kind()) else {
				tracing::debug!(kind = node.kind(), id = node.id(), "No factory for component kind");
				continue;
			};

			let id = node.id().to_string();
			let component = factory.build(node, cinder);
			if bindings.components.insert(id.clone(), component).is_some() {
				tracing::warn!(id, "Duplicate component id, keeping the last node");
			}
		}

		tracing::debug!(count = bindings.components.len(), "Components rebound");
		bindings.components.len()
	}

	/// Delivers `event` to the component bound under `component_id`.
	///
	/// Returns true if a subscribed handler ran.
	pub fn dispatch_event(&self, component_id: &str, event: &mut ComponentEvent) -> bool {
		let bindings = self.bindings.lock();
		match bindings.components.get(component_id) {
			Some(component) => component.handle_event(event),
			None => {
				tracing::warn!(component = component_id, "Event '{}' for unbound component", event.name());
				false
			}
		}
	}

	/// Current sink content.
	pub fn content(&self) -> String {
		self.bindings.lock().sink.content().to_string()
	}

	/// Ids of the live components, sorted.
	pub fn bound_ids(&self) -> Vec<String> {
		let mut ids: Vec<String> = self.bindings.lock().components.keys().cloned().collect();
		ids.sort_unstable();
		ids
	}
}

impl CommandHandler for Dispatcher {
	fn handle_command(&self, command: Command) {
		match command.name() {
			names::RERENDER => match command.get_str("page") {
				Some(page) => {
					self.apply_rerender(page);
				}
				None => tracing::warn!(id = %command.id(), "rerender without a page (ignored)"),
			},
			other => tracing::warn!(id = %command.id(), "Unknown pushed command '{}' (ignored)", other),
		}
	}
}
