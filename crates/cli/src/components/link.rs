use cinder_runtime::{Cinder, Component, ComponentEvent, ComponentNode};

/// In-app navigation link.
///
/// A click on a site-relative `href` is kept from the host and turned into a
/// `transitionTo`; any other link is left alone.
pub fn link(node: ComponentNode, cinder: &Cinder) -> Component {
	let cinder = cinder.clone();
	let mut component = Component::new(node);
	component.register_event("click", move |node: &ComponentNode, event: &mut ComponentEvent| {
		if let Some(href) = node.attr("href").filter(|href| href.starts_with('/')) {
			event.prevent_default();
			cinder.transition_to(href);
		}
	});
	component
}
