//! Component kinds shipped with the binary.

mod link;

use cinder_runtime::Dispatcher;

pub use link::link;

/// Registers every built-in component kind.
pub fn register_builtin(dispatcher: &mut Dispatcher) {
	dispatcher.register("link", link);
}
