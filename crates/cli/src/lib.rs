//! Command-line host for the Cinder runtime.
//!
//! Attaches to a server-rendered page over its session socket, keeps the
//! page's view in sync with pushed rerenders, and binds the built-in
//! components.

pub mod cli;
pub mod commands;
pub mod components;
pub mod error;
pub mod handle;
pub mod logging;
pub mod page;
pub mod sink;
