//! Cinder runtime - session transport, reply correlation, and view dispatch
//!
//! This crate is the client side of a server-driven UI: the server renders
//! HTML fragments and pushes them over a persistent duplex channel, and the
//! runtime applies them to a view sink and keeps components bound.
//!
//! - **Transport**: WebSocket or in-process channels behind a [`Connector`]
//! - **Session**: connection lifecycle, `connect` handshake, reconnects
//! - **Registry**: command/reply correlation with per-request timeouts
//! - **Dispatch**: rerenders, component binding, and event delivery
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐
//! │  Dispatcher  │  View sink, components
//! └──────▲───────┘
//!        │ implements CommandHandler
//! ┌──────┴───────┐
//! │   Session    │  Handle
//! │  ┌────────┐  │
//! │  │ Driver │  │  State machine, owns the registry
//! │  └────────┘  │
//! │  ┌────────┐  │
//! │  │ Trans  │  │  WebSocket / memory
//! │  └────────┘  │
//! └──────────────┘
//! ```
//!
//! Components reach the session through the [`Cinder`] context, which is
//! handed to every [`ComponentFactory`].

pub mod config;
pub mod context;
pub mod dispatch;
pub mod document;
pub mod endpoint;
pub mod error;
pub mod registry;
pub mod session;
pub mod transport;

// Re-export key types at crate root
pub use config::SessionConfig;
pub use context::{Cinder, History, MemoryHistory};
pub use dispatch::{
	Component, ComponentEvent, ComponentFactory, ComponentNode, Dispatcher, HtmlViewSink, ViewSink,
};
pub use document::PageDocument;
pub use error::{Error, Result};
pub use registry::{CorrelationRegistry, DEFAULT_REPLY_TIMEOUT, PendingReply};
pub use session::{CommandHandler, Session, SessionDriver, TransportState, WeakSession};
pub use transport::{Connector, MemoryConnector, ServerEnd, TransportEvent, TransportParts, WebSocketConnector};
