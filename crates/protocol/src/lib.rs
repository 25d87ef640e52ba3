//! Wire types for the Cinder session protocol.
//!
//! Every frame exchanged with the server is a JSON object in one of two shapes:
//!
//! - a command envelope `{ "command", "id", "data" }`, sent by either side
//! - a reply envelope `{ "replyTo", "ok", "data" }`, sent by the server
//!
//! # Main Types
//!
//! - [`Command`] - an immutable, named message with a [`CorrelationId`]
//! - [`Reply`] - the answer to a command that expects one
//! - [`Message`] - classification of an inbound frame
//! - [`CorrelationId`] - opaque identifier linking a command to its reply

pub mod command;
pub mod id;
pub mod message;
pub mod reply;

pub use command::{Command, Payload, names};
pub use id::CorrelationId;
pub use message::Message;
pub use reply::Reply;
