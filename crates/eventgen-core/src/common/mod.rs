//! Shared types for the generator core.
//!
//! ## Structure
//!
//! - [`error`] - The unified [`Error`] enum and [`Result`] alias.
//! - [`message`] - Message values and the record schema they are checked
//!   against.
//! - [`sink`] - Collaborator traits for the message bus and the payload
//!   generator.

pub mod error;
pub mod message;
pub mod sink;

pub use error::{Error, Result};
pub use message::{Message, Schema, SchemaField, Value};
pub use sink::{BatchSettings, Connection, Connector, MessageFactory, Sink, SinkSettings};
