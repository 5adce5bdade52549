//! Collaborator traits consumed by the generator core.
//!
//! The core never talks to a message bus directly. A [`Connector`] opens a
//! [`Connection`], the connection hands out a [`Sink`] for one topic, and
//! workers publish messages produced by a [`MessageFactory`] into that sink.
//! Concrete implementations live outside this crate.

use super::{Message, Result, Schema};
use async_trait::async_trait;
use std::sync::Arc;

/// Publishes messages to a single topic.
///
/// `publish` may suspend, e.g. while the underlying client applies flow
/// control. Workers never retry a failed publish.
#[async_trait]
pub trait Sink: Send + Sync {
    /// Publishes one message and returns the id assigned by the bus.
    async fn publish(&self, message: Message) -> Result<String>;

    /// Identifier of the topic behind this sink. Used to name workers.
    fn id(&self) -> &str;

    /// Flushes pending messages and stops accepting new ones.
    fn stop(&self);
}

/// Produces one message per call.
pub trait MessageFactory: Send + Sync {
    fn produce(&self) -> Message;
}

impl<F> MessageFactory for F
where
    F: Fn() -> Message + Send + Sync,
{
    fn produce(&self) -> Message {
        self()
    }
}

/// Opens connections to the message bus.
#[async_trait]
pub trait Connector: Send + Sync {
    /// # Errors
    ///
    /// Returns [`Error::Connection`](super::Error::Connection) when the bus is
    /// unreachable.
    async fn connect(&self) -> Result<Box<dyn Connection>>;
}

/// A live connection to the message bus.
#[async_trait]
pub trait Connection: Send + Sync {
    /// Opens a sink for the topic described by `settings`.
    fn open_sink(&self, settings: &SinkSettings) -> Arc<dyn Sink>;

    /// Closes the connection. Sinks opened from it must be stopped first.
    async fn close(&self) -> Result<()>;
}

/// Where and how a sink publishes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SinkSettings {
    pub topic_id: String,
    pub schema: Option<Arc<Schema>>,
    pub batching: BatchSettings,
}

impl SinkSettings {
    pub fn new(topic_id: impl Into<String>) -> Self {
        Self {
            topic_id: topic_id.into(),
            schema: None,
            batching: BatchSettings::default(),
        }
    }

    #[must_use]
    pub fn with_schema(mut self, schema: Schema) -> Self {
        self.schema = Some(Arc::new(schema));
        self
    }

    #[must_use]
    pub const fn with_batching(mut self, batching: BatchSettings) -> Self {
        self.batching = batching;
        self
    }
}

/// Client-side batching and flow-control knobs.
///
/// A value of `0` for `num_tasks` or `max_outstanding` leaves the client's
/// default in place.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchSettings {
    /// Messages buffered before a batch is sent.
    pub batch_size: usize,
    /// Background tasks the client may use to send batches.
    pub num_tasks: usize,
    /// Messages allowed in flight before `publish` blocks.
    pub max_outstanding: usize,
}

impl Default for BatchSettings {
    fn default() -> Self {
        Self {
            batch_size: 100,
            num_tasks: 0,
            max_outstanding: 100,
        }
    }
}
