//! A message-bus client that writes batches to the log.
//!
//! [`LogConnector`] stands in for a real bus client: it accepts every
//! connection, and the sinks it opens encode messages to JSON and buffer them
//! until a batch is full. A full batch is "sent" by logging it under the
//! `eventgen::sink` target. Stopping a sink flushes whatever is still pending.

use async_trait::async_trait;
use eventgen_core::{Connection, Connector, Error, Message, Result, Schema, Sink, SinkSettings};
use parking_lot::Mutex;
use std::sync::{
    Arc,
    atomic::{AtomicBool, AtomicU64, Ordering},
};
use tracing::{debug, info};

#[derive(Debug, Default, Clone, Copy)]
pub struct LogConnector;

#[async_trait]
impl Connector for LogConnector {
    async fn connect(&self) -> Result<Box<dyn Connection>> {
        info!("Connected to log sink");
        Ok(Box::new(LogConnection::default()))
    }
}

#[derive(Debug, Default)]
pub struct LogConnection {
    closed: AtomicBool,
}

#[async_trait]
impl Connection for LogConnection {
    fn open_sink(&self, settings: &SinkSettings) -> Arc<dyn Sink> {
        info!(
            topic = %settings.topic_id,
            batch_size = settings.batching.batch_size,
            num_tasks = settings.batching.num_tasks,
            max_outstanding = settings.batching.max_outstanding,
            schema = settings.schema.as_ref().map(|s| s.name.as_str()),
            "Opening sink"
        );
        Arc::new(LogSink::new(settings))
    }

    async fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Err(Error::release("connection already closed"));
        }
        info!("Closed log sink connection");
        Ok(())
    }
}

pub struct LogSink {
    topic_id: String,
    schema: Option<Arc<Schema>>,
    batch_size: usize,
    batch: Mutex<Vec<String>>,
    next_id: AtomicU64,
    stopped: AtomicBool,
}

impl LogSink {
    fn new(settings: &SinkSettings) -> Self {
        let batch_size = settings.batching.batch_size.max(1);
        Self {
            topic_id: settings.topic_id.clone(),
            schema: settings.schema.clone(),
            batch_size,
            batch: Mutex::new(Vec::with_capacity(batch_size)),
            next_id: AtomicU64::new(1),
            stopped: AtomicBool::new(false),
        }
    }

    fn flush(&self, batch: Vec<String>) {
        if batch.is_empty() {
            return;
        }
        info!(
            target: "eventgen::sink",
            topic = %self.topic_id,
            count = batch.len(),
            "Sent batch"
        );
        for payload in &batch {
            debug!(target: "eventgen::sink", topic = %self.topic_id, %payload);
        }
    }

    #[cfg(test)]
    fn pending(&self) -> usize {
        self.batch.lock().len()
    }
}

#[async_trait]
impl Sink for LogSink {
    async fn publish(&self, message: Message) -> Result<String> {
        if self.stopped.load(Ordering::Acquire) {
            return Err(Error::publish(format!("sink {} is stopped", self.topic_id)));
        }
        if let Some(field) = self
            .schema
            .as_deref()
            .and_then(|schema| schema.missing_field(&message))
        {
            return Err(Error::publish(format!(
                "ignore invalid message: missing field {field}"
            )));
        }
        let payload =
            serde_json::to_string(&message).map_err(|e| Error::publish(e.to_string()))?;

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let full = {
            let mut batch = self.batch.lock();
            batch.push(payload);
            if batch.len() >= self.batch_size {
                Some(core::mem::replace(
                    &mut *batch,
                    Vec::with_capacity(self.batch_size),
                ))
            } else {
                None
            }
        };
        if let Some(batch) = full {
            self.flush(batch);
        }

        Ok(id.to_string())
    }

    fn id(&self) -> &str {
        &self.topic_id
    }

    fn stop(&self) {
        if self.stopped.swap(true, Ordering::AcqRel) {
            return;
        }
        let rest = core::mem::take(&mut *self.batch.lock());
        self.flush(rest);
    }
}
