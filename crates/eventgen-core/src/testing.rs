//! In-memory collaborators for unit tests.

use crate::common::{
    Connection, Connector, Error, Message, MessageFactory, Result, Sink, SinkSettings, Value,
};
use async_trait::async_trait;
use core::time::Duration;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};

/// Returns a factory that counts every message it produces.
pub(crate) fn counting_factory() -> (Arc<dyn MessageFactory>, Arc<AtomicU64>) {
    let produced = Arc::new(AtomicU64::new(0));
    let counter = Arc::clone(&produced);
    let factory: Arc<dyn MessageFactory> = Arc::new(move || {
        let n = counter.fetch_add(1, Ordering::SeqCst);
        let mut message = Message::new();
        message.insert("seq".into(), Value::Int(n as i64));
        message
    });
    (factory, produced)
}

pub(crate) struct MockSink {
    id: String,
    fail: bool,
    publish_delay: Duration,
    published: AtomicU64,
    stops: AtomicUsize,
}

impl MockSink {
    pub(crate) fn new(id: &str) -> Arc<Self> {
        Self::build(id, false, Duration::ZERO)
    }

    pub(crate) fn failing(id: &str) -> Arc<Self> {
        Self::build(id, true, Duration::ZERO)
    }

    pub(crate) fn slow(id: &str, publish_delay: Duration) -> Arc<Self> {
        Self::build(id, false, publish_delay)
    }

    fn build(id: &str, fail: bool, publish_delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            id: id.to_owned(),
            fail,
            publish_delay,
            published: AtomicU64::new(0),
            stops: AtomicUsize::new(0),
        })
    }

    /// Publish attempts, successful or not.
    pub(crate) fn published(&self) -> u64 {
        self.published.load(Ordering::SeqCst)
    }

    pub(crate) fn stops(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Sink for MockSink {
    async fn publish(&self, _message: Message) -> Result<String> {
        if !self.publish_delay.is_zero() {
            tokio::time::sleep(self.publish_delay).await;
        }
        let n = self.published.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(Error::publish("mock sink rejects everything"));
        }
        Ok(n.to_string())
    }

    fn id(&self) -> &str {
        &self.id
    }

    fn stop(&self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
    }
}

/// Connector handing out connections to one shared [`MockSink`].
pub(crate) struct MockConnector {
    pub(crate) sink: Arc<MockSink>,
    fail_connect: AtomicBool,
    fail_close: bool,
    connect_delay: Duration,
    connects: AtomicUsize,
    closes: Arc<AtomicUsize>,
}

impl MockConnector {
    pub(crate) fn new(sink: Arc<MockSink>) -> Arc<Self> {
        Self::build(sink, false, Duration::ZERO)
    }

    pub(crate) fn failing_close(sink: Arc<MockSink>) -> Arc<Self> {
        Self::build(sink, true, Duration::ZERO)
    }

    pub(crate) fn slow(sink: Arc<MockSink>, connect_delay: Duration) -> Arc<Self> {
        Self::build(sink, false, connect_delay)
    }

    fn build(sink: Arc<MockSink>, fail_close: bool, connect_delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            sink,
            fail_connect: AtomicBool::new(false),
            fail_close,
            connect_delay,
            connects: AtomicUsize::new(0),
            closes: Arc::new(AtomicUsize::new(0)),
        })
    }

    pub(crate) fn set_unreachable(&self, unreachable: bool) {
        self.fail_connect.store(unreachable, Ordering::SeqCst);
    }

    pub(crate) fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub(crate) fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn connect(&self) -> Result<Box<dyn Connection>> {
        if !self.connect_delay.is_zero() {
            tokio::time::sleep(self.connect_delay).await;
        }
        if self.fail_connect.load(Ordering::SeqCst) {
            return Err(Error::connection("mock bus unreachable"));
        }
        self.connects.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MockConnection {
            sink: Arc::clone(&self.sink),
            fail_close: self.fail_close,
            closes: Arc::clone(&self.closes),
        }))
    }
}

struct MockConnection {
    sink: Arc<MockSink>,
    fail_close: bool,
    closes: Arc<AtomicUsize>,
}

#[async_trait]
impl Connection for MockConnection {
    fn open_sink(&self, _settings: &SinkSettings) -> Arc<dyn Sink> {
        let sink: Arc<dyn Sink> = self.sink.clone();
        sink
    }

    async fn close(&self) -> Result<()> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        if self.fail_close {
            return Err(Error::release("mock close failure"));
        }
        Ok(())
    }
}
