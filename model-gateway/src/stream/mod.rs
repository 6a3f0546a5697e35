//! Message-stream binding.
//!
//! A [`StreamWorker`] consumes keyed records from the predict input topic,
//! dispatches each to `predict` and publishes the result under the same key.
//! Brokers sit behind the [`StreamTransport`] trait.

#[cfg(feature = "kafka")]
pub mod kafka;
pub mod memory;
mod worker;

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::stream::BoxStream;

use crate::config::StreamConfig;
use crate::error::Result;

pub use memory::MemoryTransport;
pub use worker::StreamWorker;

/// One keyed record on a topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamRecord {
    pub key: Option<Bytes>,
    pub value: Bytes,
}

impl StreamRecord {
    pub fn new(key: Option<Bytes>, value: impl Into<Bytes>) -> Self {
        Self {
            key,
            value: value.into(),
        }
    }

    pub fn keyed(key: impl Into<Bytes>, value: impl Into<Bytes>) -> Self {
        Self::new(Some(key.into()), value)
    }
}

/// Records of a subscription, in topic order.
pub type RecordStream = BoxStream<'static, Result<StreamRecord>>;

/// Broker connection used by the stream binding.
#[async_trait]
pub trait StreamTransport: Send + Sync {
    /// Start consuming `topic`.
    async fn subscribe(&self, topic: &str) -> Result<RecordStream>;

    async fn publish(&self, topic: &str, record: StreamRecord) -> Result<()>;
}

/// Connect to the configured brokers.
#[cfg(feature = "kafka")]
pub async fn connect(config: &StreamConfig) -> Result<Arc<dyn StreamTransport>> {
    let transport = kafka::KafkaTransport::connect(config).await?;
    Ok(Arc::new(transport))
}

/// Connect to the configured brokers.
#[cfg(not(feature = "kafka"))]
pub async fn connect(config: &StreamConfig) -> Result<Arc<dyn StreamTransport>> {
    Err(crate::error::Error::Configuration(format!(
        "stream binding enabled for brokers {:?} but built without the `kafka` feature",
        config.brokers
    )))
}
