//! Kafka transport.
//!
//! Consumption starts at the configured `stream.start_offset` and no
//! offsets are committed, so a restarted worker resumes from that setting
//! rather than from where it stopped.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use futures_util::StreamExt;
use rskafka::client::consumer::{StartOffset as KafkaOffset, StreamConsumerBuilder};
use rskafka::client::partition::{Compression, PartitionClient, UnknownTopicHandling};
use rskafka::client::{Client, ClientBuilder};
use rskafka::record::Record;
use tokio::sync::Mutex;

use super::{RecordStream, StreamRecord, StreamTransport};
use crate::config::{StartOffset, StreamConfig};
use crate::error::{Error, Result};

/// Maximum time a fetch waits for new records.
const MAX_WAIT_MS: i32 = 500;

/// Consumes and produces one partition per topic.
pub struct KafkaTransport {
    client: Client,
    partition: i32,
    start_offset: StartOffset,
    partitions: Mutex<HashMap<String, Arc<PartitionClient>>>,
}

fn transport_error(e: impl std::fmt::Display) -> Error {
    Error::Transport(e.to_string())
}

fn kafka_offset(offset: StartOffset) -> KafkaOffset {
    match offset {
        StartOffset::Earliest => KafkaOffset::Earliest,
        StartOffset::Latest => KafkaOffset::Latest,
        StartOffset::At(offset) => KafkaOffset::At(offset),
    }
}

/// Tombstones (no value) carry nothing to predict on and are skipped.
fn from_kafka(record: Record) -> Option<StreamRecord> {
    let value = record.value?;
    Some(StreamRecord::new(record.key.map(Bytes::from), value))
}

fn to_kafka(record: StreamRecord) -> Record {
    Record {
        key: record.key.map(|k| k.to_vec()),
        value: Some(record.value.to_vec()),
        headers: BTreeMap::new(),
        timestamp: Utc::now(),
    }
}

impl KafkaTransport {
    pub async fn connect(config: &StreamConfig) -> Result<Self> {
        tracing::info!(
            brokers = ?config.brokers,
            partition = config.partition,
            start_offset = ?config.start_offset,
            "Connecting to Kafka"
        );
        let client = ClientBuilder::new(config.brokers.clone())
            .build()
            .await
            .map_err(transport_error)?;
        Ok(Self {
            client,
            partition: config.partition,
            start_offset: config.start_offset,
            partitions: Mutex::new(HashMap::new()),
        })
    }

    async fn partition_client(&self, topic: &str) -> Result<Arc<PartitionClient>> {
        let mut partitions = self.partitions.lock().await;
        if let Some(client) = partitions.get(topic) {
            return Ok(client.clone());
        }

        let client = Arc::new(
            self.client
                .partition_client(topic, self.partition, UnknownTopicHandling::Retry)
                .await
                .map_err(transport_error)?,
        );
        partitions.insert(topic.to_string(), client.clone());
        Ok(client)
    }
}

#[async_trait]
impl StreamTransport for KafkaTransport {
    async fn subscribe(&self, topic: &str) -> Result<RecordStream> {
        let partition = self.partition_client(topic).await?;
        let consumer = StreamConsumerBuilder::new(partition, kafka_offset(self.start_offset))
            .with_max_wait_ms(MAX_WAIT_MS)
            .build();

        let records = consumer.filter_map(|item| async move {
            match item {
                Ok((record, _high_watermark)) => from_kafka(record.record).map(Ok),
                Err(e) => Some(Err(transport_error(e))),
            }
        });
        Ok(Box::pin(records))
    }

    async fn publish(&self, topic: &str, record: StreamRecord) -> Result<()> {
        let partition = self.partition_client(topic).await?;
        partition
            .produce(vec![to_kafka(record)], Compression::NoCompression)
            .await
            .map_err(transport_error)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(key: Option<&[u8]>, value: Option<&[u8]>) -> Record {
        Record {
            key: key.map(<[u8]>::to_vec),
            value: value.map(<[u8]>::to_vec),
            headers: BTreeMap::new(),
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_consumed_record_keeps_key_and_value() {
        let consumed = from_kafka(record(Some(b"k1"), Some(b"{}"))).unwrap();
        assert_eq!(consumed, StreamRecord::keyed("k1", "{}"));

        let unkeyed = from_kafka(record(None, Some(b"{}"))).unwrap();
        assert!(unkeyed.key.is_none());
    }

    #[test]
    fn test_tombstones_are_skipped() {
        assert!(from_kafka(record(Some(b"k1"), None)).is_none());
    }

    #[test]
    fn test_produced_record_carries_key_and_value() {
        let produced = to_kafka(StreamRecord::keyed("k2", "payload"));
        assert_eq!(produced.key.as_deref(), Some(&b"k2"[..]));
        assert_eq!(produced.value.as_deref(), Some(&b"payload"[..]));
        assert!(produced.headers.is_empty());

        let unkeyed = to_kafka(StreamRecord::new(None, "payload"));
        assert!(unkeyed.key.is_none());
    }

    #[test]
    fn test_start_offsets_map_to_the_client() {
        assert!(matches!(kafka_offset(StartOffset::Earliest), KafkaOffset::Earliest));
        assert!(matches!(kafka_offset(StartOffset::Latest), KafkaOffset::Latest));
        assert!(matches!(kafka_offset(StartOffset::At(7)), KafkaOffset::At(7)));
    }
}
