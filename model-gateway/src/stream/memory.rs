//! In-process transport with retained topic logs.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::stream;
use tokio::sync::{Mutex, Notify, RwLock};

use super::{RecordStream, StreamRecord, StreamTransport};
use crate::error::Result;

#[derive(Default)]
struct TopicLog {
    records: RwLock<Vec<StreamRecord>>,
    notify: Notify,
    closed: AtomicBool,
}

/// Topics are append-only logs; every subscriber reads a topic from the start.
///
/// A subscription ends once its topic is [closed](MemoryTransport::close)
/// and fully read.
#[derive(Default)]
pub struct MemoryTransport {
    topics: Mutex<HashMap<String, Arc<TopicLog>>>,
    subscriptions: AtomicUsize,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    async fn log(&self, topic: &str) -> Arc<TopicLog> {
        self.topics
            .lock()
            .await
            .entry(topic.to_string())
            .or_default()
            .clone()
    }

    /// Snapshot of everything published to `topic`.
    pub async fn records(&self, topic: &str) -> Vec<StreamRecord> {
        self.log(topic).await.records.read().await.clone()
    }

    /// Mark `topic` finished; subscribers end after the last record.
    pub async fn close(&self, topic: &str) {
        let log = self.log(topic).await;
        log.closed.store(true, Ordering::SeqCst);
        log.notify.notify_waiters();
    }

    /// Number of subscriptions opened so far.
    pub fn subscriptions(&self) -> usize {
        self.subscriptions.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StreamTransport for MemoryTransport {
    async fn subscribe(&self, topic: &str) -> Result<RecordStream> {
        let log = self.log(topic).await;
        self.subscriptions.fetch_add(1, Ordering::SeqCst);

        let records = stream::unfold((log, 0usize), |(log, next)| async move {
            loop {
                // Registered before reading so a concurrent publish is not missed.
                let notified = log.notify.notified();
                let record = log.records.read().await.get(next).cloned();
                if let Some(record) = record {
                    drop(notified);
                    return Some((Ok(record), (log, next + 1)));
                }
                if log.closed.load(Ordering::SeqCst) {
                    return None;
                }
                notified.await;
            }
        });
        Ok(Box::pin(records))
    }

    async fn publish(&self, topic: &str, record: StreamRecord) -> Result<()> {
        let log = self.log(topic).await;
        log.records.write().await.push(record);
        log.notify.notify_waiters();
        Ok(())
    }
}
