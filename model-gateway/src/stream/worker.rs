//! Predict loop over the stream transport.

use std::sync::Arc;

use bytes::Bytes;
use futures_util::StreamExt;
use model_gateway_common::{DeadLetter, FailureStage, PredictTopics, Request};

use super::{StreamRecord, StreamTransport};
use crate::config::{DeploymentConfig, StreamConfig};
use crate::dispatch::Dispatcher;
use crate::error::{Error, Result};

/// Why a single record could not be answered.
struct Failure {
    stage: FailureStage,
    error: Error,
}

impl Failure {
    fn at(stage: FailureStage) -> impl FnOnce(Error) -> Self {
        move |error| Self { stage, error }
    }
}

/// Consumes the predict input topic sequentially, preserving per-key order.
pub struct StreamWorker {
    topics: PredictTopics,
    dispatcher: Dispatcher,
    transport: Arc<dyn StreamTransport>,
    dead_letter: bool,
}

impl StreamWorker {
    /// Fails with a configuration error, before touching the transport, when
    /// the deployment identity is incomplete.
    pub fn new(
        deployment: &DeploymentConfig,
        config: &StreamConfig,
        dispatcher: Dispatcher,
        transport: Arc<dyn StreamTransport>,
    ) -> Result<Self> {
        let identity = deployment.identity()?;
        Ok(Self {
            topics: PredictTopics::for_identity(&identity),
            dispatcher,
            transport,
            dead_letter: config.dead_letter,
        })
    }

    pub fn topics(&self) -> &PredictTopics {
        &self.topics
    }

    /// Run until the input subscription ends or the transport fails.
    pub async fn run(&self) -> Result<()> {
        let mut records = self.transport.subscribe(&self.topics.input).await?;
        tracing::info!(
            input = %self.topics.input,
            output = %self.topics.output,
            dead_letter = self.dead_letter,
            "Stream worker started"
        );

        while let Some(record) = records.next().await {
            let record = record?;
            match self.process(&record.value).await {
                Ok(value) => {
                    let reply = StreamRecord::new(record.key.clone(), value);
                    self.transport.publish(&self.topics.output, reply).await?;
                }
                Err(failure) => self.reject(&record, failure).await?,
            }
        }

        tracing::info!(input = %self.topics.input, "Input stream ended");
        Ok(())
    }

    async fn process(&self, value: &[u8]) -> std::result::Result<Bytes, Failure> {
        let request: Request = serde_json::from_slice(value)
            .map_err(Error::from)
            .map_err(Failure::at(FailureStage::Decode))?;
        tracing::debug!(payload = request.payload.kind(), "Stream request");

        let response = self
            .dispatcher
            .predict(&request)
            .await
            .map_err(Failure::at(FailureStage::Dispatch))?;

        serde_json::to_vec(&response)
            .map(Bytes::from)
            .map_err(Error::from)
            .map_err(Failure::at(FailureStage::Encode))
    }

    /// Log a failed record and, if enabled, park it on the dead-letter topic.
    async fn reject(&self, record: &StreamRecord, failure: Failure) -> Result<()> {
        tracing::error!(stage = ?failure.stage, error = %failure.error, "Stream record failed");
        if !self.dead_letter {
            return Ok(());
        }

        let mut letter = DeadLetter::new(failure.stage, failure.error.to_string(), &record.value);
        if let Error::Application(app) = &failure.error {
            letter = letter.with_status(app.status);
        }
        let value = serde_json::to_vec(&letter)?;
        self.transport
            .publish(
                &self.topics.dead_letter,
                StreamRecord::new(record.key.clone(), value),
            )
            .await
    }
}
