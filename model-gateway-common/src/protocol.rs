//! Stream protocol types for the message-stream binding.
//!
//! # Topic Naming
//!
//! Topics are namespaced by deployment identity:
//!
//! - `{deployment_id}-{predictive_unit_id}-predict-input`: requests consumed by the worker
//! - `{deployment_id}-{predictive_unit_id}-predict-output`: responses, keyed like their request
//! - `{deployment_id}-{predictive_unit_id}-predict-deadletter`: records that failed to process
//!
//! # Encoding
//!
//! Record values are JSON-encoded canonical messages. Record keys are opaque
//! bytes copied unchanged from input to output.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Immutable identity of the deployment a gateway process belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentIdentity {
    /// Container / predictive unit name.
    pub predictive_unit_id: String,
    /// Predictor spec name.
    pub predictor_id: String,
    /// Deployment name.
    pub deployment_id: String,
}

impl DeploymentIdentity {
    /// Prefix shared by every topic of this deployment unit.
    pub fn topic_prefix(&self) -> String {
        format!("{}-{}", self.deployment_id, self.predictive_unit_id)
    }
}

/// Names of the topics used by the predict stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PredictTopics {
    pub input: String,
    pub output: String,
    pub dead_letter: String,
}

impl PredictTopics {
    pub fn for_identity(identity: &DeploymentIdentity) -> Self {
        let prefix = identity.topic_prefix();
        Self {
            input: format!("{}-predict-input", prefix),
            output: format!("{}-predict-output", prefix),
            dead_letter: format!("{}-predict-deadletter", prefix),
        }
    }
}

/// Processing stage at which a stream record failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureStage {
    /// The record value was not a valid canonical request.
    Decode,
    /// The model or dispatcher returned an error.
    Dispatch,
    /// The response could not be encoded.
    Encode,
}

/// Envelope published to the dead-letter topic for a failed record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeadLetter {
    pub stage: FailureStage,
    pub error: String,
    /// Original value, lossily decoded as UTF-8.
    pub value: String,
    /// HTTP-style status when the failure was an application error.
    #[serde(default)]
    pub status: Option<u16>,
    pub failed_at: DateTime<Utc>,
}

impl DeadLetter {
    pub fn new(stage: FailureStage, error: impl Into<String>, value: &[u8]) -> Self {
        Self {
            stage,
            error: error.into(),
            value: String::from_utf8_lossy(value).into_owned(),
            status: None,
            failed_at: Utc::now(),
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity() -> DeploymentIdentity {
        DeploymentIdentity {
            predictive_unit_id: "classifier".to_string(),
            predictor_id: "default".to_string(),
            deployment_id: "iris".to_string(),
        }
    }

    #[test]
    fn test_topic_names() {
        let topics = PredictTopics::for_identity(&identity());
        assert_eq!(topics.input, "iris-classifier-predict-input");
        assert_eq!(topics.output, "iris-classifier-predict-output");
        assert_eq!(topics.dead_letter, "iris-classifier-predict-deadletter");
    }

    #[test]
    fn test_dead_letter_serialization() {
        let letter = DeadLetter::new(FailureStage::Decode, "bad json", b"{oops").with_status(400);
        let json = serde_json::to_string(&letter).unwrap();
        assert!(json.contains(r#""stage":"decode""#));
        assert!(json.contains(r#""value":"{oops""#));
        assert!(json.contains(r#""status":400"#));
    }
}
