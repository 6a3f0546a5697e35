//! Configuration for the model gateway.

use std::env;
use std::str::FromStr;

use config::{Config as ConfigLoader, ConfigError, Environment, File};
use model_gateway_common::DeploymentIdentity;
use serde::Deserialize;

use crate::error::Error;

/// Main configuration structure, built once at process start and passed
/// by reference into each binding.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub rest: RestConfig,
    #[serde(default)]
    pub rpc: RpcConfig,
    #[serde(default)]
    pub stream: StreamConfig,
    #[serde(default)]
    pub deployment: DeploymentConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// REST (HTTP/JSON) binding configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct RestConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_rest_port")]
    pub port: u16,
    /// Pretty-print JSON response bodies.
    #[serde(default)]
    pub pretty_json: bool,
    /// Static API description served at `/seldon.json`.
    #[serde(default)]
    pub openapi_path: Option<String>,
}

impl Default for RestConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            host: default_host(),
            port: default_rest_port(),
            pretty_json: false,
            openapi_path: None,
        }
    }
}

/// gRPC binding configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct RpcConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_rpc_port")]
    pub port: u16,
    /// Number of calls served concurrently; further calls wait.
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// Wrap the server in a request tracing layer.
    #[serde(default)]
    pub tracing: bool,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            host: default_host(),
            port: default_rpc_port(),
            workers: default_workers(),
            tracing: false,
        }
    }
}

/// Message-stream binding configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct StreamConfig {
    #[serde(default)]
    pub enabled: bool,
    /// Broker addresses (`host:port`).
    #[serde(default = "default_brokers")]
    pub brokers: Vec<String>,
    /// Partition consumed from the input topic and produced to on the output topic.
    #[serde(default)]
    pub partition: i32,
    /// Publish records that fail to process to the dead-letter topic.
    #[serde(default)]
    pub dead_letter: bool,
    /// Where consumption of the input topic begins.
    #[serde(default)]
    pub start_offset: StartOffset,
}

/// Input topic position the stream worker starts from.
///
/// Parsed from `earliest`, `latest` or an explicit offset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(try_from = "String")]
pub enum StartOffset {
    /// Replay everything still retained, so nothing produced while the
    /// worker was down is skipped.
    #[default]
    Earliest,
    Latest,
    At(i64),
}

impl FromStr for StartOffset {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "earliest" => Ok(StartOffset::Earliest),
            "latest" => Ok(StartOffset::Latest),
            other => other.parse::<i64>().map(StartOffset::At).map_err(|_| {
                format!(
                    "invalid start offset {:?}, expected earliest, latest or a number",
                    value
                )
            }),
        }
    }
}

impl TryFrom<String> for StartOffset {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            brokers: default_brokers(),
            partition: 0,
            dead_letter: false,
            start_offset: StartOffset::default(),
        }
    }
}

/// Deployment identity and pod metadata.
#[derive(Debug, Clone, Deserialize)]
pub struct DeploymentConfig {
    #[serde(default)]
    pub predictive_unit_id: Option<String>,
    #[serde(default)]
    pub predictor_id: Option<String>,
    #[serde(default)]
    pub deployment_id: Option<String>,
    /// Pod annotations file (`key="value"` per line).
    #[serde(default = "default_annotations_path")]
    pub annotations_path: String,
}

impl Default for DeploymentConfig {
    fn default() -> Self {
        Self {
            predictive_unit_id: None,
            predictor_id: None,
            deployment_id: None,
            annotations_path: default_annotations_path(),
        }
    }
}

impl DeploymentConfig {
    /// Predictive unit id, if set and non-empty.
    pub fn unit_id(&self) -> Option<&str> {
        non_empty(&self.predictive_unit_id)
    }

    /// Resolve the full deployment identity.
    ///
    /// Fails when any of the three values is missing or empty.
    pub fn identity(&self) -> Result<DeploymentIdentity, Error> {
        let mut missing = Vec::new();
        let unit = non_empty(&self.predictive_unit_id);
        let predictor = non_empty(&self.predictor_id);
        let deployment = non_empty(&self.deployment_id);
        if unit.is_none() {
            missing.push("predictive_unit_id");
        }
        if predictor.is_none() {
            missing.push("predictor_id");
        }
        if deployment.is_none() {
            missing.push("deployment_id");
        }

        match (unit, predictor, deployment) {
            (Some(unit), Some(predictor), Some(deployment)) => Ok(DeploymentIdentity {
                predictive_unit_id: unit.to_string(),
                predictor_id: predictor.to_string(),
                deployment_id: deployment.to_string(),
            }),
            _ => Err(Error::Configuration(format!(
                "deployment identity incomplete, missing: {}",
                missing.join(", ")
            ))),
        }
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.trim().is_empty())
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

// Default values
fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_rest_port() -> u16 {
    9000
}
fn default_rpc_port() -> u16 {
    5000
}
fn default_workers() -> usize {
    10
}
fn default_brokers() -> Vec<String> {
    vec!["localhost:9092".to_string()]
}
fn default_annotations_path() -> String {
    "/etc/podinfo/annotations".to_string()
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_true() -> bool {
    true
}

impl Config {
    /// Load configuration from file and environment variables.
    ///
    /// Configuration sources (in order of precedence):
    /// 1. Deployment variables (`PREDICTIVE_UNIT_ID`, `PREDICTOR_ID`, `SELDON_DEPLOYMENT_ID`,
    ///    `FLASK_JSONIFY_PRETTYPRINT_REGULAR`)
    /// 2. Environment variables (GATEWAY__SECTION__KEY format)
    /// 3. config.toml file (if present)
    /// 4. Built-in defaults
    pub fn load() -> Result<Self, ConfigError> {
        let pretty = env::var("FLASK_JSONIFY_PRETTYPRINT_REGULAR")
            .ok()
            .map(|v| v.eq_ignore_ascii_case("true"));

        let config = ConfigLoader::builder()
            // Set defaults
            .set_default("rest.host", default_host())?
            .set_default("rest.port", default_rest_port() as i64)?
            .set_default("rpc.port", default_rpc_port() as i64)?
            .set_default("rpc.workers", default_workers() as i64)?
            .set_default("logging.level", default_log_level())?
            // Load from config.toml if exists
            .add_source(File::with_name("config").required(false))
            // Override with environment variables (GATEWAY__SECTION__KEY format)
            .add_source(
                Environment::with_prefix("GATEWAY")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("stream.brokers")
                    .try_parsing(true),
            )
            .set_override_option(
                "deployment.predictive_unit_id",
                env::var("PREDICTIVE_UNIT_ID").ok(),
            )?
            .set_override_option("deployment.predictor_id", env::var("PREDICTOR_ID").ok())?
            .set_override_option(
                "deployment.deployment_id",
                env::var("SELDON_DEPLOYMENT_ID").ok(),
            )?
            .set_override_option("rest.pretty_json", pretty)?
            .build()?;

        config.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_rest_config() {
        let rest = RestConfig::default();
        assert!(rest.enabled);
        assert_eq!(rest.host, "0.0.0.0");
        assert_eq!(rest.port, 9000);
        assert!(!rest.pretty_json);
    }

    #[test]
    fn test_default_rpc_config() {
        let rpc = RpcConfig::default();
        assert_eq!(rpc.port, 5000);
        assert_eq!(rpc.workers, 10);
        assert!(!rpc.tracing);
    }

    #[test]
    fn test_stream_disabled_by_default() {
        let stream = StreamConfig::default();
        assert!(!stream.enabled);
        assert_eq!(stream.brokers, vec!["localhost:9092"]);
        assert_eq!(stream.start_offset, StartOffset::Earliest);
    }

    #[test]
    fn test_start_offset_parsing() {
        assert_eq!("latest".parse(), Ok(StartOffset::Latest));
        assert_eq!(" Earliest ".parse(), Ok(StartOffset::Earliest));
        assert_eq!("42".parse(), Ok(StartOffset::At(42)));
        assert!("soon".parse::<StartOffset>().is_err());
    }

    #[test]
    fn test_start_offset_from_source() {
        let config: Config = ConfigLoader::builder()
            .set_override("stream.start_offset", "latest")
            .unwrap()
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();
        assert_eq!(config.stream.start_offset, StartOffset::Latest);
    }

    #[test]
    fn test_identity_complete() {
        let deployment = DeploymentConfig {
            predictive_unit_id: Some("unit".into()),
            predictor_id: Some("pred".into()),
            deployment_id: Some("dep".into()),
            ..DeploymentConfig::default()
        };
        let identity = deployment.identity().unwrap();
        assert_eq!(identity.topic_prefix(), "dep-unit");
    }

    #[test]
    fn test_identity_reports_missing_values() {
        let deployment = DeploymentConfig {
            predictive_unit_id: Some("unit".into()),
            predictor_id: Some("   ".into()),
            ..DeploymentConfig::default()
        };
        let err = deployment.identity().unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("predictor_id"));
        assert!(msg.contains("deployment_id"));
        assert!(!msg.contains("predictive_unit_id"));
    }

    #[test]
    fn test_deserialize_partial_toml_like_source() {
        let config: Config = ConfigLoader::builder()
            .set_override("rpc.workers", 2)
            .unwrap()
            .set_override("stream.enabled", true)
            .unwrap()
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();
        assert_eq!(config.rpc.workers, 2);
        assert!(config.stream.enabled);
        assert_eq!(config.rest.port, 9000);
    }
}
