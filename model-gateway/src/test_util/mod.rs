//! Models and helpers for exercising the gateway in tests.

pub mod models;

pub use models::{
    CustomErrorModel, EchoModel, FullModel, NullModel, RejectingModel, SlowModel, StatusModel,
};

use std::sync::Arc;

use model_gateway_common::{DefaultData, Payload, Request};
use serde_json::Value;

use crate::config::{
    Config, DeploymentConfig, LoggingConfig, RestConfig, RpcConfig, StreamConfig,
};
use crate::dispatch::Dispatcher;
use crate::model::{Model, ModelHandle};

/// Request carrying `value` as an ndarray.
///
/// Panics if `value` is not a JSON array.
pub fn data_request(value: Value) -> Request {
    let data = DefaultData::ndarray(value).expect("ndarray must be an array");
    Request::new(Payload::Data(data))
}

pub fn dispatcher_for(model: impl Model) -> Dispatcher {
    Dispatcher::new(Arc::new(ModelHandle::new(Arc::new(model))))
}

pub fn test_deployment() -> DeploymentConfig {
    DeploymentConfig {
        predictive_unit_id: Some("classifier".to_string()),
        predictor_id: Some("default".to_string()),
        deployment_id: Some("iris".to_string()),
        annotations_path: "/nonexistent/annotations".to_string(),
    }
}

pub fn test_config() -> Config {
    Config {
        rest: RestConfig {
            host: "127.0.0.1".to_string(),
            ..RestConfig::default()
        },
        rpc: RpcConfig {
            host: "127.0.0.1".to_string(),
            ..RpcConfig::default()
        },
        stream: StreamConfig::default(),
        deployment: test_deployment(),
        logging: LoggingConfig {
            level: "debug".to_string(),
        },
    }
}
