//! Integration tests for the stream binding over the in-memory transport.

use std::sync::Arc;

use model_gateway::config::StreamConfig;
use model_gateway::stream::{MemoryTransport, StreamRecord, StreamTransport, StreamWorker};
use model_gateway::test_util::{dispatcher_for, test_deployment, EchoModel, RejectingModel};
use model_gateway::{Error, Model};
use model_gateway_common::{DeadLetter, FailureStage, Response};
use serde_json::json;

const INPUT: &str = "iris-classifier-predict-input";
const OUTPUT: &str = "iris-classifier-predict-output";
const DEAD_LETTER: &str = "iris-classifier-predict-deadletter";

/// Publish `records`, close the input and run the worker to completion.
async fn run_worker(
    model: impl Model,
    config: StreamConfig,
    records: Vec<StreamRecord>,
) -> Arc<MemoryTransport> {
    let transport = Arc::new(MemoryTransport::new());
    for record in records {
        transport.publish(INPUT, record).await.unwrap();
    }
    transport.close(INPUT).await;

    let worker = StreamWorker::new(
        &test_deployment(),
        &config,
        dispatcher_for(model),
        transport.clone(),
    )
    .unwrap();
    worker.run().await.unwrap();
    transport
}

fn request(text: &str) -> Vec<u8> {
    serde_json::to_vec(&json!({ "strData": text })).unwrap()
}

#[tokio::test]
async fn test_output_is_keyed_like_input() {
    let transport = run_worker(
        EchoModel,
        StreamConfig::default(),
        vec![StreamRecord::keyed("k1", request("hello"))],
    )
    .await;

    let outputs = transport.records(OUTPUT).await;
    assert_eq!(outputs.len(), 1);
    assert_eq!(outputs[0].key.as_deref(), Some(&b"k1"[..]));
    let response: Response = serde_json::from_slice(&outputs[0].value).unwrap();
    assert_eq!(
        serde_json::to_value(&response).unwrap(),
        json!({"strData": "hello"})
    );
}

#[tokio::test]
async fn test_per_key_order_is_preserved() {
    let records = (0..10)
        .map(|i| {
            let key = if i % 2 == 0 { "even" } else { "odd" };
            StreamRecord::keyed(key, request(&i.to_string()))
        })
        .collect();
    let transport = run_worker(EchoModel, StreamConfig::default(), records).await;

    let outputs = transport.records(OUTPUT).await;
    assert_eq!(outputs.len(), 10);
    let texts: Vec<String> = outputs
        .iter()
        .filter(|r| r.key.as_deref() == Some(&b"even"[..]))
        .map(|r| {
            let value: serde_json::Value = serde_json::from_slice(&r.value).unwrap();
            value["strData"].as_str().unwrap().to_string()
        })
        .collect();
    assert_eq!(texts, vec!["0", "2", "4", "6", "8"]);
}

#[tokio::test]
async fn test_bad_record_goes_to_dead_letter_and_loop_continues() {
    let config = StreamConfig {
        dead_letter: true,
        ..StreamConfig::default()
    };
    let records = vec![
        StreamRecord::keyed("bad", "not json"),
        StreamRecord::keyed("good", request("fine")),
    ];
    let transport = run_worker(EchoModel, config, records).await;

    let outputs = transport.records(OUTPUT).await;
    assert_eq!(outputs.len(), 1);
    assert_eq!(outputs[0].key.as_deref(), Some(&b"good"[..]));

    let dead = transport.records(DEAD_LETTER).await;
    assert_eq!(dead.len(), 1);
    let letter: DeadLetter = serde_json::from_slice(&dead[0].value).unwrap();
    assert_eq!(letter.stage, FailureStage::Decode);
    assert_eq!(letter.value, "not json");
}

#[tokio::test]
async fn test_oversized_tensor_shape_does_not_stop_the_worker() {
    let config = StreamConfig {
        dead_letter: true,
        ..StreamConfig::default()
    };
    let oversized = json!({
        "data": {"tensor": {"shape": [4294967296u64, 4294967296u64], "values": []}}
    });
    let records = vec![
        StreamRecord::keyed("huge", serde_json::to_vec(&oversized).unwrap()),
        StreamRecord::keyed("ok", request("ok")),
    ];
    let transport = run_worker(EchoModel, config, records).await;

    let outputs = transport.records(OUTPUT).await;
    assert_eq!(outputs.len(), 1);
    assert_eq!(outputs[0].key.as_deref(), Some(&b"ok"[..]));

    let dead = transport.records(DEAD_LETTER).await;
    assert_eq!(dead.len(), 1);
    let letter: DeadLetter = serde_json::from_slice(&dead[0].value).unwrap();
    assert_eq!(letter.stage, FailureStage::Decode);
    assert!(letter.error.contains("too many elements"));
}

#[tokio::test]
async fn test_dispatch_failure_records_status() {
    let config = StreamConfig {
        dead_letter: true,
        ..StreamConfig::default()
    };
    let transport = run_worker(
        RejectingModel::new(422, "unprocessable"),
        config,
        vec![StreamRecord::keyed("k", request("x"))],
    )
    .await;

    assert!(transport.records(OUTPUT).await.is_empty());
    let dead = transport.records(DEAD_LETTER).await;
    let letter: DeadLetter = serde_json::from_slice(&dead[0].value).unwrap();
    assert_eq!(letter.stage, FailureStage::Dispatch);
    assert_eq!(letter.status, Some(422));
}

#[tokio::test]
async fn test_failures_are_dropped_without_dead_letter() {
    let transport = run_worker(
        EchoModel,
        StreamConfig::default(),
        vec![StreamRecord::keyed("bad", "{}")],
    )
    .await;
    assert!(transport.records(OUTPUT).await.is_empty());
    assert!(transport.records(DEAD_LETTER).await.is_empty());
}

#[tokio::test]
async fn test_incomplete_identity_never_subscribes() {
    let transport = Arc::new(MemoryTransport::new());
    let mut deployment = test_deployment();
    deployment.predictive_unit_id = Some(String::new());

    let result = StreamWorker::new(
        &deployment,
        &StreamConfig::default(),
        dispatcher_for(EchoModel),
        transport.clone(),
    );
    assert!(matches!(result, Err(Error::Configuration(_))));
    assert_eq!(transport.subscriptions(), 0);
}
