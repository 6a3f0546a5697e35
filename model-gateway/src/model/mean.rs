//! Built-in reference model served by the `model-gateway` binary.

use async_trait::async_trait;
use model_gateway_common::{DataValues, DefaultData, ModelMetadata, Payload, Request, Response};
use serde_json::json;

use super::{MetadataProvider, Model, Predictor};
use crate::error::{ApplicationError, ModelError, ModelResult};

/// Predicts the mean of each input row.
///
/// Accepts a `data` payload; a 2-d ndarray yields one mean per row, anything
/// else is treated as a single row.
#[derive(Debug, Default)]
pub struct MeanModel;

impl MeanModel {
    fn row_means(values: &DataValues) -> ModelResult<Vec<f64>> {
        let rows: Vec<Vec<f64>> = match values {
            DataValues::Ndarray(serde_json::Value::Array(items))
                if items.iter().all(|item| item.is_array()) =>
            {
                items
                    .iter()
                    .map(|row| {
                        DataValues::Ndarray(row.clone())
                            .flatten()
                            .map_err(|e| ApplicationError::with_reason(400, e.to_string()))
                    })
                    .collect::<Result<_, _>>()?
            }
            other => vec![other
                .flatten()
                .map_err(|e| ApplicationError::with_reason(400, e.to_string()))?],
        };

        rows.iter()
            .map(|row| {
                if row.is_empty() {
                    Err(ModelError::from(ApplicationError::with_reason(400, "empty row")))
                } else {
                    Ok(row.iter().sum::<f64>() / row.len() as f64)
                }
            })
            .collect()
    }
}

#[async_trait]
impl Predictor for MeanModel {
    async fn predict(&self, request: &Request) -> ModelResult<Response> {
        let Payload::Data(data) = &request.payload else {
            return Err(ApplicationError::with_reason(
                400,
                format!("expected a data payload, got {}", request.payload.kind()),
            )
            .into());
        };

        let means = Self::row_means(&data.values)?;
        let ndarray = json!(means.iter().map(|m| vec![*m]).collect::<Vec<_>>());
        let data = DefaultData {
            names: vec!["mean".to_string()],
            values: DataValues::Ndarray(ndarray),
        };
        Ok(Response::new(Payload::Data(data)))
    }
}

#[async_trait]
impl MetadataProvider for MeanModel {
    async fn metadata(&self) -> ModelResult<ModelMetadata> {
        Ok(ModelMetadata {
            name: Some("mean".to_string()),
            versions: vec![env!("CARGO_PKG_VERSION").to_string()],
            platform: Some("rust".to_string()),
            ..ModelMetadata::default()
        })
    }
}

impl Model for MeanModel {
    fn name(&self) -> &str {
        "mean"
    }

    fn as_predictor(&self) -> Option<&dyn Predictor> {
        Some(self)
    }

    fn as_metadata_provider(&self) -> Option<&dyn MetadataProvider> {
        Some(self)
    }
}
