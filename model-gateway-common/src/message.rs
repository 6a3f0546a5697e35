//! Canonical request/response messages shared by every transport.
//!
//! The JSON shape follows the prediction message format used by REST clients:
//!
//! ```json
//! {"meta": {"puid": "..."}, "data": {"names": ["a", "b"], "ndarray": [[1, 2]]}}
//! ```
//!
//! A message carries exactly one primary payload: `data`, `binData`, `strData`
//! or `jsonData`. Requests reject anything else at parse time; responses may
//! omit the payload (acknowledgements, status-only replies).

use std::collections::BTreeMap;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Errors raised while building or parsing canonical messages.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MessageError {
    #[error("message has no payload (expected one of data, binData, strData, jsonData)")]
    MissingPayload,

    #[error("message has more than one payload: {0}")]
    AmbiguousPayload(String),

    #[error("data must contain exactly one of tensor or ndarray")]
    AmbiguousData,

    #[error("tensor shape {shape:?} does not match {len} values")]
    ShapeMismatch { shape: Vec<usize>, len: usize },

    #[error("tensor shape {0:?} has too many elements")]
    ShapeOverflow(Vec<usize>),

    #[error("ndarray must be a JSON array")]
    NotAnArray,

    #[error("non-numeric value in ndarray: {0}")]
    NonNumeric(String),

    #[error("binData is not valid base64: {0}")]
    InvalidBase64(String),
}

/// Dense tensor with an explicit shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tensor {
    pub shape: Vec<usize>,
    pub values: Vec<f64>,
}

impl Tensor {
    pub fn new(shape: Vec<usize>, values: Vec<f64>) -> Result<Self, MessageError> {
        let expected = shape
            .iter()
            .try_fold(1usize, |acc, dim| acc.checked_mul(*dim));
        let Some(expected) = expected else {
            return Err(MessageError::ShapeOverflow(shape));
        };
        if expected != values.len() {
            return Err(MessageError::ShapeMismatch {
                shape,
                len: values.len(),
            });
        }
        Ok(Self { shape, values })
    }
}

/// Numeric content of a `data` payload.
#[derive(Debug, Clone, PartialEq)]
pub enum DataValues {
    Tensor(Tensor),
    /// Nested JSON array of arbitrary depth.
    Ndarray(Value),
}

impl DataValues {
    /// Flatten the values in row-major order.
    pub fn flatten(&self) -> Result<Vec<f64>, MessageError> {
        match self {
            DataValues::Tensor(tensor) => Ok(tensor.values.clone()),
            DataValues::Ndarray(value) => {
                let mut out = Vec::new();
                flatten_into(value, &mut out)?;
                Ok(out)
            }
        }
    }
}

fn flatten_into(value: &Value, out: &mut Vec<f64>) -> Result<(), MessageError> {
    match value {
        Value::Array(items) => {
            for item in items {
                flatten_into(item, out)?;
            }
            Ok(())
        }
        Value::Number(n) => {
            let v = n
                .as_f64()
                .ok_or_else(|| MessageError::NonNumeric(n.to_string()))?;
            out.push(v);
            Ok(())
        }
        other => Err(MessageError::NonNumeric(other.to_string())),
    }
}

/// The `data` payload: optional column names plus tensor or ndarray values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "DefaultDataRepr", into = "DefaultDataRepr")]
pub struct DefaultData {
    pub names: Vec<String>,
    pub values: DataValues,
}

impl DefaultData {
    pub fn ndarray(value: Value) -> Result<Self, MessageError> {
        if !value.is_array() {
            return Err(MessageError::NotAnArray);
        }
        Ok(Self {
            names: vec![],
            values: DataValues::Ndarray(value),
        })
    }

    pub fn tensor(tensor: Tensor) -> Self {
        Self {
            names: vec![],
            values: DataValues::Tensor(tensor),
        }
    }

    pub fn with_names(mut self, names: Vec<String>) -> Self {
        self.names = names;
        self
    }
}

#[derive(Serialize, Deserialize)]
struct DefaultDataRepr {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    names: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tensor: Option<Tensor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    ndarray: Option<Value>,
}

impl TryFrom<DefaultDataRepr> for DefaultData {
    type Error = MessageError;

    fn try_from(repr: DefaultDataRepr) -> Result<Self, Self::Error> {
        let values = match (repr.tensor, repr.ndarray) {
            (Some(tensor), None) => {
                DataValues::Tensor(Tensor::new(tensor.shape, tensor.values)?)
            }
            (None, Some(value)) if value.is_array() => DataValues::Ndarray(value),
            (None, Some(_)) => return Err(MessageError::NotAnArray),
            _ => return Err(MessageError::AmbiguousData),
        };
        Ok(Self {
            names: repr.names,
            values,
        })
    }
}

impl From<DefaultData> for DefaultDataRepr {
    fn from(data: DefaultData) -> Self {
        let (tensor, ndarray) = match data.values {
            DataValues::Tensor(t) => (Some(t), None),
            DataValues::Ndarray(v) => (None, Some(v)),
        };
        Self {
            names: data.names,
            tensor,
            ndarray,
        }
    }
}

/// Primary payload of a canonical message.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Data(DefaultData),
    BinData(Vec<u8>),
    StrData(String),
    JsonData(Value),
}

impl Payload {
    /// Wire name of the payload key.
    pub fn kind(&self) -> &'static str {
        match self {
            Payload::Data(_) => "data",
            Payload::BinData(_) => "binData",
            Payload::StrData(_) => "strData",
            Payload::JsonData(_) => "jsonData",
        }
    }
}

/// Whether a status reports success or failure.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StatusFlag {
    #[default]
    Success,
    Failure,
}

/// Structured status carried inside a response.
///
/// When `code` is set, the REST binding uses it as the HTTP status code.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Status {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<i32>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub info: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub reason: String,
    #[serde(default)]
    pub status: StatusFlag,
}

impl Status {
    pub fn ok() -> Self {
        Self {
            code: Some(200),
            info: "OK".to_string(),
            reason: String::new(),
            status: StatusFlag::Success,
        }
    }

    pub fn failure(code: i32, reason: impl Into<String>) -> Self {
        Self {
            code: Some(code),
            info: String::new(),
            reason: reason.into(),
            status: StatusFlag::Failure,
        }
    }
}

/// Message metadata propagated through a prediction graph.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Meta {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub puid: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tags: BTreeMap<String, Value>,
    /// Routing decisions keyed by predictive unit id.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub routing: BTreeMap<String, i32>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub request_path: BTreeMap<String, String>,
}

impl Meta {
    pub fn is_empty(&self) -> bool {
        self.puid.is_empty()
            && self.tags.is_empty()
            && self.routing.is_empty()
            && self.request_path.is_empty()
    }
}

/// Canonical request: exactly one payload plus metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "MessageRepr", into = "MessageRepr")]
pub struct Request {
    pub payload: Payload,
    pub meta: Meta,
}

impl Request {
    pub fn new(payload: Payload) -> Self {
        Self {
            payload,
            meta: Meta::default(),
        }
    }

    pub fn with_meta(mut self, meta: Meta) -> Self {
        self.meta = meta;
        self
    }
}

/// Canonical response: optional payload, metadata and an optional status.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "MessageRepr", into = "MessageRepr")]
pub struct Response {
    pub payload: Option<Payload>,
    pub meta: Meta,
    pub status: Option<Status>,
}

impl Response {
    pub fn new(payload: Payload) -> Self {
        Self {
            payload: Some(payload),
            ..Self::default()
        }
    }

    /// A response carrying nothing but (empty) metadata.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_status(mut self, status: Status) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_meta(mut self, meta: Meta) -> Self {
        self.meta = meta;
        self
    }
}

impl From<Request> for Response {
    fn from(request: Request) -> Self {
        Self {
            payload: Some(request.payload),
            meta: request.meta,
            status: None,
        }
    }
}

/// A batch of requests, the input of `aggregate`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MessageList {
    #[serde(rename = "seldonMessages", default)]
    pub messages: Vec<Request>,
}

/// Self-description a model may expose through the `metadata` operation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub versions: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inputs: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outputs: Option<Value>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub custom: BTreeMap<String, Value>,
}

/// Wire representation shared by requests and responses.
#[derive(Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MessageRepr {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    status: Option<Status>,
    #[serde(default, skip_serializing_if = "Meta::is_empty")]
    meta: Meta,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    data: Option<DefaultData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    bin_data: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    str_data: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    json_data: Option<Value>,
}

impl MessageRepr {
    fn take_payload(&mut self) -> Result<Option<Payload>, MessageError> {
        let mut found = Vec::new();
        if let Some(data) = self.data.take() {
            found.push(Payload::Data(data));
        }
        if let Some(encoded) = self.bin_data.take() {
            let bytes = BASE64
                .decode(encoded.as_bytes())
                .map_err(|e| MessageError::InvalidBase64(e.to_string()))?;
            found.push(Payload::BinData(bytes));
        }
        if let Some(text) = self.str_data.take() {
            found.push(Payload::StrData(text));
        }
        if let Some(json) = self.json_data.take() {
            found.push(Payload::JsonData(json));
        }

        if found.len() > 1 {
            let kinds: Vec<&str> = found.iter().map(Payload::kind).collect();
            return Err(MessageError::AmbiguousPayload(kinds.join(", ")));
        }
        Ok(found.pop())
    }

    fn with_payload(mut self, payload: Option<Payload>) -> Self {
        match payload {
            Some(Payload::Data(data)) => self.data = Some(data),
            Some(Payload::BinData(bytes)) => self.bin_data = Some(BASE64.encode(bytes)),
            Some(Payload::StrData(text)) => self.str_data = Some(text),
            Some(Payload::JsonData(json)) => self.json_data = Some(json),
            None => {}
        }
        self
    }
}

impl TryFrom<MessageRepr> for Request {
    type Error = MessageError;

    fn try_from(mut repr: MessageRepr) -> Result<Self, Self::Error> {
        let payload = repr.take_payload()?.ok_or(MessageError::MissingPayload)?;
        Ok(Self {
            payload,
            meta: repr.meta,
        })
    }
}

impl From<Request> for MessageRepr {
    fn from(request: Request) -> Self {
        MessageRepr {
            meta: request.meta,
            ..MessageRepr::default()
        }
        .with_payload(Some(request.payload))
    }
}

impl TryFrom<MessageRepr> for Response {
    type Error = MessageError;

    fn try_from(mut repr: MessageRepr) -> Result<Self, Self::Error> {
        let payload = repr.take_payload()?;
        Ok(Self {
            payload,
            meta: repr.meta,
            status: repr.status,
        })
    }
}

impl From<Response> for MessageRepr {
    fn from(response: Response) -> Self {
        MessageRepr {
            status: response.status,
            meta: response.meta,
            ..MessageRepr::default()
        }
        .with_payload(response.payload)
    }
}
