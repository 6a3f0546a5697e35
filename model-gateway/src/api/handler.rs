//! Generic REST handler: parse, dispatch, serialize.

use std::collections::HashMap;
use std::sync::Arc;

use axum::body::{Body, Bytes};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use model_gateway_common::{Feedback, MessageList, Operation, Request};
use serde::Serialize;

use crate::dispatch::{Invocation, Outcome};
use crate::error::{Error, Result};
use crate::state::AppState;

/// Serve one call to `operation`.
pub async fn invoke(
    state: Arc<AppState>,
    operation: Operation,
    params: HashMap<String, String>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let result = match parse_invocation(operation, &params, &headers, &body) {
        Ok(invocation) => state.dispatcher.dispatch(operation, invocation).await,
        Err(e) => Err(e),
    };

    match result {
        Ok(outcome) => render_outcome(&state, operation, &outcome),
        Err(e) => render_error(&state, operation, e),
    }
}

fn is_form(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(';').next())
        .is_some_and(|mime| {
            mime.trim()
                .eq_ignore_ascii_case("application/x-www-form-urlencoded")
        })
}

/// Build the canonical invocation.
///
/// The payload is the `json` field of a form-encoded body, else the `json`
/// query parameter, else the raw body.
fn parse_invocation(
    operation: Operation,
    params: &HashMap<String, String>,
    headers: &HeaderMap,
    body: &[u8],
) -> Result<Invocation> {
    if !operation.takes_payload() {
        return Ok(Invocation::Empty);
    }

    let form_body = is_form(headers);
    let form = if form_body {
        serde_urlencoded::from_bytes::<HashMap<String, String>>(body)
            .map_err(|e| Error::InvalidRequest(format!("Malformed form body: {}", e)))?
    } else {
        HashMap::new()
    };

    let raw: &[u8] = match form.get("json").or_else(|| params.get("json")) {
        Some(json) => json.as_bytes(),
        None if !body.is_empty() && !form_body => body,
        None => return Err(Error::InvalidRequest("Can't find JSON in data".to_string())),
    };

    let invocation = match operation {
        Operation::Aggregate => {
            let list: MessageList = serde_json::from_slice(raw)?;
            Invocation::Batch(list.messages)
        }
        Operation::SendFeedback => Invocation::Feedback(serde_json::from_slice::<Feedback>(raw)?),
        _ => Invocation::Message(serde_json::from_slice::<Request>(raw)?),
    };
    Ok(invocation)
}

fn render_outcome(state: &AppState, operation: Operation, outcome: &Outcome) -> Response {
    let status = match outcome.status_code() {
        None => StatusCode::OK,
        Some(code) => match u16::try_from(code).ok().and_then(|c| StatusCode::from_u16(c).ok()) {
            Some(status) => status,
            None => {
                tracing::error!(
                    operation = %operation,
                    code,
                    "Model returned an invalid status code"
                );
                StatusCode::INTERNAL_SERVER_ERROR
            }
        },
    };

    match json_response(status, outcome, state.config.rest.pretty_json) {
        Ok(response) => response,
        Err(e) => e.into_response(),
    }
}

fn render_error(state: &AppState, operation: Operation, error: Error) -> Response {
    match &error {
        Error::Application(app) => {
            tracing::error!(
                operation = %operation,
                status = app.status,
                detail = %app.detail_value(),
                "Application error"
            );
        }
        e if e.status_code().is_server_error() => {
            tracing::error!(operation = %operation, error = %e, "Call failed");
        }
        e => tracing::warn!(operation = %operation, error = %e, "Call rejected"),
    }

    let custom = state
        .dispatcher
        .handle()
        .error_handler()
        .and_then(|handler| handler.render_error(&error));
    if let Some((code, body)) = custom {
        let status = StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        return match json_response(status, &body, state.config.rest.pretty_json) {
            Ok(response) => response,
            Err(e) => e.into_response(),
        };
    }

    error.into_response()
}

fn json_response<T: Serialize>(status: StatusCode, body: &T, pretty: bool) -> Result<Response> {
    let bytes = if pretty {
        serde_json::to_vec_pretty(body)?
    } else {
        serde_json::to_vec(body)?
    };

    Ok((
        status,
        [(header::CONTENT_TYPE, "application/json")],
        Body::from(bytes),
    )
        .into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn parse(operation: Operation, body: &[u8]) -> Result<Invocation> {
        parse_invocation(operation, &HashMap::new(), &HeaderMap::new(), body)
    }

    fn form_headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            "application/x-www-form-urlencoded; charset=utf-8".parse().unwrap(),
        );
        headers
    }

    fn message(invocation: Invocation) -> Value {
        let Invocation::Message(request) = invocation else {
            panic!("expected single message");
        };
        serde_json::to_value(&request).unwrap()
    }

    fn query_params() -> HashMap<String, String> {
        let mut params = HashMap::new();
        params.insert("json".to_string(), r#"{"strData": "query"}"#.to_string());
        params
    }

    #[test]
    fn test_query_parameter_wins_over_body() {
        let body = br#"{"strData": "body"}"#;
        let invocation =
            parse_invocation(Operation::Predict, &query_params(), &HeaderMap::new(), body).unwrap();
        assert_eq!(message(invocation), json!({"strData": "query"}));
    }

    #[test]
    fn test_form_field_wins_over_query_parameter() {
        let body = b"json=%7B%22strData%22%3A%22form%22%7D";
        let invocation =
            parse_invocation(Operation::Predict, &query_params(), &form_headers(), body).unwrap();
        assert_eq!(message(invocation), json!({"strData": "form"}));
    }

    #[test]
    fn test_form_without_json_field_falls_back_to_query() {
        let invocation =
            parse_invocation(Operation::Predict, &query_params(), &form_headers(), b"other=1")
                .unwrap();
        assert_eq!(message(invocation), json!({"strData": "query"}));

        let err =
            parse_invocation(Operation::Predict, &HashMap::new(), &form_headers(), b"other=1")
                .unwrap_err();
        assert!(matches!(err, Error::InvalidRequest(msg) if msg.contains("Can't find JSON")));
    }

    #[test]
    fn test_missing_payload_is_invalid() {
        let err = parse(Operation::Route, b"").unwrap_err();
        assert!(matches!(err, Error::InvalidRequest(msg) if msg.contains("Can't find JSON")));
    }

    #[test]
    fn test_health_needs_no_payload() {
        let invocation = parse(Operation::Health, b"").unwrap();
        assert!(matches!(invocation, Invocation::Empty));
    }

    #[test]
    fn test_aggregate_parses_message_list() {
        let body = br#"{"seldonMessages": [{"strData": "a"}, {"strData": "b"}]}"#;
        let invocation = parse(Operation::Aggregate, body).unwrap();
        assert!(matches!(invocation, Invocation::Batch(reqs) if reqs.len() == 2));
    }

    #[test]
    fn test_two_payloads_are_rejected() {
        let body = br#"{"strData": "a", "binData": "YQ=="}"#;
        let err = parse(Operation::Predict, body).unwrap_err();
        assert!(matches!(err, Error::Serialization(_)));
    }

    #[test]
    fn test_pretty_rendering() {
        let response = json_response(StatusCode::OK, &json!({"a": 1}), true).unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "application/json"
        );
    }

    #[test]
    fn test_value_is_serializable_body() {
        let body: Value = json!([1, 2]);
        assert!(json_response(StatusCode::CREATED, &body, false).is_ok());
    }
}
