//! REST route table.

use axum::routing::MethodFilter;
use model_gateway_common::Operation;

/// HTTP verbs a route accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verb {
    Get,
    Post,
}

impl Verb {
    pub fn filter(self) -> MethodFilter {
        match self {
            Verb::Get => MethodFilter::GET,
            Verb::Post => MethodFilter::POST,
        }
    }
}

/// One REST endpoint bound to a gateway operation.
#[derive(Debug, Clone, Copy)]
pub struct RouteSpec {
    pub verbs: &'static [Verb],
    pub path: &'static str,
    pub operation: Operation,
}

impl RouteSpec {
    /// Union of the accepted verbs.
    pub fn method_filter(&self) -> Option<MethodFilter> {
        self.verbs
            .iter()
            .map(|verb| verb.filter())
            .reduce(|acc, filter| acc.or(filter))
    }
}

const GET_POST: &[Verb] = &[Verb::Get, Verb::Post];
const POST: &[Verb] = &[Verb::Post];
const GET: &[Verb] = &[Verb::Get];

const fn route(verbs: &'static [Verb], path: &'static str, operation: Operation) -> RouteSpec {
    RouteSpec {
        verbs,
        path,
        operation,
    }
}

/// Every dispatching endpoint; `/health/ping` and `/seldon.json` are served separately.
pub const ROUTES: &[RouteSpec] = &[
    route(GET_POST, "/predict", Operation::Predict),
    route(POST, "/api/v0.1/predictions", Operation::Predict),
    route(POST, "/api/v1.0/predictions", Operation::Predict),
    route(GET_POST, "/send-feedback", Operation::SendFeedback),
    route(POST, "/api/v0.1/feedback", Operation::SendFeedback),
    route(POST, "/api/v1.0/feedback", Operation::SendFeedback),
    route(GET_POST, "/transform-input", Operation::TransformInput),
    route(GET_POST, "/transform-output", Operation::TransformOutput),
    route(GET_POST, "/route", Operation::Route),
    route(GET_POST, "/aggregate", Operation::Aggregate),
    route(GET, "/health/status", Operation::Health),
    route(GET, "/metadata", Operation::Metadata),
];
