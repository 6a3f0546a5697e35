//! Generates the gRPC services without protoc; messages travel as JSON.

const REQUEST: &str = "model_gateway_common::Request";
const RESPONSE: &str = "model_gateway_common::Response";
const FEEDBACK: &str = "model_gateway_common::Feedback";
const MESSAGE_LIST: &str = "model_gateway_common::MessageList";
const METADATA: &str = "model_gateway_common::ModelMetadata";
const EMPTY: &str = "crate::rpc::Empty";

/// `(method name, route name, input type, output type)`
type MethodDef = (&'static str, &'static str, &'static str, &'static str);

const PREDICT: MethodDef = ("predict", "Predict", REQUEST, RESPONSE);
const SEND_FEEDBACK: MethodDef = ("send_feedback", "SendFeedback", FEEDBACK, RESPONSE);
const TRANSFORM_INPUT: MethodDef = ("transform_input", "TransformInput", REQUEST, RESPONSE);
const TRANSFORM_OUTPUT: MethodDef = ("transform_output", "TransformOutput", REQUEST, RESPONSE);
const ROUTE: MethodDef = ("route", "Route", REQUEST, RESPONSE);
const AGGREGATE: MethodDef = ("aggregate", "Aggregate", MESSAGE_LIST, RESPONSE);
const MODEL_METADATA: MethodDef = ("metadata", "Metadata", EMPTY, METADATA);
const HEALTH: MethodDef = ("health", "Health", EMPTY, RESPONSE);

/// Every service is served by the same implementation; role services expose
/// only the calls of their graph role.
const SERVICES: &[(&str, &[MethodDef])] = &[
    (
        "Generic",
        &[
            PREDICT,
            SEND_FEEDBACK,
            TRANSFORM_INPUT,
            TRANSFORM_OUTPUT,
            ROUTE,
            AGGREGATE,
            MODEL_METADATA,
            HEALTH,
        ],
    ),
    ("Model", &[PREDICT, SEND_FEEDBACK, MODEL_METADATA]),
    ("Router", &[ROUTE, SEND_FEEDBACK]),
    ("Transformer", &[TRANSFORM_INPUT]),
    ("OutputTransformer", &[TRANSFORM_OUTPUT]),
    ("Combiner", &[AGGREGATE]),
    ("Seldon", &[PREDICT, SEND_FEEDBACK]),
];

fn method(def: &MethodDef) -> tonic_build::manual::Method {
    let (name, route, input, output) = *def;
    tonic_build::manual::Method::builder()
        .name(name)
        .route_name(route)
        .input_type(input)
        .output_type(output)
        .codec_path("crate::rpc::codec::JsonCodec")
        .build()
}

fn main() {
    let services: Vec<_> = SERVICES
        .iter()
        .map(|(name, methods)| {
            methods
                .iter()
                .fold(
                    tonic_build::manual::Service::builder()
                        .name(*name)
                        .package("modelgateway.v1"),
                    |service, def| service.method(method(def)),
                )
                .build()
        })
        .collect();

    tonic_build::manual::Builder::new().compile(&services);
    println!("cargo:rerun-if-changed=build.rs");
}
