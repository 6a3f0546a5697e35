//! Capability registry for a wrapped model.

use std::sync::Arc;

use model_gateway_common::Operation;

use super::{
    Combiner, ErrorHandler, FeedbackHandler, HealthCheck, InputTransformer, MetadataProvider,
    Model, OutputTransformer, Predictor, Router,
};

/// Immutable set of operations a model implements.
#[derive(Clone, Copy, Default, PartialEq, Eq)]
pub struct CapabilitySet(u8);

impl CapabilitySet {
    /// Query every capability accessor of the model once.
    pub fn of(model: &dyn Model) -> Self {
        let mut set = Self::default();
        let capabilities = [
            (Operation::Predict, model.as_predictor().is_some()),
            (Operation::TransformInput, model.as_input_transformer().is_some()),
            (Operation::TransformOutput, model.as_output_transformer().is_some()),
            (Operation::Route, model.as_router().is_some()),
            (Operation::Aggregate, model.as_combiner().is_some()),
            (Operation::SendFeedback, model.as_feedback_handler().is_some()),
            (Operation::Health, model.as_health_check().is_some()),
            (Operation::Metadata, model.as_metadata_provider().is_some()),
        ];
        for (op, present) in capabilities {
            if present {
                set.0 |= op.bit();
            }
        }
        set
    }

    pub fn contains(&self, op: Operation) -> bool {
        self.0 & op.bit() != 0
    }

    pub fn iter(&self) -> impl Iterator<Item = Operation> + '_ {
        Operation::ALL.into_iter().filter(move |op| self.contains(*op))
    }

    pub fn len(&self) -> usize {
        self.0.count_ones() as usize
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }
}

impl std::fmt::Debug for CapabilitySet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_set().entries(self.iter().map(|op| op.as_str())).finish()
    }
}

/// A model together with the capabilities detected when it was wrapped.
///
/// Accessors consult the cached set first, so a model cannot gain a
/// capability after wrapping.
pub struct ModelHandle {
    model: Arc<dyn Model>,
    capabilities: CapabilitySet,
    custom_errors: bool,
}

impl ModelHandle {
    pub fn new(model: Arc<dyn Model>) -> Self {
        let capabilities = CapabilitySet::of(model.as_ref());
        let custom_errors = model.as_error_handler().is_some();

        tracing::info!(
            model = model.name(),
            capabilities = ?capabilities,
            custom_errors,
            "Wrapped model"
        );
        // Not fatal here: predict is only required when it is invoked.
        if !capabilities.contains(Operation::Predict) {
            tracing::warn!(model = model.name(), "Model does not implement predict");
        }

        Self {
            model,
            capabilities,
            custom_errors,
        }
    }

    pub fn name(&self) -> &str {
        self.model.name()
    }

    pub fn capabilities(&self) -> CapabilitySet {
        self.capabilities
    }

    pub fn supports(&self, op: Operation) -> bool {
        self.capabilities.contains(op)
    }

    pub fn predictor(&self) -> Option<&dyn Predictor> {
        self.gate(Operation::Predict, self.model.as_predictor())
    }

    pub fn input_transformer(&self) -> Option<&dyn InputTransformer> {
        self.gate(Operation::TransformInput, self.model.as_input_transformer())
    }

    pub fn output_transformer(&self) -> Option<&dyn OutputTransformer> {
        self.gate(Operation::TransformOutput, self.model.as_output_transformer())
    }

    pub fn router(&self) -> Option<&dyn Router> {
        self.gate(Operation::Route, self.model.as_router())
    }

    pub fn combiner(&self) -> Option<&dyn Combiner> {
        self.gate(Operation::Aggregate, self.model.as_combiner())
    }

    pub fn feedback_handler(&self) -> Option<&dyn FeedbackHandler> {
        self.gate(Operation::SendFeedback, self.model.as_feedback_handler())
    }

    pub fn health_check(&self) -> Option<&dyn HealthCheck> {
        self.gate(Operation::Health, self.model.as_health_check())
    }

    pub fn metadata_provider(&self) -> Option<&dyn MetadataProvider> {
        self.gate(Operation::Metadata, self.model.as_metadata_provider())
    }

    pub fn error_handler(&self) -> Option<&dyn ErrorHandler> {
        if self.custom_errors {
            self.model.as_error_handler()
        } else {
            None
        }
    }

    fn gate<'a, T: ?Sized>(&self, op: Operation, capability: Option<&'a T>) -> Option<&'a T> {
        if self.capabilities.contains(op) {
            capability
        } else {
            None
        }
    }
}
