//! Named operations a gateway can dispatch to a model.

use serde::{Deserialize, Serialize};

/// The fixed set of capabilities a model may implement.
///
/// Only [`Operation::Predict`] is mandatory; every other operation has a
/// default behaviour when the model does not provide it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Operation {
    Predict,
    TransformInput,
    TransformOutput,
    Route,
    Aggregate,
    SendFeedback,
    Health,
    Metadata,
}

impl Operation {
    /// All operation variants for iteration.
    pub const ALL: [Operation; 8] = [
        Operation::Predict,
        Operation::TransformInput,
        Operation::TransformOutput,
        Operation::Route,
        Operation::Aggregate,
        Operation::SendFeedback,
        Operation::Health,
        Operation::Metadata,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Predict => "predict",
            Operation::TransformInput => "transform-input",
            Operation::TransformOutput => "transform-output",
            Operation::Route => "route",
            Operation::Aggregate => "aggregate",
            Operation::SendFeedback => "send-feedback",
            Operation::Health => "health",
            Operation::Metadata => "metadata",
        }
    }

    /// Whether a model must implement this operation to be usable.
    pub fn is_mandatory(&self) -> bool {
        matches!(self, Operation::Predict)
    }

    /// Whether the operation takes an inbound payload.
    pub fn takes_payload(&self) -> bool {
        !matches!(self, Operation::Health | Operation::Metadata)
    }

    /// Bit position inside a capability bitset.
    pub fn bit(&self) -> u8 {
        1 << (*self as u8)
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
