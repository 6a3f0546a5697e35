//! Feedback messages tying a reward or ground truth to an earlier prediction.

use serde::{Deserialize, Serialize};

use crate::{Request, Response};

/// Client-supplied evaluation of a prior request/response pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feedback {
    pub request: Request,
    pub response: Response,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reward: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub truth: Option<Request>,
}

impl Feedback {
    /// Routing decision recorded in the response for the given unit, if any.
    pub fn routing_for(&self, predictive_unit_id: &str) -> Option<i32> {
        self.response.meta.routing.get(predictive_unit_id).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feedback_minimal() {
        let json = r#"{
            "request": {"data": {"ndarray": [[1.0]]}},
            "response": {"data": {"ndarray": [[0.9]]}},
            "reward": 1.0
        }"#;
        let feedback: Feedback = serde_json::from_str(json).unwrap();
        assert_eq!(feedback.reward, Some(1.0));
        assert!(feedback.truth.is_none());
    }

    #[test]
    fn test_feedback_requires_request() {
        let json = r#"{"response": {"strData": "x"}}"#;
        assert!(serde_json::from_str::<Feedback>(json).is_err());
    }

    #[test]
    fn test_routing_for_unit() {
        let json = r#"{
            "request": {"strData": "x"},
            "response": {"strData": "y", "meta": {"routing": {"router": 2}}}
        }"#;
        let feedback: Feedback = serde_json::from_str(json).unwrap();
        assert_eq!(feedback.routing_for("router"), Some(2));
        assert_eq!(feedback.routing_for("other"), None);
    }
}
