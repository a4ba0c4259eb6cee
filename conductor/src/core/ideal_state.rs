//! The IDEAL STATE artifact: what "done" means for a session.
//!
//! Written by the interview actors as JSON, scored by the completeness
//! scorer, and used as the yardstick by verification. All fields are
//! optional on input so partially captured artifacts still parse.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SuccessCriterion {
    pub description: String,
    pub verification_method: Option<String>,
    /// Set by the verifying actor once the criterion has been checked.
    pub verified: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SuccessMetric {
    pub name: Option<String>,
    pub target_value: Option<serde_json::Value>,
    pub unit: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IdealState {
    pub objective: Option<String>,
    pub euphoric_surprise: Option<String>,
    pub success_criteria: Vec<SuccessCriterion>,
    pub success_metrics: Vec<SuccessMetric>,
    /// Overall verification approach (e.g. "cargo test + manual review").
    pub verification_method: Option<String>,
    pub anti_criteria: Vec<String>,
    pub exit_conditions: Vec<String>,
}

impl IdealState {
    /// Nothing captured at all, as when the artifact is `{}`.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Treats `Some("")` and whitespace like `None`.
pub(crate) fn present(value: &Option<String>) -> bool {
    value.as_deref().is_some_and(|text| !text.trim().is_empty())
}
