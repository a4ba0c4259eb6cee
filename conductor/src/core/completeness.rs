//! Completeness scoring for the IDEAL STATE artifact.
//!
//! Six weighted components, each in `[0, 1]`. The interview loop keeps
//! refining until the weighted total reaches [`READY_THRESHOLD`].

use serde::{Deserialize, Serialize};

use super::ideal_state::{IdealState, present};

pub const READY_THRESHOLD: f64 = 0.95;

const CRITERIA_CLARITY_WEIGHT: f64 = 0.25;
const METRIC_PRECISION_WEIGHT: f64 = 0.20;
const VERIFICATION_FEASIBILITY_WEIGHT: f64 = 0.20;
const ANTI_CRITERIA_WEIGHT: f64 = 0.15;
const EXIT_CLARITY_WEIGHT: f64 = 0.10;
const INTENT_ALIGNMENT_WEIGHT: f64 = 0.10;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ComponentScores {
    pub criteria_clarity: f64,
    pub metric_precision: f64,
    pub verification_feasibility: f64,
    pub anti_criteria_coverage: f64,
    pub exit_clarity: f64,
    pub intent_alignment: f64,
}

impl ComponentScores {
    /// Weighted sum. The summation order is fixed so a perfect artifact
    /// scores exactly 1.0.
    pub fn weighted(&self) -> f64 {
        self.criteria_clarity * CRITERIA_CLARITY_WEIGHT
            + self.metric_precision * METRIC_PRECISION_WEIGHT
            + self.verification_feasibility * VERIFICATION_FEASIBILITY_WEIGHT
            + self.anti_criteria_coverage * ANTI_CRITERIA_WEIGHT
            + self.exit_clarity * EXIT_CLARITY_WEIGHT
            + self.intent_alignment * INTENT_ALIGNMENT_WEIGHT
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletenessScore {
    pub overall: f64,
    pub components: ComponentScores,
    pub missing: Vec<String>,
    pub recommendations: Vec<String>,
}

impl CompletenessScore {
    pub fn is_ready(&self) -> bool {
        self.overall >= READY_THRESHOLD
    }
}

impl ComponentScores {
    /// (score, threshold, missing label, recommendation), in report order.
    fn rules(&self) -> [(f64, f64, &'static str, &'static str); 6] {
        [
            (
                self.criteria_clarity,
                0.8,
                "Clear success criteria",
                "Define at least 2 success criteria with verification methods",
            ),
            (
                self.metric_precision,
                0.7,
                "Precise metrics",
                "Add quantifiable metrics with target values",
            ),
            (
                self.verification_feasibility,
                0.7,
                "Feasible verification",
                "Ensure criteria can be objectively verified",
            ),
            (
                self.anti_criteria_coverage,
                0.5,
                "Anti-criteria",
                "Identify what should NOT happen",
            ),
            (
                self.exit_clarity,
                0.5,
                "Exit conditions",
                "Define clear exit conditions",
            ),
            (
                self.intent_alignment,
                0.8,
                "Intent clarity",
                "Clarify objective and desired outcome",
            ),
        ]
    }
}

/// Score an artifact. `None`, or an artifact with nothing captured, means
/// no IDEAL STATE is defined yet.
pub fn score(ideal: Option<&IdealState>) -> CompletenessScore {
    let Some(ideal) = ideal.filter(|ideal| !ideal.is_empty()) else {
        return CompletenessScore {
            overall: 0.0,
            components: ComponentScores::default(),
            missing: vec!["No IDEAL STATE defined".to_string()],
            recommendations: vec!["Define IDEAL STATE with objective and criteria".to_string()],
        };
    };

    let components = ComponentScores {
        criteria_clarity: criteria_clarity(ideal),
        metric_precision: metric_precision(ideal),
        verification_feasibility: verification_feasibility(ideal),
        anti_criteria_coverage: count_score(ideal.anti_criteria.len(), 0.5, 0.75),
        exit_clarity: count_score(ideal.exit_conditions.len(), 0.3, 0.7),
        intent_alignment: intent_alignment(ideal),
    };

    let mut missing = Vec::new();
    let mut recommendations = Vec::new();
    for (value, threshold, label, recommendation) in components.rules() {
        if value < threshold {
            missing.push(label.to_string());
            recommendations.push(recommendation.to_string());
        }
    }

    CompletenessScore {
        overall: components.weighted(),
        components,
        missing,
        recommendations,
    }
}

fn criteria_clarity(ideal: &IdealState) -> f64 {
    match ideal.success_criteria.len() {
        0 => 0.0,
        1 => 0.5,
        total => {
            let sum: f64 = ideal
                .success_criteria
                .iter()
                .map(|criterion| {
                    let described = if criterion.description.trim().is_empty() { 0.0 } else { 0.5 };
                    let method = if present(&criterion.verification_method) { 0.5 } else { 0.0 };
                    described + method
                })
                .sum();
            sum / total as f64
        }
    }
}

fn metric_precision(ideal: &IdealState) -> f64 {
    if ideal.success_metrics.is_empty() {
        return 0.3;
    }
    let sum: f64 = ideal
        .success_metrics
        .iter()
        .map(|metric| {
            let mut score = 0.0;
            if present(&metric.name) {
                score += 0.3;
            }
            if metric
                .target_value
                .as_ref()
                .is_some_and(|value| !value.is_null())
            {
                score += 0.5;
            }
            if present(&metric.unit) {
                score += 0.2;
            }
            score
        })
        .sum();
    sum / ideal.success_metrics.len() as f64
}

fn verification_feasibility(ideal: &IdealState) -> f64 {
    if !present(&ideal.verification_method) {
        return 0.3;
    }
    let total = ideal.success_criteria.len();
    if total == 0 {
        return 0.5;
    }
    let verifiable = ideal
        .success_criteria
        .iter()
        .filter(|criterion| present(&criterion.verification_method))
        .count();
    0.5 + 0.5 * (verifiable as f64 / total as f64)
}

/// `none` for zero items, `one` for a single item, 1.0 for two or more.
fn count_score(count: usize, none: f64, one: f64) -> f64 {
    match count {
        0 => none,
        1 => one,
        _ => 1.0,
    }
}

fn intent_alignment(ideal: &IdealState) -> f64 {
    let mut score = 0.0;
    if present(&ideal.objective) {
        score += 0.6;
    }
    if present(&ideal.euphoric_surprise) {
        score += 0.4;
    }
    score
}
