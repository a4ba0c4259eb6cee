//! Layered verification of produced artifacts against the IDEAL STATE.
//!
//! Three scored layers are combined with fixed weights. Any reported
//! anti-criteria violation forces [`VerificationStatus::CriticalFailure`]
//! regardless of the scores.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::de::{MapAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::ideal_state::IdealState;

pub const OBJECTIVE_WEIGHT: f64 = 0.5;
pub const HEURISTIC_WEIGHT: f64 = 0.3;
pub const SEMANTIC_WEIGHT: f64 = 0.2;

pub const VERIFIED_THRESHOLD: f64 = 0.9;
pub const GAPS_THRESHOLD: f64 = 0.6;

/// Heuristic and semantic score when artifacts exist but carry no signal.
const DEFAULT_LAYER_SCORE: f64 = 0.7;
/// Heuristic and semantic score when there are no artifacts at all.
const NEUTRAL_SCORE: f64 = 0.5;
const FILES_CREATED_SCORE: f64 = 0.8;
const INTENT_MATCHED_SCORE: f64 = 0.9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationStatus {
    Verified,
    GapsIdentified,
    CriticalFailure,
}

impl VerificationStatus {
    pub fn label(self) -> &'static str {
        match self {
            Self::Verified => "VERIFIED",
            Self::GapsIdentified => "GAPS_IDENTIFIED",
            Self::CriticalFailure => "CRITICAL_FAILURE",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestResults {
    pub passed: u32,
    pub failed: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportStatus {
    Completed,
    Failed,
    #[serde(other)]
    Other,
}

/// What one execution phase reported. Every field is an optional signal.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhaseReport {
    pub test_results: Option<TestResults>,
    pub status: Option<ReportStatus>,
    pub all_criteria_met: bool,
    /// 0-10 lint quality.
    pub lint_score: Option<f64>,
    /// 0-100, higher is worse.
    pub complexity_score: Option<f64>,
    pub files_created: Vec<String>,
    /// 0-1 alignment judged by the validating actor.
    pub semantic_score: Option<f64>,
    pub intent_matched: bool,
    pub gaps: Vec<String>,
    pub anti_criteria_violations: Vec<String>,
}

/// Phase name → report, in the order the artifact file lists them.
///
/// Order matters: the semantic layer takes the first phase that carries a
/// signal, and gaps are reported phase by phase.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Artifacts(Vec<(String, PhaseReport)>);

impl Artifacts {
    pub fn new() -> Self {
        Self::default()
    }

    /// A repeated phase replaces the earlier report but keeps its position.
    pub fn insert(&mut self, phase: impl Into<String>, report: PhaseReport) {
        let phase = phase.into();
        match self.0.iter_mut().find(|(name, _)| *name == phase) {
            Some(entry) => entry.1 = report,
            None => self.0.push((phase, report)),
        }
    }

    pub fn get(&self, phase: &str) -> Option<&PhaseReport> {
        self.iter().find(|(name, _)| *name == phase).map(|(_, report)| report)
    }

    pub fn get_mut(&mut self, phase: &str) -> Option<&mut PhaseReport> {
        self.0
            .iter_mut()
            .find(|(name, _)| name == phase)
            .map(|(_, report)| report)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &PhaseReport)> {
        self.0.iter().map(|(phase, report)| (phase.as_str(), report))
    }

    pub fn values(&self) -> impl Iterator<Item = &PhaseReport> {
        self.0.iter().map(|(_, report)| report)
    }
}

impl FromIterator<(String, PhaseReport)> for Artifacts {
    fn from_iter<I: IntoIterator<Item = (String, PhaseReport)>>(iter: I) -> Self {
        let mut artifacts = Self::new();
        for (phase, report) in iter {
            artifacts.insert(phase, report);
        }
        artifacts
    }
}

impl<const N: usize> From<[(String, PhaseReport); N]> for Artifacts {
    fn from(entries: [(String, PhaseReport); N]) -> Self {
        entries.into_iter().collect()
    }
}

impl Serialize for Artifacts {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(self.iter())
    }
}

impl<'de> Deserialize<'de> for Artifacts {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct ArtifactsVisitor;

        impl<'de> Visitor<'de> for ArtifactsVisitor {
            type Value = Artifacts;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of phase name to phase report")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Artifacts, A::Error> {
                let mut artifacts = Artifacts::new();
                while let Some((phase, report)) = map.next_entry::<String, PhaseReport>()? {
                    artifacts.insert(phase, report);
                }
                Ok(artifacts)
            }
        }

        deserializer.deserialize_map(ArtifactsVisitor)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LayerScores {
    pub objective: f64,
    pub heuristic: f64,
    pub semantic: f64,
}

impl LayerScores {
    pub fn overall(&self) -> f64 {
        self.objective * OBJECTIVE_WEIGHT
            + self.heuristic * HEURISTIC_WEIGHT
            + self.semantic * SEMANTIC_WEIGHT
    }
}

/// One verification pass. Never modified after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationResult {
    pub iteration: u32,
    pub timestamp: DateTime<Utc>,
    pub status: VerificationStatus,
    pub layer_scores: LayerScores,
    pub overall_score: f64,
    pub gaps: Vec<String>,
    pub recommendations: Vec<String>,
}

/// Score `artifacts` against `ideal` and classify the outcome.
pub fn verify(
    ideal: &IdealState,
    artifacts: &Artifacts,
    iteration: u32,
    timestamp: DateTime<Utc>,
) -> VerificationResult {
    let layer_scores = LayerScores {
        objective: objective_score(artifacts),
        heuristic: heuristic_score(artifacts),
        semantic: semantic_score(artifacts),
    };
    let overall_score = layer_scores.overall();
    let status = classify(has_anti_criteria_violation(artifacts), overall_score);
    let gaps = identify_gaps(ideal, artifacts, overall_score);
    let recommendations = recommendations(&gaps, status);
    VerificationResult {
        iteration,
        timestamp,
        status,
        layer_scores,
        overall_score,
        gaps,
        recommendations,
    }
}

pub fn classify(anti_criteria_violated: bool, overall_score: f64) -> VerificationStatus {
    if anti_criteria_violated {
        VerificationStatus::CriticalFailure
    } else if overall_score >= VERIFIED_THRESHOLD {
        VerificationStatus::Verified
    } else if overall_score >= GAPS_THRESHOLD {
        VerificationStatus::GapsIdentified
    } else {
        VerificationStatus::CriticalFailure
    }
}

fn has_anti_criteria_violation(artifacts: &Artifacts) -> bool {
    artifacts
        .values()
        .any(|report| !report.anti_criteria_violations.is_empty())
}

fn objective_score(artifacts: &Artifacts) -> f64 {
    let mut scores = Vec::new();
    for report in artifacts.values() {
        if let Some(tests) = report.test_results {
            let total = tests.passed + tests.failed;
            if total > 0 {
                scores.push(f64::from(tests.passed) / f64::from(total));
            }
        }
        match report.status {
            Some(ReportStatus::Completed) => scores.push(1.0),
            Some(ReportStatus::Failed) => scores.push(0.0),
            _ => {}
        }
        if report.all_criteria_met {
            scores.push(1.0);
        }
    }
    mean(&scores).unwrap_or(0.0)
}

fn heuristic_score(artifacts: &Artifacts) -> f64 {
    if artifacts.is_empty() {
        return NEUTRAL_SCORE;
    }
    let mut scores = Vec::new();
    for report in artifacts.values() {
        if let Some(lint) = report.lint_score {
            scores.push((lint / 10.0).clamp(0.0, 1.0));
        }
        if let Some(complexity) = report.complexity_score {
            scores.push((1.0 - complexity / 100.0).clamp(0.0, 1.0));
        }
        if !report.files_created.is_empty() {
            scores.push(FILES_CREATED_SCORE);
        }
    }
    mean(&scores).unwrap_or(DEFAULT_LAYER_SCORE)
}

/// First explicit signal wins.
fn semantic_score(artifacts: &Artifacts) -> f64 {
    if artifacts.is_empty() {
        return NEUTRAL_SCORE;
    }
    for report in artifacts.values() {
        if let Some(score) = report.semantic_score {
            return score.clamp(0.0, 1.0);
        }
        if report.intent_matched {
            return INTENT_MATCHED_SCORE;
        }
    }
    DEFAULT_LAYER_SCORE
}

fn mean(scores: &[f64]) -> Option<f64> {
    if scores.is_empty() {
        return None;
    }
    Some(scores.iter().sum::<f64>() / scores.len() as f64)
}

fn identify_gaps(ideal: &IdealState, artifacts: &Artifacts, overall_score: f64) -> Vec<String> {
    let mut gaps: Vec<String> = ideal
        .success_criteria
        .iter()
        .filter(|criterion| !criterion.verified)
        .map(|criterion| format!("Unverified: {}", criterion.description))
        .collect();
    for (phase, report) in artifacts.iter() {
        if let Some(tests) = report.test_results
            && tests.failed > 0
        {
            gaps.push(format!("{} tests failing in {}", tests.failed, phase));
        }
        gaps.extend(report.gaps.iter().cloned());
    }
    if overall_score < GAPS_THRESHOLD {
        gaps.push(format!("Overall score ({overall_score:.2}) below threshold"));
    }
    gaps
}

fn recommendations(gaps: &[String], status: VerificationStatus) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    let mut push = |item: String| {
        if !out.contains(&item) {
            out.push(item);
        }
    };
    if status == VerificationStatus::CriticalFailure {
        push("Review anti-criteria violations immediately".to_string());
        push("Consider major refactoring or redesign".to_string());
    }
    for gap in gaps {
        let lower = gap.to_lowercase();
        if lower.contains("test") {
            push("Fix failing tests before proceeding".to_string());
        } else if lower.contains("unverified") {
            push(format!("Address: {gap}"));
        }
    }
    if out.is_empty() && status == VerificationStatus::GapsIdentified {
        out.push("Review and address identified gaps".to_string());
    }
    out
}
