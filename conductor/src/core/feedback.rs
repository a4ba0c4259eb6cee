//! Turns a verification result into the next routing decision.

use serde::{Deserialize, Serialize};

use super::phases::AlgorithmPhase;
use super::verification::{VerificationResult, VerificationStatus};

/// Gaps quoted in a loop-back message.
const GAPS_IN_MESSAGE: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedbackAction {
    Proceed,
    LoopBack,
    Escalate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedbackDecision {
    pub action: FeedbackAction,
    pub next_phase: AlgorithmPhase,
    pub message: String,
}

/// Route on `result`. `iteration` is the verification pass just completed.
pub fn decide(result: &VerificationResult, iteration: u32, max_iterations: u32) -> FeedbackDecision {
    decide_for(result.status, &result.gaps, iteration, max_iterations)
}

pub fn decide_for(
    status: VerificationStatus,
    gaps: &[String],
    iteration: u32,
    max_iterations: u32,
) -> FeedbackDecision {
    match status {
        VerificationStatus::Verified => FeedbackDecision {
            action: FeedbackAction::Proceed,
            next_phase: AlgorithmPhase::Learn,
            message: "All verification criteria met. Proceeding to LEARN phase.".to_string(),
        },
        VerificationStatus::CriticalFailure => escalate(
            "Critical failure detected. User intervention required to resolve anti-criteria violations."
                .to_string(),
        ),
        VerificationStatus::GapsIdentified if iteration >= max_iterations => escalate(format!(
            "Maximum iterations ({max_iterations}) reached. Gaps remain unresolved. User review required."
        )),
        VerificationStatus::GapsIdentified => {
            let quoted = gaps
                .iter()
                .take(GAPS_IN_MESSAGE)
                .map(String::as_str)
                .collect::<Vec<_>>()
                .join("; ");
            FeedbackDecision {
                action: FeedbackAction::LoopBack,
                next_phase: AlgorithmPhase::InnerLoop,
                message: format!(
                    "Gaps identified (iteration {iteration}/{max_iterations}): {quoted}. \
Returning to INNER_LOOP for refinement."
                ),
            }
        }
    }
}

fn escalate(message: String) -> FeedbackDecision {
    FeedbackDecision {
        action: FeedbackAction::Escalate,
        next_phase: AlgorithmPhase::Halted,
        message,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gaps(items: &[&str]) -> Vec<String> {
        items.iter().map(|item| item.to_string()).collect()
    }

    #[test]
    fn gaps_below_limit_loop_back() {
        let decision = decide_for(
            VerificationStatus::GapsIdentified,
            &gaps(&["a", "b", "c", "d"]),
            2,
            3,
        );
        assert_eq!(decision.action, FeedbackAction::LoopBack);
        assert_eq!(decision.next_phase, AlgorithmPhase::InnerLoop);
        assert_eq!(
            decision.message,
            "Gaps identified (iteration 2/3): a; b; c. Returning to INNER_LOOP for refinement."
        );
    }

    #[test]
    fn gaps_at_limit_escalate() {
        let decision = decide_for(VerificationStatus::GapsIdentified, &gaps(&["a"]), 3, 3);
        assert_eq!(decision.action, FeedbackAction::Escalate);
        assert_eq!(decision.next_phase, AlgorithmPhase::Halted);
        assert!(decision.message.starts_with("Maximum iterations (3) reached"));
    }

    #[test]
    fn critical_failure_escalates_on_first_pass() {
        let decision = decide_for(VerificationStatus::CriticalFailure, &[], 1, 3);
        assert_eq!(decision.action, FeedbackAction::Escalate);
        assert!(decision.message.contains("anti-criteria"));
    }

    #[test]
    fn verified_proceeds_to_learn() {
        let decision = decide_for(VerificationStatus::Verified, &[], 3, 3);
        assert_eq!(decision.action, FeedbackAction::Proceed);
        assert_eq!(decision.next_phase, AlgorithmPhase::Learn);
    }
}
