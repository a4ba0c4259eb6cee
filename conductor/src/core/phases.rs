//! Phase enums and transition tables for each workflow kind.
//!
//! Sub-phases (interview, ideal state, learn) are ordinary variants; there is
//! no numeric step key anywhere.

use serde::{Deserialize, Serialize};

use super::fsm::Workflow;

/// Stable names for phase enums (snake_case, identical to the serde form).
pub trait PhaseName: Copy + 'static {
    const ALL: &'static [Self];

    fn as_str(self) -> &'static str;

    /// Upper-case label used in directives (`INNER_LOOP`).
    fn label(self) -> String {
        self.as_str().to_ascii_uppercase()
    }

    /// Parse a user-supplied name. Case-insensitive, `-` and `_` are equivalent.
    fn parse_name(input: &str) -> Option<Self> {
        let wanted = input.trim().to_ascii_lowercase().replace('-', "_");
        Self::ALL.iter().copied().find(|phase| phase.as_str() == wanted)
    }
}

// ---------------------------------------------------------------------------
// Main algorithm
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlgorithmPhase {
    Initialized,
    Gather,
    Interview,
    IdealState,
    InnerLoop,
    Observe,
    Think,
    Plan,
    Build,
    Execute,
    Verify,
    Learn,
    Completed,
    Halted,
}

impl PhaseName for AlgorithmPhase {
    const ALL: &'static [Self] = &[
        Self::Initialized,
        Self::Gather,
        Self::Interview,
        Self::IdealState,
        Self::InnerLoop,
        Self::Observe,
        Self::Think,
        Self::Plan,
        Self::Build,
        Self::Execute,
        Self::Verify,
        Self::Learn,
        Self::Completed,
        Self::Halted,
    ];

    fn as_str(self) -> &'static str {
        match self {
            Self::Initialized => "initialized",
            Self::Gather => "gather",
            Self::Interview => "interview",
            Self::IdealState => "ideal_state",
            Self::InnerLoop => "inner_loop",
            Self::Observe => "observe",
            Self::Think => "think",
            Self::Plan => "plan",
            Self::Build => "build",
            Self::Execute => "execute",
            Self::Verify => "verify",
            Self::Learn => "learn",
            Self::Completed => "completed",
            Self::Halted => "halted",
        }
    }
}

/// Phases a halted session may resume into.
const RESUMABLE: &[AlgorithmPhase] = &[
    AlgorithmPhase::Gather,
    AlgorithmPhase::Interview,
    AlgorithmPhase::IdealState,
    AlgorithmPhase::InnerLoop,
    AlgorithmPhase::Observe,
    AlgorithmPhase::Think,
    AlgorithmPhase::Plan,
    AlgorithmPhase::Build,
    AlgorithmPhase::Execute,
    AlgorithmPhase::Verify,
    AlgorithmPhase::Learn,
];

impl AlgorithmPhase {
    /// True for phases a halted session can be resumed into.
    pub fn is_resumable(self) -> bool {
        RESUMABLE.contains(&self)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlgorithmWorkflow {}

impl Workflow for AlgorithmWorkflow {
    type Phase = AlgorithmPhase;

    fn initial(&self) -> AlgorithmPhase {
        AlgorithmPhase::Initialized
    }

    fn successors(&self, from: AlgorithmPhase) -> &'static [AlgorithmPhase] {
        use AlgorithmPhase as P;
        match from {
            P::Initialized => &[P::Gather, P::Halted],
            P::Gather => &[P::Interview, P::IdealState, P::Halted],
            P::Interview | P::IdealState => &[P::InnerLoop, P::Halted],
            P::InnerLoop => &[P::Observe, P::Halted],
            P::Observe => &[P::Think, P::Halted],
            P::Think => &[P::Plan, P::Halted],
            P::Plan => &[P::Build, P::Halted],
            P::Build => &[P::Execute, P::Halted],
            P::Execute => &[P::Verify, P::Halted],
            P::Verify => &[P::Learn, P::Completed, P::Halted],
            P::Learn => &[P::Completed, P::Halted],
            P::Completed => &[],
            P::Halted => RESUMABLE,
        }
    }

    fn review_phase(&self) -> Option<AlgorithmPhase> {
        Some(AlgorithmPhase::Verify)
    }

    fn restart_phases(&self) -> &'static [AlgorithmPhase] {
        &[
            AlgorithmPhase::InnerLoop,
            AlgorithmPhase::Observe,
            AlgorithmPhase::Think,
            AlgorithmPhase::Plan,
            AlgorithmPhase::Build,
        ]
    }
}

// ---------------------------------------------------------------------------
// TDD cycle
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TddPhase {
    Initialized,
    Red,
    Green,
    Refactor,
    Doc,
    Completed,
}

impl PhaseName for TddPhase {
    const ALL: &'static [Self] = &[
        Self::Initialized,
        Self::Red,
        Self::Green,
        Self::Refactor,
        Self::Doc,
        Self::Completed,
    ];

    fn as_str(self) -> &'static str {
        match self {
            Self::Initialized => "initialized",
            Self::Red => "red",
            Self::Green => "green",
            Self::Refactor => "refactor",
            Self::Doc => "doc",
            Self::Completed => "completed",
        }
    }
}

impl TddPhase {
    /// Forward successor used when a phase's flow finishes.
    pub fn next(self) -> Option<Self> {
        match self {
            Self::Initialized => Some(Self::Red),
            Self::Red => Some(Self::Green),
            Self::Green => Some(Self::Refactor),
            Self::Refactor => Some(Self::Doc),
            Self::Doc => Some(Self::Completed),
            Self::Completed => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TddWorkflow {}

impl Workflow for TddWorkflow {
    type Phase = TddPhase;

    fn initial(&self) -> TddPhase {
        TddPhase::Initialized
    }

    fn successors(&self, from: TddPhase) -> &'static [TddPhase] {
        match from {
            TddPhase::Initialized => &[TddPhase::Red],
            TddPhase::Red => &[TddPhase::Green],
            TddPhase::Green => &[TddPhase::Refactor],
            TddPhase::Refactor => &[TddPhase::Doc],
            TddPhase::Doc => &[TddPhase::Completed, TddPhase::Red],
            TddPhase::Completed => &[],
        }
    }

    fn review_phase(&self) -> Option<TddPhase> {
        Some(TddPhase::Doc)
    }

    fn restart_phases(&self) -> &'static [TddPhase] {
        &[TddPhase::Red]
    }
}

// ---------------------------------------------------------------------------
// Documentation scaffold
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScaffoldPhase {
    Initialized,
    Clarification,
    Analysis,
    Synthesis,
    Validation,
    Completed,
}

impl PhaseName for ScaffoldPhase {
    const ALL: &'static [Self] = &[
        Self::Initialized,
        Self::Clarification,
        Self::Analysis,
        Self::Synthesis,
        Self::Validation,
        Self::Completed,
    ];

    fn as_str(self) -> &'static str {
        match self {
            Self::Initialized => "initialized",
            Self::Clarification => "clarification",
            Self::Analysis => "analysis",
            Self::Synthesis => "synthesis",
            Self::Validation => "validation",
            Self::Completed => "completed",
        }
    }
}

/// `scaffold` creates docs from scratch; `update` refreshes existing ones and
/// skips clarification.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScaffoldMode {
    #[default]
    Scaffold,
    Update,
}

impl ScaffoldMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Scaffold => "scaffold",
            Self::Update => "update",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScaffoldWorkflow {
    pub mode: ScaffoldMode,
}

impl ScaffoldWorkflow {
    pub fn new(mode: ScaffoldMode) -> Self {
        Self { mode }
    }

    /// The single forward successor for this mode.
    pub fn next(&self, from: ScaffoldPhase) -> Option<ScaffoldPhase> {
        self.successors(from).first().copied()
    }
}

impl Workflow for ScaffoldWorkflow {
    type Phase = ScaffoldPhase;

    fn initial(&self) -> ScaffoldPhase {
        ScaffoldPhase::Initialized
    }

    fn successors(&self, from: ScaffoldPhase) -> &'static [ScaffoldPhase] {
        use ScaffoldPhase as P;
        match (self.mode, from) {
            (ScaffoldMode::Scaffold, P::Initialized) => &[P::Clarification],
            (ScaffoldMode::Scaffold, P::Clarification) => &[P::Analysis],
            (ScaffoldMode::Update, P::Initialized) => &[P::Analysis],
            (ScaffoldMode::Update, P::Clarification) => &[],
            (_, P::Analysis) => &[P::Synthesis],
            (_, P::Synthesis) => &[P::Validation],
            (_, P::Validation) => &[P::Completed],
            (_, P::Completed) => &[],
        }
    }
}

// ---------------------------------------------------------------------------
// Decomposition protocol
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecomposePhase {
    Initialized,
    Decomposing,
    Dispatching,
    Aggregating,
    Completed,
}

impl PhaseName for DecomposePhase {
    const ALL: &'static [Self] = &[
        Self::Initialized,
        Self::Decomposing,
        Self::Dispatching,
        Self::Aggregating,
        Self::Completed,
    ];

    fn as_str(self) -> &'static str {
        match self {
            Self::Initialized => "initialized",
            Self::Decomposing => "decomposing",
            Self::Dispatching => "dispatching",
            Self::Aggregating => "aggregating",
            Self::Completed => "completed",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecomposeWorkflow {}

impl Workflow for DecomposeWorkflow {
    type Phase = DecomposePhase;

    fn initial(&self) -> DecomposePhase {
        DecomposePhase::Initialized
    }

    fn successors(&self, from: DecomposePhase) -> &'static [DecomposePhase] {
        use DecomposePhase as P;
        match from {
            P::Initialized => &[P::Decomposing],
            P::Decomposing => &[P::Dispatching],
            P::Dispatching => &[P::Aggregating],
            P::Aggregating => &[P::Completed],
            P::Completed => &[],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::fsm::Fsm;

    fn walk<W: Workflow>(workflow: W, path: &[W::Phase]) -> Fsm<W> {
        let mut fsm = Fsm::new(workflow);
        for phase in path {
            assert!(fsm.transition(*phase), "transition to {phase:?}");
        }
        fsm
    }

    #[test]
    fn algorithm_happy_path_reaches_completed() {
        use AlgorithmPhase as P;
        let fsm = walk(
            AlgorithmWorkflow {},
            &[
                P::Gather,
                P::Interview,
                P::InnerLoop,
                P::Observe,
                P::Think,
                P::Plan,
                P::Build,
                P::Execute,
                P::Verify,
                P::Learn,
                P::Completed,
            ],
        );
        assert!(fsm.is_terminal());
        assert_eq!(fsm.history().len(), 12);
    }

    #[test]
    fn algorithm_rejects_skipping_verify() {
        use AlgorithmPhase as P;
        let mut fsm = walk(
            AlgorithmWorkflow {},
            &[P::Gather, P::IdealState, P::InnerLoop, P::Observe, P::Think, P::Plan, P::Build, P::Execute],
        );
        assert!(!fsm.transition(P::Learn));
        assert!(!fsm.transition(P::Completed));
        assert_eq!(fsm.current(), P::Execute);
    }

    #[test]
    fn algorithm_loop_back_from_verify_to_build() {
        use AlgorithmPhase as P;
        let mut fsm = walk(
            AlgorithmWorkflow {},
            &[P::Gather, P::Interview, P::InnerLoop, P::Observe, P::Think, P::Plan, P::Build, P::Execute, P::Verify],
        );
        assert!(!fsm.loop_back(P::Gather));
        assert!(fsm.loop_back(P::Build));
        assert_eq!(fsm.cycle_count(), 1);
        assert!(fsm.transition(P::Execute));
    }

    #[test]
    fn algorithm_halt_and_resume() {
        use AlgorithmPhase as P;
        let mut fsm = walk(AlgorithmWorkflow {}, &[P::Gather, P::Halted]);
        assert!(!fsm.transition(P::Completed));
        assert!(!fsm.transition(P::Initialized));
        assert!(fsm.transition(P::Gather));
    }

    #[test]
    fn tdd_doc_loops_back_to_red() {
        use TddPhase as P;
        let mut fsm = walk(TddWorkflow {}, &[P::Red, P::Green, P::Refactor]);
        assert!(!fsm.loop_back(P::Red), "loop-back only from doc");
        assert!(fsm.transition(P::Doc));
        assert!(fsm.loop_back(P::Red));
        assert_eq!(fsm.cycle_count(), 1);
        assert_eq!(fsm.current(), P::Red);
    }

    #[test]
    fn scaffold_update_mode_skips_clarification() {
        use ScaffoldPhase as P;
        let update = ScaffoldWorkflow::new(ScaffoldMode::Update);
        let fsm = Fsm::new(update);
        assert!(!fsm.can_transition(P::Clarification));
        assert!(fsm.can_transition(P::Analysis));
        assert_eq!(update.next(P::Initialized), Some(P::Analysis));

        let scaffold = ScaffoldWorkflow::new(ScaffoldMode::Scaffold);
        assert_eq!(scaffold.next(P::Initialized), Some(P::Clarification));
        assert_eq!(scaffold.next(P::Validation), Some(P::Completed));
        assert_eq!(scaffold.next(P::Completed), None);
    }

    #[test]
    fn scaffold_has_no_loop_back() {
        use ScaffoldPhase as P;
        let mut fsm = walk(
            ScaffoldWorkflow::default(),
            &[P::Clarification, P::Analysis, P::Synthesis, P::Validation],
        );
        for target in ScaffoldPhase::ALL {
            assert!(!fsm.loop_back(*target));
        }
    }

    #[test]
    fn phase_names_parse_loosely() {
        assert_eq!(AlgorithmPhase::parse_name("IDEAL-STATE"), Some(AlgorithmPhase::IdealState));
        assert_eq!(AlgorithmPhase::parse_name(" inner_loop "), Some(AlgorithmPhase::InnerLoop));
        assert_eq!(AlgorithmPhase::parse_name("step-8"), None);
        assert_eq!(AlgorithmPhase::InnerLoop.label(), "INNER_LOOP");
        assert_eq!(TddPhase::parse_name("Refactor"), Some(TddPhase::Refactor));
    }

    #[test]
    fn phase_names_match_serde() {
        for phase in AlgorithmPhase::ALL {
            let json = serde_json::to_string(phase).expect("serialize");
            assert_eq!(json, format!("\"{}\"", phase.as_str()));
        }
    }
}
