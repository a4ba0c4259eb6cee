//! The persisted session record.
//!
//! One session is one FSM instance plus whatever that workflow needs to
//! survive between invocations. The record is serialized whole; nothing is
//! stored incrementally.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use super::chain::ChainRecord;
use super::completeness::CompletenessScore;
use super::fsm::Fsm;
use super::ideal_state::IdealState;
use super::phases::{
    AlgorithmPhase, AlgorithmWorkflow, DecomposePhase, DecomposeWorkflow, PhaseName,
    ScaffoldMode, ScaffoldPhase, ScaffoldWorkflow, TddPhase, TddWorkflow,
};
use super::subtasks::SubtaskGraph;
use super::verification::VerificationResult;

/// Bumped whenever the on-disk shape changes incompatibly.
pub const SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    InProgress,
    /// Paused for user input; resumable.
    Halted,
    /// Automatic progress stopped; a human reviewer owns the next move.
    Escalated,
    Completed,
}

impl SessionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::InProgress => "in_progress",
            Self::Halted => "halted",
            Self::Escalated => "escalated",
            Self::Completed => "completed",
        }
    }
}

/// Why an algorithm session stopped and where it picks up again.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HaltInfo {
    pub reason: String,
    #[serde(default)]
    pub questions: Vec<String>,
    pub resume_phase: AlgorithmPhase,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AlgorithmState {
    pub fsm: Fsm<AlgorithmWorkflow>,
    #[serde(default)]
    pub ideal_state: Option<IdealState>,
    /// Completed interview passes.
    #[serde(default)]
    pub interview_iteration: u32,
    /// Latest completeness snapshot only.
    #[serde(default)]
    pub completeness: Option<CompletenessScore>,
    /// Verification passes so far. Incremented before each loop-back.
    #[serde(default)]
    pub verify_iteration: u32,
    /// Append-only.
    #[serde(default)]
    pub verification_history: Vec<VerificationResult>,
    #[serde(default)]
    pub halt: Option<HaltInfo>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TddState {
    pub fsm: Fsm<TddWorkflow>,
    /// File or component under test, if the caller named one.
    #[serde(default)]
    pub target: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScaffoldState {
    pub fsm: Fsm<ScaffoldWorkflow>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecomposeState {
    pub fsm: Fsm<DecomposeWorkflow>,
    #[serde(default)]
    pub subtasks: SubtaskGraph,
}

/// Workflow payload; `kind` is the serde tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WorkflowState {
    Algorithm(AlgorithmState),
    Tdd(TddState),
    Scaffold(ScaffoldState),
    Decompose(DecomposeState),
}

impl WorkflowState {
    pub fn algorithm() -> Self {
        Self::Algorithm(AlgorithmState::default())
    }

    pub fn tdd(target: Option<String>) -> Self {
        Self::Tdd(TddState {
            fsm: Fsm::default(),
            target,
        })
    }

    pub fn scaffold(mode: ScaffoldMode) -> Self {
        Self::Scaffold(ScaffoldState {
            fsm: Fsm::new(ScaffoldWorkflow::new(mode)),
        })
    }

    pub fn decompose() -> Self {
        Self::Decompose(DecomposeState::default())
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Algorithm(_) => "algorithm",
            Self::Tdd(_) => "tdd",
            Self::Scaffold(_) => "scaffold",
            Self::Decompose(_) => "decompose",
        }
    }

    /// Current phase name, snake_case.
    pub fn phase_name(&self) -> &'static str {
        match self {
            Self::Algorithm(state) => state.fsm.current().as_str(),
            Self::Tdd(state) => state.fsm.current().as_str(),
            Self::Scaffold(state) => state.fsm.current().as_str(),
            Self::Decompose(state) => state.fsm.current().as_str(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        match self {
            Self::Algorithm(state) => state.fsm.current() == AlgorithmPhase::Completed,
            Self::Tdd(state) => state.fsm.current() == TddPhase::Completed,
            Self::Scaffold(state) => state.fsm.current() == ScaffoldPhase::Completed,
            Self::Decompose(state) => state.fsm.current() == DecomposePhase::Completed,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub schema_version: u32,
    pub id: String,
    pub status: SessionStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub query: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    pub workflow: WorkflowState,
    /// Flow run in progress, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chain: Option<ChainRecord>,
    /// Unvalidated passthrough for callers. Never read for control flow.
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl Session {
    pub fn new(query: impl Into<String>, workflow: WorkflowState, now: DateTime<Utc>) -> Self {
        Self::with_id(Uuid::new_v4().to_string(), query, workflow, now)
    }

    pub fn with_id(
        id: impl Into<String>,
        query: impl Into<String>,
        workflow: WorkflowState,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            id: id.into(),
            status: SessionStatus::InProgress,
            created_at: now,
            updated_at: now,
            query: query.into(),
            parent_id: None,
            workflow,
            chain: None,
            metadata: Map::new(),
        }
    }

    pub fn with_parent(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }

    /// First eight characters of the id, used in human-facing labels.
    pub fn short_id(&self) -> &str {
        self.id.get(..8).unwrap_or(&self.id)
    }

    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = now;
    }

    pub fn algorithm(&self) -> Option<&AlgorithmState> {
        match &self.workflow {
            WorkflowState::Algorithm(state) => Some(state),
            _ => None,
        }
    }

    pub fn algorithm_mut(&mut self) -> Option<&mut AlgorithmState> {
        match &mut self.workflow {
            WorkflowState::Algorithm(state) => Some(state),
            _ => None,
        }
    }

    pub fn tdd_mut(&mut self) -> Option<&mut TddState> {
        match &mut self.workflow {
            WorkflowState::Tdd(state) => Some(state),
            _ => None,
        }
    }

    pub fn scaffold_mut(&mut self) -> Option<&mut ScaffoldState> {
        match &mut self.workflow {
            WorkflowState::Scaffold(state) => Some(state),
            _ => None,
        }
    }

    pub fn decompose(&self) -> Option<&DecomposeState> {
        match &self.workflow {
            WorkflowState::Decompose(state) => Some(state),
            _ => None,
        }
    }

    pub fn decompose_mut(&mut self) -> Option<&mut DecomposeState> {
        match &mut self.workflow {
            WorkflowState::Decompose(state) => Some(state),
            _ => None,
        }
    }

    /// True while the engine may still hand out directives on its own.
    pub fn is_active(&self) -> bool {
        self.status == SessionStatus::InProgress
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::actor::Actor;
    use crate::core::registry::ids;

    fn at(seconds: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(1_767_225_600 + seconds, 0).expect("timestamp")
    }

    #[test]
    fn new_session_starts_in_progress_at_initial_phase() {
        let session = Session::new("build a cache", WorkflowState::algorithm(), at(0));
        assert_eq!(session.schema_version, SCHEMA_VERSION);
        assert_eq!(session.status, SessionStatus::InProgress);
        assert_eq!(session.workflow.kind(), "algorithm");
        assert_eq!(session.workflow.phase_name(), "initialized");
        assert_eq!(session.short_id().len(), 8);
        assert!(Uuid::parse_str(&session.id).is_ok());
    }

    #[test]
    fn workflow_kind_is_the_serde_tag() {
        let session = Session::with_id("s1", "q", WorkflowState::tdd(Some("lib.rs".into())), at(0));
        let value = serde_json::to_value(&session).expect("serialize");
        assert_eq!(value["workflow"]["kind"], "tdd");
        assert_eq!(value["workflow"]["fsm"]["current"], "initialized");
        assert_eq!(value["status"], "in_progress");
        assert!(value.get("parent_id").is_none());
    }

    #[test]
    fn populated_session_round_trips() {
        let mut session = Session::with_id("s1", "q", WorkflowState::algorithm(), at(0))
            .with_parent("p1");
        {
            let state = session.algorithm_mut().expect("algorithm");
            assert!(state.fsm.transition(AlgorithmPhase::Gather));
            state.interview_iteration = 2;
            state.ideal_state = Some(IdealState {
                objective: Some("ship".to_string()),
                ..IdealState::default()
            });
            state.halt = Some(HaltInfo {
                reason: "need input".to_string(),
                questions: vec!["which db?".to_string()],
                resume_phase: AlgorithmPhase::Gather,
            });
        }
        let mut chain = ChainRecord::new(ids::GATHER);
        chain.mark_first_invocation(Actor::Research);
        session.chain = Some(chain);
        session
            .metadata
            .insert("ticket".to_string(), Value::String("ABC-1".to_string()));
        session.touch(at(30));

        let json = serde_json::to_string_pretty(&session).expect("serialize");
        let back: Session = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, session);
        assert_eq!(back.updated_at, at(30));
    }

    #[test]
    fn accessors_match_kind() {
        let mut session = Session::with_id("d", "q", WorkflowState::decompose(), at(0));
        assert!(session.algorithm().is_none());
        assert!(session.decompose_mut().is_some());
        assert!(!session.workflow.is_terminal());
    }
}
