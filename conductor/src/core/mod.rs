//! Deterministic, pure logic for the conductor engine.
//!
//! Core modules are free of I/O side effects. They operate on in-memory
//! session data and return deterministic outputs suitable for tests; the
//! orchestration modules at the crate root load, persist and emit.

pub mod actor;
pub mod chain;
pub mod completeness;
pub mod context;
pub mod dynamic;
pub mod feedback;
pub mod flow;
pub mod fsm;
pub mod ideal_state;
pub mod phases;
pub mod registry;
pub mod session;
pub mod subtasks;
pub mod verification;
