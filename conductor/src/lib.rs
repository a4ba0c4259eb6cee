//! Deterministic workflow conductor for external cognitive agents.
//!
//! The conductor never does the work itself. Each invocation loads a session
//! record, advances a phase machine or a flow of actor steps, persists the
//! record, and prints a directive telling the caller what to run next.
//!
//! - **[`core`]**: Pure, deterministic logic (phase machines, flows, chain
//!   bookkeeping, scoring). No I/O, fully testable in isolation.
//! - **[`io`]**: Side-effecting operations (layout, config, session store,
//!   memory files, directive templates).
//!
//! Command modules ([`phase`], [`driver`], [`interview`], [`verify`],
//! [`decompose`], [`tdd`], [`scaffold`]) coordinate core logic with I/O
//! through the chain [`orchestrator`].

pub mod core;
pub mod decompose;
pub mod driver;
pub mod exit_codes;
pub mod interview;
pub mod io;
pub mod logging;
pub mod orchestrator;
pub mod outcome;
pub mod phase;
pub mod scaffold;
pub mod tdd;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
pub mod verify;
pub mod workspace;
