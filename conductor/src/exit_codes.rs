//! Stable exit codes for conductor CLI commands.

/// A directive was emitted, or the command succeeded with nothing to report.
pub const OK: i32 = 0;
/// Invalid input, a missing artifact, or any other error.
pub const INVALID: i32 = 1;
/// The workflow or flow reached its end.
pub const COMPLETE: i32 = 2;
/// Subtasks remain but none has its dependencies met.
pub const WAITING: i32 = 3;
/// Verification escalated to a human reviewer.
pub const ESCALATED: i32 = 4;
