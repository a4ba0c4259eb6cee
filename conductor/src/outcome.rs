//! What a command hands back to the CLI.

/// Result of one engine invocation. Only `main` maps these to exit codes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Text for the external actor or driver; work continues.
    Directive(String),
    /// The workflow or flow reached its end.
    Complete(String),
    /// Subtasks exist but none is ready.
    Waiting(String),
    /// Automatic progress stopped; a human reviewer decides.
    Escalated(String),
    /// A required artifact is missing. Nothing advanced.
    Blocked(String),
}

impl Outcome {
    pub fn text(&self) -> &str {
        match self {
            Self::Directive(text)
            | Self::Complete(text)
            | Self::Waiting(text)
            | Self::Escalated(text)
            | Self::Blocked(text) => text,
        }
    }

    pub fn is_directive(&self) -> bool {
        matches!(self, Self::Directive(_))
    }
}
