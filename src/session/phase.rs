//! Session phases.

use serde::Serialize;

/// One stage of the session state machine.
///
/// The sequence is `New → Register → Running → Question → Running → …`
/// with `End` terminal; only the orchestrator's run task and `reset`
/// move between phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    /// Fresh session; nothing has started yet.
    New,
    /// The join window is open; registrations are accepted.
    Register,
    /// Between questions: transitions and the score display.
    Running,
    /// A question's answer window is open.
    Question,
    /// The session is over.
    End,
}

impl Phase {
    /// Stable lowercase name, used in logs, metrics, and payloads.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Register => "register",
            Self::Running => "running",
            Self::Question => "question",
            Self::End => "end",
        }
    }

    /// True for the terminal phase.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::End)
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
