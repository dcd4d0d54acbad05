//! The session orchestrator: phase state machine, timing windows, and
//! latency-weighted scoring.

pub mod engine;
pub mod phase;
pub mod scoring;

pub use engine::{AnswerSubmission, Session, SessionSettings, SessionStatus};
pub use phase::Phase;
