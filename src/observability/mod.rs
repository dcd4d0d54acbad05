//! Observability module.
//!
//! Logging and metrics infrastructure for monitoring `QuizRoom`
//! sessions in operation.

pub mod logging;
pub mod metrics;

pub use logging::{LogFormat, init_logging};
pub use metrics::init_metrics;
