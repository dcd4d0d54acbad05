//! `serve` command handler.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::bank::QuestionBank;
use crate::cli::args::ServeArgs;
use crate::config;
use crate::error::QuizRoomError;
use crate::gateway;
use crate::session::Session;

/// Starts the trivia session server.
///
/// Loads and validates the configuration, installs the metrics recorder
/// when a metrics port is configured, builds the shuffled question bank,
/// and serves the gateway until `cancel` fires.
///
/// # Errors
///
/// Returns a config error if the configuration fails to load or
/// validate, or a gateway error if the server cannot bind or fails
/// while running.
pub async fn run(args: &ServeArgs, cancel: CancellationToken) -> Result<(), QuizRoomError> {
    info!(config = %args.config.display(), "loading configuration");
    let loaded = config::load(&args.config)?;
    for warning in &loaded.warnings {
        warn!("{warning}");
    }

    // CLI flags win over the config file
    let metrics_port = args.metrics_port.or(loaded.server.metrics_port);
    if let Some(port) = metrics_port {
        crate::observability::init_metrics(Some(port))?;
        info!(port, "Prometheus metrics endpoint started");
    }

    let bank = QuestionBank::from_defs(&loaded.questions);
    bank.reshuffle();
    info!(questions = bank.len(), "question bank ready");

    let session = Arc::new(Session::new(bank, loaded.settings));
    info!(
        total = session.settings().total_questions,
        question_time = ?session.settings().question_time,
        score_time = ?session.settings().score_time,
        register_wait = ?session.settings().register_wait_time,
        "session ready"
    );

    let bind = args.bind.as_deref().unwrap_or(&loaded.server.bind);
    gateway::run(bind, session, cancel).await?;
    Ok(())
}
