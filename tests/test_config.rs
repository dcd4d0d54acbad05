//! Configuration flowing through to a running gateway, wired the same
//! way the serve command does it.

mod common;

use std::sync::Arc;

use quizroom::bank::QuestionBank;
use quizroom::config;
use quizroom::gateway::build_router;
use quizroom::session::Session;
use serde_json::json;
use tower::ServiceExt;

use common::{fixture_path, get, post_json, read_json};

#[tokio::test]
async fn loaded_config_drives_the_gateway() {
    let loaded = config::load(&fixture_path("session.yaml")).unwrap();
    assert!(loaded.warnings.is_empty());
    assert_eq!(loaded.server.bind, "127.0.0.1:0");

    let bank = QuestionBank::from_defs(&loaded.questions);
    bank.reshuffle();
    let session = Arc::new(Session::new(bank, loaded.settings));
    let app = build_router(Arc::clone(&session));

    let status = read_json(app.clone().oneshot(get("/api/session")).await.unwrap()).await;
    assert_eq!(status["phase"], "new");
    assert_eq!(status["total"], 3);

    let response = app
        .clone()
        .oneshot(post_json("/api/players", &json!({ "nickname": "ada" })))
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 201);
    assert_eq!(session.settings().register_wait_time.as_secs(), 2);
    assert_eq!(session.settings().question_time.as_secs(), 20);
}

#[tokio::test]
async fn oversized_total_clamps_to_the_bank() {
    let loaded = config::load(&fixture_path("session.yaml")).unwrap();
    let mut settings = loaded.settings;
    settings.total_questions = 99;

    let session = Session::new(QuestionBank::from_defs(&loaded.questions), settings);
    assert_eq!(session.settings().total_questions, loaded.questions.len());
}
