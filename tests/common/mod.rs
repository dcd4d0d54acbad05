//! Shared helpers for the integration tests.

#![allow(dead_code)]

use std::path::PathBuf;
use std::process::Output;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, header};
use axum::response::Response;
use quizroom::bank::{QuestionBank, QuestionDef};
use quizroom::dispatch::{Listener, SessionEvent};
use quizroom::session::SessionSettings;
use serde_json::Value;

/// Question definitions shared by the integration tests.
pub fn sample_defs() -> Vec<QuestionDef> {
    vec![
        QuestionDef {
            statement: "Largest planet?".into(),
            answer: "Jupiter".into(),
            options: vec!["Mars".into(), "Jupiter".into(), "Venus".into()],
        },
        QuestionDef {
            statement: "HTTP status for Not Found?".into(),
            answer: "404".into(),
            options: vec!["400".into(), "404".into(), "410".into()],
        },
        QuestionDef {
            statement: "Smallest prime?".into(),
            answer: "2".into(),
            options: vec!["1".into(), "2".into(), "3".into()],
        },
    ]
}

/// The correct option for a prompt, looked up by statement. Prompts
/// shuffle their option order, so tests resolve answers through the
/// statement rather than by position.
pub fn answer_for(statement: &str) -> String {
    sample_defs()
        .into_iter()
        .find(|def| def.statement == statement)
        .map(|def| def.answer)
        .unwrap_or_else(|| panic!("no sample definition for {statement:?}"))
}

pub fn sample_bank() -> QuestionBank {
    QuestionBank::from_defs(&sample_defs())
}

/// Short windows so paused-clock tests step through a whole game.
pub fn fast_settings() -> SessionSettings {
    SessionSettings {
        total_questions: 2,
        question_time: Duration::from_secs(5),
        score_time: Duration::from_secs(3),
        register_wait_time: Duration::from_secs(2),
    }
}

/// Records every event delivered to its listeners.
#[derive(Clone, Default)]
pub struct EventLog {
    events: Arc<Mutex<Vec<SessionEvent>>>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// A fresh listener allocation feeding this log. Each call returns a
    /// distinct allocation, so one log may watch several channels.
    pub fn listener(&self) -> Listener {
        let events = Arc::clone(&self.events);
        Arc::new(move |event| events.lock().unwrap().push(event.clone()))
    }

    pub fn events(&self) -> Vec<SessionEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn len(&self) -> usize {
        self.events.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Lets spawned session tasks make progress after a paused-clock advance.
pub async fn settle() {
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
}

/// Advances the paused clock, then lets the run task catch up.
pub async fn advance(duration: Duration) {
    tokio::time::advance(duration).await;
    settle().await;
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

pub fn post_json(uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(serde_json::to_vec(body).unwrap()))
        .unwrap()
}

pub async fn read_json(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

/// Runs the quizroom binary to completion with the given arguments.
pub fn spawn_command(args: &[&str]) -> Output {
    std::process::Command::new(env!("CARGO_BIN_EXE_quizroom"))
        .args(args)
        .output()
        .expect("failed to run the quizroom binary")
}

/// Absolute path of a file under `tests/fixtures`.
pub fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name)
}
