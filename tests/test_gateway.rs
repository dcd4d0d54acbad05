//! Full game flows driven through the HTTP gateway on a paused clock.

mod common;

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::http::StatusCode;
use quizroom::gateway::build_router;
use quizroom::session::Session;
use serde_json::json;
use tower::ServiceExt;

use common::{advance, answer_for, fast_settings, get, post_json, read_json, sample_bank, settle};

fn game() -> Router {
    let session = Arc::new(Session::new(sample_bank(), fast_settings()));
    build_router(session)
}

#[tokio::test(start_paused = true)]
async fn whole_game_over_the_api() {
    let app = game();

    // two players join; the first contact opens the session
    for name in ["ada", "brin"] {
        let response = app
            .clone()
            .oneshot(post_json("/api/players", &json!({ "nickname": name })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED, "join for {name}");
    }
    settle().await;
    let status = read_json(app.clone().oneshot(get("/api/session")).await.unwrap()).await;
    assert_eq!(status["phase"], "register");
    assert_eq!(status["waiting"], true);
    assert_eq!(status["total"], 2);

    // the join window closes and the first question opens
    advance(Duration::from_secs(2)).await;
    let response = app
        .clone()
        .oneshot(post_json("/api/players", &json!({ "nickname": "late" })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let prompt = read_json(app.clone().oneshot(get("/api/question")).await.unwrap()).await;
    let question_id = prompt["id"].as_str().unwrap().to_owned();
    let right = answer_for(prompt["statement"].as_str().unwrap());
    let wrong = prompt["options"]
        .as_array()
        .unwrap()
        .iter()
        .map(|option| option.as_str().unwrap())
        .find(|&option| option != right)
        .unwrap()
        .to_owned();

    // ada answers right at the full window and gets the updated tallies
    let response = app
        .clone()
        .oneshot(post_json(
            "/api/answers",
            &json!({ "player": "ada", "question_id": question_id, "option": right }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let report = read_json(response).await;
    let chosen = report["options"]
        .as_array()
        .unwrap()
        .iter()
        .find(|option| option["label"] == json!(right))
        .unwrap();
    assert_eq!(chosen["count"], 1);
    assert_eq!(chosen["correct"], true);

    let response = app
        .clone()
        .oneshot(post_json(
            "/api/answers",
            &json!({ "player": "brin", "question_id": question_id, "option": wrong }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // ride out the rest of the game without further answers
    advance(Duration::from_secs(5)).await; // first window closes
    advance(Duration::from_secs(3)).await; // score pause
    advance(Duration::from_secs(5)).await; // last window closes
    advance(Duration::from_secs(2)).await; // closing grace

    let status = read_json(app.clone().oneshot(get("/api/session")).await.unwrap()).await;
    assert_eq!(status["phase"], "end");
    assert_eq!(status["ended"], true);

    let standings = read_json(app.clone().oneshot(get("/api/standings")).await.unwrap()).await;
    assert_eq!(standings[0]["nickname"], "ada");
    assert_eq!(standings[0]["score"], 4);
    assert_eq!(standings[1]["nickname"], "brin");
    assert_eq!(standings[1]["score"], 0);

    // the last question stays visible after the end
    let response = app.clone().oneshot(get("/api/question")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // a reset clears the board and reopens registration
    let response = app
        .clone()
        .oneshot(post_json("/api/session/reset", &json!({})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let applied = read_json(response).await;
    assert_eq!(applied["total_questions"], 2);
    assert_eq!(applied["question_time_secs"], 5);

    let response = app.clone().oneshot(get("/api/question")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let status = read_json(app.clone().oneshot(get("/api/session")).await.unwrap()).await;
    assert_eq!(status["phase"], "new");

    let response = app
        .clone()
        .oneshot(post_json("/api/players", &json!({ "nickname": "ada" })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
}

#[tokio::test(start_paused = true)]
async fn stale_answers_after_the_question_advances_are_silent() {
    let app = game();

    let response = app
        .clone()
        .oneshot(post_json("/api/players", &json!({ "nickname": "ada" })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    settle().await;
    advance(Duration::from_secs(2)).await;

    let first = read_json(app.clone().oneshot(get("/api/question")).await.unwrap()).await;
    let first_id = first["id"].as_str().unwrap().to_owned();

    // through the first window and the score pause into question two
    advance(Duration::from_secs(5)).await;
    advance(Duration::from_secs(3)).await;
    let second = read_json(app.clone().oneshot(get("/api/question")).await.unwrap()).await;
    assert_ne!(second["id"].as_str().unwrap(), first_id);

    // the superseded id is dropped without a report
    let response = app
        .clone()
        .oneshot(post_json(
            "/api/answers",
            &json!({ "player": "ada", "question_id": first_id, "option": "whatever" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    // the live question still accepts the answer
    let response = app
        .clone()
        .oneshot(post_json(
            "/api/answers",
            &json!({
                "player": "ada",
                "question_id": second["id"],
                "option": answer_for(second["statement"].as_str().unwrap()),
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let standings = read_json(app.clone().oneshot(get("/api/standings")).await.unwrap()).await;
    assert_eq!(standings[0]["score"], 4);
}

#[tokio::test(start_paused = true)]
async fn event_stream_handshake_is_sse() {
    let app = game();
    for uri in ["/api/events", "/api/events?role=player", "/api/events?role=board"] {
        let response = app.clone().oneshot(get(uri)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK, "handshake for {uri}");
        let content_type = response
            .headers()
            .get("content-type")
            .unwrap()
            .to_str()
            .unwrap();
        assert!(
            content_type.starts_with("text/event-stream"),
            "content type for {uri}: {content_type}"
        );
    }
}
