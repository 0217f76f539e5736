mod helpers;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use helpers::{FailingToneRules, HarnessBuilder, HistoryFault, ScriptedChat};
use recollect::memory::types::Direction;
use recollect::server::{self, AppState, WebhookPayload, PROBE_IDENTITY};
use serde_json::{json, Value};
use std::sync::Arc;

const ALICE: &str = "15550000001@c.us";

fn payload(value: Value) -> Json<WebhookPayload> {
    Json(serde_json::from_value(value).unwrap())
}

fn message(from: &str, body: &str, from_me: bool) -> Json<WebhookPayload> {
    payload(json!({
        "event_type": "message_received",
        "data": {"from": from, "body": body, "fromMe": from_me, "type": "chat"}
    }))
}

#[tokio::test]
async fn health_reports_running() {
    assert_eq!(server::health().await, "recollect agent running");
}

#[tokio::test]
async fn user_message_is_answered() {
    let h = HarnessBuilder::new(ScriptedChat::replying("Hello!")).build().await;
    let state = AppState {
        processor: h.processor.clone(),
    };

    let (status, Json(body)) = server::incoming(State(state), message(ALICE, "hi", false)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"status": "sent", "delivered": true}));
    assert_eq!(h.delivery.sent.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn own_group_and_empty_events_are_ignored() {
    let h = HarnessBuilder::new(ScriptedChat::replying("Hello!")).build().await;
    let state = AppState {
        processor: h.processor.clone(),
    };

    for request in [
        message(ALICE, "echo of our reply", true),
        message("120363000000000000@g.us", "group chatter", false),
        message("status@broadcast", "story", false),
        payload(json!({"event_type": "message_ack"})),
    ] {
        let (status, Json(body)) = server::incoming(State(state.clone()), request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"status": "ignored"}));
    }

    assert!(h.chat.calls.lock().unwrap().is_empty());
    assert!(h.log.full_log(ALICE).await.unwrap().is_empty());
}

#[tokio::test]
async fn event_without_sender_is_ignored() {
    let h = HarnessBuilder::new(ScriptedChat::replying("Hello!")).build().await;
    let state = AppState {
        processor: h.processor.clone(),
    };

    for request in [
        payload(json!({"data": {"body": "hi", "fromMe": false}})),
        payload(json!({"data": {"from": "  ", "body": "hi", "fromMe": false}})),
    ] {
        let (status, Json(body)) = server::incoming(State(state.clone()), request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"status": "ignored"}));
    }

    assert!(h.chat.calls.lock().unwrap().is_empty());
    assert!(h.delivery.sent.lock().unwrap().is_empty());
}

#[tokio::test]
async fn unreadable_history_pauses_the_webhook() {
    let h = HarnessBuilder::new(ScriptedChat::replying("Hello!"))
        .history_fault(HistoryFault::Reads)
        .build()
        .await;
    let state = AppState {
        processor: h.processor.clone(),
    };

    let (status, Json(body)) = server::incoming(State(state), message(ALICE, "hi", false)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"status": "paused"}));
    assert!(h.delivery.sent.lock().unwrap().is_empty());
}

#[tokio::test]
async fn media_without_caption_is_accepted() {
    let h = HarnessBuilder::new(ScriptedChat::replying("Cute!")).build().await;
    let state = AppState {
        processor: h.processor.clone(),
    };
    let request = payload(json!({
        "data": {
            "from": ALICE,
            "body": "",
            "fromMe": false,
            "media": "https://cdn.example.com/dog.jpg"
        }
    }));

    let (status, _) = server::incoming(State(state), request).await;

    assert_eq!(status, StatusCode::OK);
    let log = h.log.full_log(ALICE).await.unwrap();
    assert_eq!(log[0].media_url.as_deref(), Some("https://cdn.example.com/dog.jpg"));
}

#[tokio::test]
async fn paused_turn_reports_paused() {
    let h = HarnessBuilder::new(ScriptedChat::replying("Hello!"))
        .tone_rules(Arc::new(FailingToneRules))
        .build()
        .await;
    let state = AppState {
        processor: h.processor.clone(),
    };

    let (status, Json(body)) = server::incoming(State(state), message(ALICE, "hi", false)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"status": "paused"}));
    assert_eq!(
        h.log.full_log(ALICE).await.unwrap()[0].direction,
        Direction::InboundIgnored
    );
}

#[tokio::test]
async fn pipeline_failure_is_a_server_error() {
    let h = HarnessBuilder::new(ScriptedChat::failing()).build().await;
    let state = AppState {
        processor: h.processor.clone(),
    };

    let (status, Json(body)) = server::incoming(State(state), message(ALICE, "hi", false)).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, json!({"error": "failed"}));
    assert!(h.delivery.sent.lock().unwrap().is_empty());
}

#[tokio::test]
async fn probe_defaults_to_the_test_identity() {
    let h = HarnessBuilder::new(ScriptedChat::replying("Hello!")).build().await;
    let state = AppState {
        processor: h.processor.clone(),
    };

    let (status, Json(body)) = server::probe(State(state), Bytes::new()).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["identity"], PROBE_IDENTITY);
    assert_eq!(body["persona"]["status"], "resolved");
    assert_eq!(body["persona"]["source"], "fallback");
    assert_eq!(body["semantic_memories"], json!([]));
}

#[tokio::test]
async fn probe_accepts_identity_and_message() {
    let h = HarnessBuilder::new(ScriptedChat::replying("Hello!")).build().await;
    h.tone.set_for_identity(ALICE, "Be cheerful.").await.unwrap();
    let state = AppState {
        processor: h.processor.clone(),
    };
    let body = Bytes::from(json!({"identity": ALICE, "message": "hello"}).to_string());

    let (status, Json(body)) = server::probe(State(state), body).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["identity"], ALICE);
    assert_eq!(body["persona"]["instruction"], "Be cheerful.");
}

#[tokio::test]
async fn malformed_probe_body_is_rejected() {
    let h = HarnessBuilder::new(ScriptedChat::replying("Hello!")).build().await;
    let state = AppState {
        processor: h.processor.clone(),
    };

    let (status, Json(body)) = server::probe(State(state), Bytes::from_static(b"{not json")).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().starts_with("invalid probe body"));
}
