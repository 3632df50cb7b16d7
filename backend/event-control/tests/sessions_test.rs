//! Session telemetry: start counters, additive heartbeats, and the
//! end-of-session duration reconciliation.

mod common;

use common::spawn_app;
use event_control::error::AppError;
use event_control::models::{AccessMode, EventType, PlaybackType};
use event_control::services::access::RegisterInput;
use event_control::services::events::CreateEventInput;
use event_control::services::sessions::StartSessionInput;
use serde_json::json;

async fn seeded_event(app: &common::TestApp) -> String {
    let event = app
        .state
        .events
        .create(
            "admin-1",
            CreateEventInput {
                title: "Town hall".to_string(),
                description: "All hands".to_string(),
                event_type: EventType::Live,
                access_mode: AccessMode::FreeAccess,
                start_time: None,
                end_time: None,
                s3_key: None,
                video_config: None,
                access_password: None,
                payment_amount: None,
                currency: None,
                registration_fields: None,
            },
        )
        .await
        .unwrap();
    app.state
        .access
        .register(
            &event.event_id,
            RegisterInput {
                client_viewer_id: "c4".to_string(),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    event.event_id
}

fn start_input() -> StartSessionInput {
    StartSessionInput {
        playback_type: PlaybackType::Live,
        device: Some(json!({"os": "ios"})),
        location: None,
        network: None,
    }
}

#[tokio::test]
async fn start_updates_viewer_counters() {
    let app = spawn_app();
    let event_id = seeded_event(&app).await;
    let claims = app.claims(&event_id, "c4", false);

    let before = app.viewer_repo().get(&event_id, "c4").await.unwrap().unwrap();
    assert!(before.first_join_at.is_none());
    assert_eq!(before.total_sessions, 0);

    let session = app
        .state
        .sessions
        .start(&event_id, &claims, start_input())
        .await
        .unwrap();
    assert_eq!(session.duration, 0.0);
    assert!(session.end_time.is_none());
    assert_eq!(session.playback_type, PlaybackType::Live);

    app.state
        .sessions
        .start(&event_id, &claims, start_input())
        .await
        .unwrap();

    let after = app.viewer_repo().get(&event_id, "c4").await.unwrap().unwrap();
    assert_eq!(after.total_sessions, 2);
    assert!(after.first_join_at.is_some());
    assert!(after.last_join_at.is_some());
}

#[tokio::test]
async fn heartbeats_accumulate_and_clamp() {
    let app = spawn_app();
    let event_id = seeded_event(&app).await;
    let claims = app.claims(&event_id, "c4", false);
    let session = app
        .state
        .sessions
        .start(&event_id, &claims, start_input())
        .await
        .unwrap();

    let total = app.state.sessions.heartbeat(&session.session_id, 30.0).await.unwrap();
    assert_eq!(total, 30.0);
    let total = app.state.sessions.heartbeat(&session.session_id, 15.5).await.unwrap();
    assert_eq!(total, 45.5);

    // Hostile or buggy players report garbage; it never subtracts.
    let total = app.state.sessions.heartbeat(&session.session_id, -10.0).await.unwrap();
    assert_eq!(total, 45.5);
    let total = app
        .state
        .sessions
        .heartbeat(&session.session_id, f64::NAN)
        .await
        .unwrap();
    assert_eq!(total, 45.5);
}

#[tokio::test]
async fn end_takes_max_of_accumulated_and_reported() {
    let app = spawn_app();
    let event_id = seeded_event(&app).await;
    let claims = app.claims(&event_id, "c4", false);
    let session = app
        .state
        .sessions
        .start(&event_id, &claims, start_input())
        .await
        .unwrap();
    app.state.sessions.heartbeat(&session.session_id, 60.0).await.unwrap();

    // Reported duration lower than the heartbeat total is ignored.
    let closed = app.state.sessions.end(&session.session_id, 40.0).await.unwrap();
    assert_eq!(closed.duration, 60.0);
    assert!(closed.end_time.is_some());

    let viewer = app.viewer_repo().get(&event_id, "c4").await.unwrap().unwrap();
    assert_eq!(viewer.total_watch_time, 60.0);
}

#[tokio::test]
async fn end_trusts_higher_reported_duration() {
    let app = spawn_app();
    let event_id = seeded_event(&app).await;
    let claims = app.claims(&event_id, "c4", false);
    let session = app
        .state
        .sessions
        .start(&event_id, &claims, start_input())
        .await
        .unwrap();
    app.state.sessions.heartbeat(&session.session_id, 20.0).await.unwrap();

    let closed = app.state.sessions.end(&session.session_id, 90.0).await.unwrap();
    assert_eq!(closed.duration, 90.0);
}

#[tokio::test]
async fn start_requires_registration_and_matching_event() {
    let app = spawn_app();
    let event_id = seeded_event(&app).await;

    let unregistered = app.claims(&event_id, "ghost", false);
    let denied = app
        .state
        .sessions
        .start(&event_id, &unregistered, start_input())
        .await;
    assert!(matches!(denied, Err(AppError::Forbidden(_))));

    let mismatched = app.claims("other-event", "c4", false);
    let denied = app
        .state
        .sessions
        .start(&event_id, &mismatched, start_input())
        .await;
    assert!(matches!(denied, Err(AppError::Forbidden(_))));

    let missing = app.state.sessions.end("no-such-session", 10.0).await;
    assert!(matches!(missing, Err(AppError::NotFound(_))));
}
