//! Identity reuse: a new device presenting an identity that already earned
//! the gate is rebound to the prior viewer instead of creating a fresh one.

mod common;

use common::spawn_app;
use doc_store::Mutation;
use event_control::models::{AccessMode, EventType};
use event_control::services::access::RegisterInput;
use event_control::services::events::CreateEventInput;
use serde_json::json;

fn paid_input() -> CreateEventInput {
    CreateEventInput {
        title: "Masterclass".to_string(),
        description: "Ticketed".to_string(),
        event_type: EventType::Live,
        access_mode: AccessMode::PaidAccess,
        start_time: None,
        end_time: None,
        s3_key: None,
        video_config: None,
        access_password: Some("pwd".to_string()),
        payment_amount: serde_json::Number::from_f64(25.0),
        currency: Some("EUR".to_string()),
        registration_fields: None,
    }
}

fn register_with_email(client_viewer_id: &str, email: &str) -> RegisterInput {
    RegisterInput {
        client_viewer_id: client_viewer_id.to_string(),
        email: Some(email.to_string()),
        name: Some("Grace Hopper".to_string()),
        ..Default::default()
    }
}

#[tokio::test]
async fn paid_identity_rebinds_to_prior_viewer() {
    let app = spawn_app();
    let event = app.state.events.create("admin-1", paid_input()).await.unwrap();

    app.state
        .access
        .register(&event.event_id, register_with_email("c5a", "e@x"))
        .await
        .unwrap();
    // The purchase lands on the first device.
    app.viewer_repo()
        .update(
            &event.event_id,
            "c5a",
            vec![
                Mutation::Set("isPaidViewer", json!(true)),
                Mutation::Set("paymentStatus", json!("succeeded")),
            ],
        )
        .await
        .unwrap();

    let outcome = app
        .state
        .access
        .register(&event.event_id, register_with_email("c5b", "e@x"))
        .await
        .unwrap();
    assert!(outcome.identity_reused);
    assert_eq!(outcome.resolved_client_viewer_id, "c5a");
    assert!(outcome.steps.payment_verified);

    // No second viewer record was created.
    let stray = app.viewer_repo().get(&event.event_id, "c5b").await.unwrap();
    assert!(stray.is_none());
}

#[tokio::test]
async fn unsatisfied_identity_is_not_reused() {
    let app = spawn_app();
    let event = app.state.events.create("admin-1", paid_input()).await.unwrap();

    // First device registered but never paid.
    app.state
        .access
        .register(&event.event_id, register_with_email("c5a", "e@x"))
        .await
        .unwrap();

    let outcome = app
        .state
        .access
        .register(&event.event_id, register_with_email("c5b", "e@x"))
        .await
        .unwrap();
    assert!(!outcome.identity_reused);
    assert_eq!(outcome.resolved_client_viewer_id, "c5b");
    assert!(app
        .viewer_repo()
        .get(&event.event_id, "c5b")
        .await
        .unwrap()
        .is_some());
}

#[tokio::test]
async fn email_identity_reuse_matches_normalized_form() {
    let app = spawn_app();
    let event = app
        .state
        .events
        .create(
            "admin-1",
            CreateEventInput {
                access_mode: AccessMode::EmailAccess,
                access_password: None,
                payment_amount: None,
                currency: None,
                ..paid_input()
            },
        )
        .await
        .unwrap();

    app.state
        .access
        .register(
            &event.event_id,
            RegisterInput {
                client_viewer_id: "c6a".to_string(),
                email: Some("User@Mail.io".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    // Same mailbox with different casing and padding, different name so the
    // composite identity key differs and the email fallback has to match.
    let outcome = app
        .state
        .access
        .register(
            &event.event_id,
            RegisterInput {
                client_viewer_id: "c6b".to_string(),
                email: Some("  user@mail.IO ".to_string()),
                name: Some("Someone Else".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert!(outcome.identity_reused);
    assert_eq!(outcome.resolved_client_viewer_id, "c6a");

    // The reclaimed record absorbed the newer profile fields.
    let viewer = app.viewer_repo().get(&event.event_id, "c6a").await.unwrap().unwrap();
    assert_eq!(viewer.name.as_deref(), Some("Someone Else"));
    assert_eq!(viewer.normalized_email.as_deref(), Some("user@mail.io"));
}

#[tokio::test]
async fn existing_device_never_triggers_reuse() {
    let app = spawn_app();
    let event = app
        .state
        .events
        .create(
            "admin-1",
            CreateEventInput {
                access_mode: AccessMode::EmailAccess,
                access_password: None,
                payment_amount: None,
                currency: None,
                ..paid_input()
            },
        )
        .await
        .unwrap();

    app.state
        .access
        .register(&event.event_id, register_with_email("c7a", "shared@x"))
        .await
        .unwrap();
    app.state
        .access
        .register(&event.event_id, register_with_email("c7b", "other@x"))
        .await
        .unwrap();

    // The second device re-registers with the first device's email. It has
    // its own record, so it keeps its identity instead of rebinding.
    let outcome = app
        .state
        .access
        .register(&event.event_id, register_with_email("c7b", "shared@x"))
        .await
        .unwrap();
    assert!(!outcome.identity_reused);
    assert_eq!(outcome.resolved_client_viewer_id, "c7b");
}
