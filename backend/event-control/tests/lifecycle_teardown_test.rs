//! Event lifecycle: creation validation, update invariants, provisioning,
//! and the two-phase teardown with failure resume.

mod common;

use common::spawn_app;
use event_control::error::AppError;
use event_control::models::{AccessMode, EventStatus, EventType};
use event_control::services::events::{CreateEventInput, UpdateEventInput};
use event_control::util::Clock;

fn base_input(event_type: EventType, access_mode: AccessMode) -> CreateEventInput {
    CreateEventInput {
        title: "Keynote".to_string(),
        description: "Annual keynote".to_string(),
        event_type,
        access_mode,
        start_time: None,
        end_time: None,
        s3_key: None,
        video_config: None,
        access_password: None,
        payment_amount: None,
        currency: None,
        registration_fields: None,
    }
}

fn position(calls: &[String], prefix: &str) -> usize {
    calls
        .iter()
        .position(|c| c.starts_with(prefix))
        .unwrap_or_else(|| panic!("no call starting with {prefix:?} in {calls:?}"))
}

#[tokio::test]
async fn provision_then_teardown_dismantles_in_order() {
    let app = spawn_app();
    let event = app
        .state
        .events
        .create("admin-1", base_input(EventType::Live, AccessMode::FreeAccess))
        .await
        .unwrap();
    assert_eq!(event.status, EventStatus::Live);

    app.state.events.provision(&event.event_id).await.unwrap();
    let provisioned = app.state.events.get(&event.event_id).await.unwrap();
    assert!(provisioned.input_id.is_some());
    assert!(provisioned.live_channel_id.is_some());
    assert!(provisioned.packager_endpoint_id.is_some());
    assert!(provisioned.distribution_id.is_some());
    assert_eq!(
        provisioned.cloud_front_url.as_deref(),
        Some(format!("https://cdn/{}/index.m3u8", event.event_id).as_str())
    );

    let marked = app.state.events.mark_for_deletion(&event.event_id).await.unwrap();
    assert!(marked.is_deletion_in_progress);

    // Second delete request while the pipeline is running.
    let conflict = app.state.events.mark_for_deletion(&event.event_id).await;
    assert!(matches!(conflict, Err(AppError::Conflict(_))));

    app.state.events.teardown(marked).await;
    assert!(app.event_repo().get(&event.event_id).await.unwrap().is_none());

    let calls = app.media.call_names();
    let create_channel = position(&calls, "create_live_channel");
    let start = position(&calls, "start_channel");
    let stop = position(&calls, "stop_channel");
    assert!(create_channel < start);
    assert!(start < stop);
    let delete_channel = position(&calls, "delete_channel");
    let delete_input = position(&calls, "delete_input ");
    let delete_group = position(&calls, "delete_input_security_group");
    let delete_endpoint = position(&calls, "delete_packager_endpoint");
    let delete_packager = position(&calls, "delete_packager_channel");
    let behaviors = position(&calls, "remove_cache_behaviors");
    let origin = position(&calls, "remove_origin");
    assert!(stop < delete_channel);
    assert!(delete_channel < delete_input);
    assert!(delete_input < delete_group);
    assert!(delete_group < delete_endpoint);
    assert!(delete_endpoint < delete_packager);
    assert!(delete_packager < behaviors);
    assert!(behaviors < origin);

    let behaviors_call = &calls[behaviors];
    assert!(behaviors_call.ends_with(&format!("/{}", event.event_id)));
}

#[tokio::test]
async fn failed_teardown_records_error_and_resumes() {
    let app = spawn_app();
    let event = app
        .state
        .events
        .create("admin-1", base_input(EventType::Live, AccessMode::FreeAccess))
        .await
        .unwrap();
    app.state.events.provision(&event.event_id).await.unwrap();

    *app.media.fail_on.lock().unwrap() = Some("delete_packager_endpoint".to_string());
    let marked = app.state.events.mark_for_deletion(&event.event_id).await.unwrap();
    app.state.events.teardown(marked).await;

    // The record survives with the failure noted and the guard released.
    let failed = app.state.events.get(&event.event_id).await.unwrap();
    assert!(!failed.is_deletion_in_progress);
    let error = failed.deletion_error.as_deref().unwrap();
    assert!(error.contains("injected"));
    assert!(failed.deletion_failed_at.is_some());

    // Retry picks up whatever still exists; earlier stages are already gone
    // and report NotFound, which counts as done.
    *app.media.fail_on.lock().unwrap() = None;
    let marked = app.state.events.mark_for_deletion(&event.event_id).await.unwrap();
    assert!(marked.deletion_error.is_none());
    app.state.events.teardown(marked).await;
    assert!(app.event_repo().get(&event.event_id).await.unwrap().is_none());
}

#[tokio::test]
async fn vod_teardown_purges_upload_and_output_prefixes() {
    let app = spawn_app();
    let event = app
        .state
        .events
        .create(
            "admin-1",
            CreateEventInput {
                s3_key: Some("uploads/raw/master.mp4".to_string()),
                ..base_input(EventType::Vod, AccessMode::FreeAccess)
            },
        )
        .await
        .unwrap();

    let marked = app.state.events.mark_for_deletion(&event.event_id).await.unwrap();
    app.state.events.teardown(marked).await;

    assert!(app.event_repo().get(&event.event_id).await.unwrap().is_none());
    let purged = app.storage.purged.lock().unwrap().clone();
    assert!(purged.contains(&("vod-test".to_string(), "uploads/raw/".to_string())));
    assert!(purged.contains(&(
        "vod-test".to_string(),
        format!("vod/{}/", event.event_id)
    )));
    assert!(app.media.call_names().is_empty());
}

#[tokio::test]
async fn creation_validation_rejects_incoherent_input() {
    let app = spawn_app();

    // Scheduled events need a strictly future start.
    let missing_start = app
        .state
        .events
        .create("admin-1", base_input(EventType::Scheduled, AccessMode::FreeAccess))
        .await;
    assert!(matches!(missing_start, Err(AppError::InvalidInput(_))));

    let at_now = app
        .state
        .events
        .create(
            "admin-1",
            CreateEventInput {
                start_time: Some(app.clock.now().to_rfc3339()),
                ..base_input(EventType::Scheduled, AccessMode::FreeAccess)
            },
        )
        .await;
    assert!(matches!(at_now, Err(AppError::InvalidInput(_))));

    let in_past = app
        .state
        .events
        .create(
            "admin-1",
            CreateEventInput {
                start_time: Some((app.clock.now() - chrono::Duration::hours(1)).to_rfc3339()),
                ..base_input(EventType::Scheduled, AccessMode::FreeAccess)
            },
        )
        .await;
    assert!(matches!(in_past, Err(AppError::InvalidInput(_))));

    let no_key = app
        .state
        .events
        .create("admin-1", base_input(EventType::Vod, AccessMode::FreeAccess))
        .await;
    assert!(matches!(no_key, Err(AppError::InvalidInput(_))));

    let no_password = app
        .state
        .events
        .create("admin-1", base_input(EventType::Live, AccessMode::PasswordAccess))
        .await;
    assert!(matches!(no_password, Err(AppError::InvalidInput(_))));

    let no_amount = app
        .state
        .events
        .create(
            "admin-1",
            CreateEventInput {
                access_password: Some("pwd".to_string()),
                currency: Some("USD".to_string()),
                ..base_input(EventType::Live, AccessMode::PaidAccess)
            },
        )
        .await;
    assert!(matches!(no_amount, Err(AppError::InvalidInput(_))));

    let zero_amount = app
        .state
        .events
        .create(
            "admin-1",
            CreateEventInput {
                access_password: Some("pwd".to_string()),
                payment_amount: serde_json::Number::from_f64(0.0),
                currency: Some("USD".to_string()),
                ..base_input(EventType::Live, AccessMode::PaidAccess)
            },
        )
        .await;
    assert!(matches!(zero_amount, Err(AppError::InvalidInput(_))));

    let bad_currency = app
        .state
        .events
        .create(
            "admin-1",
            CreateEventInput {
                access_password: Some("pwd".to_string()),
                payment_amount: serde_json::Number::from_f64(5.0),
                currency: Some("XXX".to_string()),
                ..base_input(EventType::Live, AccessMode::PaidAccess)
            },
        )
        .await;
    assert!(matches!(bad_currency, Err(AppError::InvalidInput(_))));
}

#[tokio::test]
async fn update_invariants_hold() {
    let app = spawn_app();
    let live = app
        .state
        .events
        .create("admin-1", base_input(EventType::Live, AccessMode::FreeAccess))
        .await
        .unwrap();

    let retype = app
        .state
        .events
        .update(
            &live.event_id,
            UpdateEventInput {
                event_type: Some(EventType::Vod),
                ..Default::default()
            },
        )
        .await;
    assert!(matches!(retype, Err(AppError::InvalidTransition(_))));

    // Scheduling fields are frozen once the event is not scheduled.
    let reschedule = app
        .state
        .events
        .update(
            &live.event_id,
            UpdateEventInput {
                start_time: Some((app.clock.now() + chrono::Duration::hours(2)).to_rfc3339()),
                ..Default::default()
            },
        )
        .await;
    assert!(matches!(reschedule, Err(AppError::InvalidTransition(_))));

    let retitled = app
        .state
        .events
        .update(
            &live.event_id,
            UpdateEventInput {
                title: Some("Keynote (rescheduled)".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(retitled.title, "Keynote (rescheduled)");

    let scheduled = app
        .state
        .events
        .create(
            "admin-1",
            CreateEventInput {
                start_time: Some((app.clock.now() + chrono::Duration::hours(1)).to_rfc3339()),
                ..base_input(EventType::Scheduled, AccessMode::FreeAccess)
            },
        )
        .await
        .unwrap();
    let past_start = app
        .state
        .events
        .update(
            &scheduled.event_id,
            UpdateEventInput {
                start_time: Some((app.clock.now() - chrono::Duration::hours(1)).to_rfc3339()),
                ..Default::default()
            },
        )
        .await;
    assert!(matches!(past_start, Err(AppError::InvalidInput(_))));
}

#[tokio::test]
async fn mode_switch_revalidates_gating_fields() {
    let app = spawn_app();
    let event = app
        .state
        .events
        .create("admin-1", base_input(EventType::Live, AccessMode::FreeAccess))
        .await
        .unwrap();

    // Switching to paid without the paid fields is rejected.
    let incomplete = app
        .state
        .events
        .update(
            &event.event_id,
            UpdateEventInput {
                access_mode: Some(AccessMode::PaidAccess),
                access_password: Some("pwd".to_string()),
                ..Default::default()
            },
        )
        .await;
    assert!(matches!(incomplete, Err(AppError::InvalidInput(_))));

    let upgraded = app
        .state
        .events
        .update(
            &event.event_id,
            UpdateEventInput {
                access_mode: Some(AccessMode::PaidAccess),
                access_password: Some("pwd".to_string()),
                payment_amount: serde_json::Number::from_f64(15.0),
                currency: Some("gbp".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(upgraded.access_mode, AccessMode::PaidAccess);
    assert_eq!(upgraded.payment_amount, Some(15.0));
    assert_eq!(upgraded.currency.as_deref(), Some("GBP"));
    let hash = upgraded.access_password_hash.as_deref().unwrap();
    assert!(hash.starts_with("$2"));

    // A later unrelated patch keeps the stored gating fields coherent.
    let retitled = app
        .state
        .events
        .update(
            &event.event_id,
            UpdateEventInput {
                access_mode: Some(AccessMode::PaidAccess),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(retitled.payment_amount, Some(15.0));
    assert_eq!(retitled.currency.as_deref(), Some("GBP"));
}
