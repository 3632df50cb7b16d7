//! Admin event CRUD plus the async delete entry point.

use actix_web::{web, HttpResponse};
use serde_json::json;

use super::{accepted, created, ok};
use crate::app_state::AppState;
use crate::error::Result;
use crate::middleware::AdminId;
use crate::services::events::{CreateEventInput, ListEventsQuery, UpdateEventInput};

pub async fn create(
    state: web::Data<AppState>,
    admin: AdminId,
    body: web::Json<CreateEventInput>,
) -> Result<HttpResponse> {
    let event = state.events.create(&admin.0, body.into_inner()).await?;

    if event.event_type.is_streamed() {
        let events = state.events.clone();
        let spawned = event.clone();
        tokio::spawn(async move {
            events.provision_logged(spawned).await;
        });
    }

    Ok(created(json!({ "event": event.public_view() })))
}

pub async fn list(
    state: web::Data<AppState>,
    query: web::Query<ListEventsQuery>,
) -> Result<HttpResponse> {
    let (events, next_cursor) = state.events.list(query.into_inner()).await?;
    let events: Vec<_> = events.iter().map(|e| e.public_view()).collect();
    Ok(ok(json!({ "events": events, "nextCursor": next_cursor })))
}

pub async fn get(state: web::Data<AppState>, path: web::Path<String>) -> Result<HttpResponse> {
    let event = state.events.get(&path).await?;
    Ok(ok(json!({ "event": event.public_view() })))
}

pub async fn update(
    state: web::Data<AppState>,
    path: web::Path<String>,
    body: web::Json<UpdateEventInput>,
) -> Result<HttpResponse> {
    let event = state.events.update(&path, body.into_inner()).await?;
    Ok(ok(json!({ "event": event.public_view() })))
}

/// Responds 202 once the deletion guard is held; teardown continues in the
/// background.
pub async fn delete(state: web::Data<AppState>, path: web::Path<String>) -> Result<HttpResponse> {
    let event = state.events.mark_for_deletion(&path).await?;

    let events = state.events.clone();
    tokio::spawn(async move {
        events.teardown(event).await;
    });

    Ok(accepted(json!({ "message": "Event deletion started" })))
}
