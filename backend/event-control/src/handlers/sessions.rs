//! Playback telemetry endpoints.

use actix_web::{web, HttpRequest, HttpResponse};
use serde::Deserialize;
use serde_json::json;

use super::{created, ok};
use crate::app_state::AppState;
use crate::error::Result;
use crate::security::viewer_token;
use crate::services::sessions::StartSessionInput;

pub async fn start(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<String>,
    body: web::Json<StartSessionInput>,
) -> Result<HttpResponse> {
    let claims = viewer_token::from_request(&req, &state.viewer_secret)?;
    let session = state
        .sessions
        .start(&path, &claims, body.into_inner())
        .await?;
    Ok(created(json!({ "session": session })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeartbeatBody {
    pub seconds: f64,
}

pub async fn heartbeat(
    state: web::Data<AppState>,
    path: web::Path<String>,
    body: web::Json<HeartbeatBody>,
) -> Result<HttpResponse> {
    let duration = state.sessions.heartbeat(&path, body.seconds).await?;
    Ok(ok(json!({ "duration": duration })))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndBody {
    #[serde(default)]
    pub duration: f64,
}

pub async fn end(
    state: web::Data<AppState>,
    path: web::Path<String>,
    body: Option<web::Json<EndBody>>,
) -> Result<HttpResponse> {
    let reported = body.map(|b| b.duration).unwrap_or_default();
    let session = state.sessions.end(&path, reported).await?;
    Ok(ok(json!({ "session": session })))
}
