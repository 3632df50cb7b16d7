//! Viewer playback plane: access config, registration, password
//! verification and stream resolution.

use actix_web::{web, HttpRequest, HttpResponse};
use serde::Deserialize;
use serde_json::json;

use super::ok;
use crate::app_state::AppState;
use crate::error::{AppError, Result};
use crate::security::viewer_token;
use crate::services::access::RegisterInput;

pub async fn access_config(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse> {
    let config = state.access.access_config(&path).await?;
    Ok(ok(serde_json::to_value(config)?))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterBody {
    pub client_viewer_id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub form_data: Option<serde_json::Value>,
    #[serde(default)]
    pub device: Option<serde_json::Value>,
    #[serde(default)]
    pub network: Option<serde_json::Value>,
}

pub async fn register(
    state: web::Data<AppState>,
    path: web::Path<String>,
    body: web::Json<RegisterBody>,
) -> Result<HttpResponse> {
    let body = body.into_inner();
    let outcome = state
        .access
        .register(
            &path,
            RegisterInput {
                client_viewer_id: body.client_viewer_id,
                email: body.email,
                name: body.name,
                form_data: body.form_data,
                device: body.device,
                network: body.network,
            },
        )
        .await?;
    Ok(ok(serde_json::to_value(outcome)?))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyPasswordBody {
    #[serde(default)]
    pub client_viewer_id: Option<String>,
    pub password: String,
}

pub async fn verify_password(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<String>,
    body: web::Json<VerifyPasswordBody>,
) -> Result<HttpResponse> {
    let body = body.into_inner();
    // The viewer is named either in the body or by a presented credential.
    let client_viewer_id = match body.client_viewer_id {
        Some(id) if !id.trim().is_empty() => id,
        _ => {
            let claims = viewer_token::from_request(&req, &state.viewer_secret)?;
            if claims.event_id != *path {
                return Err(AppError::Forbidden("Credential does not match event".into()));
            }
            claims.client_viewer_id
        }
    };
    let outcome = state
        .access
        .verify_password(&path, &client_viewer_id, &body.password)
        .await?;
    Ok(ok(serde_json::to_value(outcome)?))
}

pub async fn stream(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<String>,
) -> Result<HttpResponse> {
    let claims = viewer_token::from_request(&req, &state.viewer_secret)?;
    let info = state.access.get_stream(&path, &claims).await?;
    Ok(ok(json!({
        "streamUrl": info.stream_url,
        "playbackType": info.playback_type,
        "eventType": info.event_type,
    })))
}
