//! Payment plane: viewer checkout and verification, the gateway webhook,
//! and admin payment listings.

use actix_web::{web, HttpRequest, HttpResponse};
use serde::Deserialize;
use serde_json::json;

use super::ok;
use crate::app_state::AppState;
use crate::error::{AppError, Result};
use crate::security::viewer_token;

pub async fn create_session(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<String>,
) -> Result<HttpResponse> {
    let claims = viewer_token::from_request(&req, &state.viewer_secret)?;
    let outcome = state.payments.create_session(&path, &claims).await?;
    Ok(ok(serde_json::to_value(outcome)?))
}

pub async fn verify(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<String>,
) -> Result<HttpResponse> {
    let claims = viewer_token::from_request(&req, &state.viewer_secret)?;
    let view = state.payments.verify_payment(&path, &claims).await?;
    Ok(ok(serde_json::to_value(view)?))
}

/// Raw-body webhook endpoint. Signature verification needs the exact bytes,
/// so this route must see the payload before any JSON extractor.
pub async fn webhook(
    state: web::Data<AppState>,
    req: HttpRequest,
    payload: web::Bytes,
) -> Result<HttpResponse> {
    let signature = req
        .headers()
        .get("Stripe-Signature")
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| AppError::InvalidInput("Missing signature header".into()))?;
    let outcome = state.payments.ingest_webhook(&payload, signature).await?;
    Ok(ok(json!({ "received": true, "outcome": format!("{outcome:?}").to_lowercase() })))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListPaymentsBody {
    #[serde(default)]
    pub limit: Option<usize>,
    #[serde(default)]
    pub cursor: Option<String>,
}

pub async fn list(
    state: web::Data<AppState>,
    path: web::Path<String>,
    body: Option<web::Json<ListPaymentsBody>>,
) -> Result<HttpResponse> {
    let body = body.map(web::Json::into_inner).unwrap_or_default();
    let (payments, next_cursor) = state
        .payments
        .list_for_event(&path, body.limit, body.cursor)
        .await?;
    Ok(ok(json!({ "payments": payments, "nextCursor": next_cursor })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetailQuery {
    pub created_at: String,
}

pub async fn detail(
    state: web::Data<AppState>,
    path: web::Path<String>,
    query: web::Query<DetailQuery>,
) -> Result<HttpResponse> {
    let payment = state.payments.detail(&path, &query.created_at).await?;
    Ok(ok(json!({ "payment": payment })))
}
