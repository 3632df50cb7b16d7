//! Admin auth plane and VOD artifact URL signing.

use actix_web::cookie::{time::Duration as CookieDuration, Cookie, SameSite};
use actix_web::{web, HttpRequest, HttpResponse};
use serde::Deserialize;
use serde_json::json;

use super::{created, ok};
use crate::app_state::AppState;
use crate::error::{AppError, Result};
use crate::middleware::AdminId;
use crate::services::admin::{IssuedTokens, LoginInput, RegisterAdminInput};

const REFRESH_COOKIE: &str = "refreshToken";

fn refresh_cookie(token: String, max_age_secs: i64) -> Cookie<'static> {
    Cookie::build(REFRESH_COOKIE, token)
        .path("/api/auth")
        .http_only(true)
        .same_site(SameSite::Strict)
        .max_age(CookieDuration::seconds(max_age_secs))
        .finish()
}

fn token_response(issued: IssuedTokens) -> HttpResponse {
    let mut response = HttpResponse::Ok().json(json!({
        "success": true,
        "accessToken": issued.access_token,
        "admin": issued.admin.public_view(),
    }));
    // 7 days, matching the refresh token TTL default.
    let cookie = refresh_cookie(issued.refresh_token, 604800);
    if let Err(err) = response.add_cookie(&cookie) {
        tracing::error!(error = %err, "failed to attach refresh cookie");
    }
    response
}

pub async fn register(
    state: web::Data<AppState>,
    body: web::Json<RegisterAdminInput>,
) -> Result<HttpResponse> {
    let admin = state.admin.register(body.into_inner()).await?;
    Ok(created(json!({ "admin": admin.public_view() })))
}

pub async fn login(
    state: web::Data<AppState>,
    body: web::Json<LoginInput>,
) -> Result<HttpResponse> {
    let issued = state.admin.login(body.into_inner()).await?;
    Ok(token_response(issued))
}

pub async fn refresh(state: web::Data<AppState>, req: HttpRequest) -> Result<HttpResponse> {
    let cookie = req
        .cookie(REFRESH_COOKIE)
        .ok_or_else(|| AppError::Unauthorized("Missing refresh token".into()))?;
    let issued = state.admin.refresh(cookie.value()).await?;
    Ok(token_response(issued))
}

pub async fn logout(state: web::Data<AppState>, admin: AdminId) -> Result<HttpResponse> {
    state.admin.logout(&admin.0).await?;
    let mut response = ok(json!({ "message": "Logged out" }));
    let mut cookie = refresh_cookie(String::new(), 0);
    cookie.make_removal();
    if let Err(err) = response.add_cookie(&cookie) {
        tracing::error!(error = %err, "failed to clear refresh cookie");
    }
    Ok(response)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadUrlBody {
    pub file_name: String,
    #[serde(default = "default_content_type")]
    pub content_type: String,
}

fn default_content_type() -> String {
    "video/mp4".to_string()
}

pub async fn upload_url(
    state: web::Data<AppState>,
    body: web::Json<UploadUrlBody>,
) -> Result<HttpResponse> {
    let (key, url) = state
        .admin
        .upload_url(&body.file_name, &body.content_type)
        .await?;
    Ok(ok(json!({ "key": key, "uploadUrl": url })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadUrlQuery {
    pub key: String,
}

pub async fn download_url(
    state: web::Data<AppState>,
    query: web::Query<DownloadUrlQuery>,
) -> Result<HttpResponse> {
    let url = state.admin.download_url(&query.key).await?;
    Ok(ok(json!({ "downloadUrl": url })))
}
