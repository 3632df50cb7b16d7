//! Thin HTTP boundary. Handlers translate requests into service calls and
//! wrap results in the `{success, ...}` envelope; errors map through
//! `AppError`'s `ResponseError` impl.

pub mod auth;
pub mod events;
pub mod health;
pub mod payments;
pub mod playback;
pub mod sessions;

pub use health::health_check;

use actix_web::HttpResponse;
use serde_json::{json, Value};

pub(crate) fn ok(mut body: Value) -> HttpResponse {
    envelope(&mut body);
    HttpResponse::Ok().json(body)
}

pub(crate) fn created(mut body: Value) -> HttpResponse {
    envelope(&mut body);
    HttpResponse::Created().json(body)
}

pub(crate) fn accepted(mut body: Value) -> HttpResponse {
    envelope(&mut body);
    HttpResponse::Accepted().json(body)
}

fn envelope(body: &mut Value) {
    if let Some(map) = body.as_object_mut() {
        map.insert("success".to_string(), json!(true));
    }
}
