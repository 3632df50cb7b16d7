//! Viewer credential: an opaque HS256 bearer token carrying the per-event
//! viewer claims, valid for at most seven days.

use actix_web::HttpRequest;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

pub const MAX_TTL_SECS: i64 = 7 * 24 * 60 * 60;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewerClaims {
    pub event_id: String,
    pub client_viewer_id: String,
    pub is_paid_viewer: bool,
    pub iat: i64,
    pub exp: i64,
}

pub fn mint(
    secret: &str,
    event_id: &str,
    client_viewer_id: &str,
    is_paid_viewer: bool,
    ttl_secs: i64,
    now: DateTime<Utc>,
) -> Result<String> {
    let ttl = ttl_secs.clamp(1, MAX_TTL_SECS);
    let claims = ViewerClaims {
        event_id: event_id.to_string(),
        client_viewer_id: client_viewer_id.to_string(),
        is_paid_viewer,
        iat: now.timestamp(),
        exp: (now + Duration::seconds(ttl)).timestamp(),
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(Into::into)
}

pub fn verify(secret: &str, token: &str) -> Result<ViewerClaims> {
    let data = decode::<ViewerClaims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )?;
    Ok(data.claims)
}

/// Extracts and verifies the viewer credential from the Authorization header.
pub fn from_request(req: &HttpRequest, secret: &str) -> Result<ViewerClaims> {
    let header = req
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| AppError::Unauthorized("Missing Authorization header".to_string()))?;
    let token = header
        .strip_prefix("Bearer ")
        .ok_or_else(|| AppError::Unauthorized("Expected Bearer credential".to_string()))?;
    verify(secret, token)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_preserves_claims() {
        let token = mint("sekrit", "e1", "c1", true, 3600, Utc::now()).unwrap();
        let claims = verify("sekrit", &token).unwrap();
        assert_eq!(claims.event_id, "e1");
        assert_eq!(claims.client_viewer_id, "c1");
        assert!(claims.is_paid_viewer);
    }

    #[test]
    fn wrong_secret_rejected() {
        let token = mint("sekrit", "e1", "c1", false, 3600, Utc::now()).unwrap();
        assert!(verify("other", &token).is_err());
    }

    #[test]
    fn ttl_clamped_to_seven_days() {
        let now = Utc::now();
        let token = mint("sekrit", "e1", "c1", false, MAX_TTL_SECS * 4, now).unwrap();
        let claims = verify("sekrit", &token).unwrap();
        assert!(claims.exp - claims.iat <= MAX_TTL_SECS);
    }

    #[test]
    fn expired_token_rejected() {
        let old = Utc::now() - Duration::days(30);
        let token = mint("sekrit", "e1", "c1", false, 60, old).unwrap();
        assert!(verify("sekrit", &token).is_err());
    }
}
