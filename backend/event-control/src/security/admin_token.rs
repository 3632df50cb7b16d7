//! Admin credential pair: short-lived access token plus an HTTP-only refresh
//! cookie. HS256 over the admin signing secret.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::error::Result;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminClaims {
    /// Admin id.
    pub sub: String,
    pub token_type: String,
    pub iat: i64,
    pub exp: i64,
}

fn mint(
    secret: &str,
    admin_id: &str,
    token_type: &str,
    ttl_secs: i64,
    now: DateTime<Utc>,
) -> Result<String> {
    let claims = AdminClaims {
        sub: admin_id.to_string(),
        token_type: token_type.to_string(),
        iat: now.timestamp(),
        exp: (now + Duration::seconds(ttl_secs)).timestamp(),
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(Into::into)
}

pub fn mint_access(secret: &str, admin_id: &str, ttl_secs: i64, now: DateTime<Utc>) -> Result<String> {
    mint(secret, admin_id, "access", ttl_secs, now)
}

pub fn mint_refresh(secret: &str, admin_id: &str, ttl_secs: i64, now: DateTime<Utc>) -> Result<String> {
    mint(secret, admin_id, "refresh", ttl_secs, now)
}

pub fn verify(secret: &str, token: &str, expected_type: &str) -> Result<AdminClaims> {
    let data = decode::<AdminClaims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )?;
    if data.claims.token_type != expected_type {
        return Err(crate::error::AppError::Unauthorized(
            "Wrong token type".to_string(),
        ));
    }
    Ok(data.claims)
}
