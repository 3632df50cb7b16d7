//! Admin accounts and their credential pair, plus pre-signed VOD artifact
//! URLs. Refresh tokens are stored hashed; logout revokes by clearing the
//! stored hash.

use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use sha2::{Digest, Sha256};
use validator::Validate;

use crate::clients::ObjectStorage;
use crate::db::AdminRepo;
use crate::error::{AppError, Result};
use crate::models::Admin;
use crate::security::{admin_token, password};
use crate::util::{new_id, Clock};

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RegisterAdminInput {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1))]
    pub name: String,
    #[validate(length(min = 8))]
    pub password: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginInput {
    pub email: String,
    pub password: String,
}

pub struct IssuedTokens {
    pub access_token: String,
    pub refresh_token: String,
    pub admin: Admin,
}

pub struct AdminService {
    admins: Arc<AdminRepo>,
    storage: Arc<dyn ObjectStorage>,
    clock: Arc<dyn Clock>,
    signing_secret: String,
    access_ttl_secs: i64,
    refresh_ttl_secs: i64,
    bcrypt_cost: u32,
    vod_bucket: String,
    signed_url_ttl: Duration,
}

fn sha256_hex(value: &str) -> String {
    hex::encode(Sha256::digest(value.as_bytes()))
}

impl AdminService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        admins: Arc<AdminRepo>,
        storage: Arc<dyn ObjectStorage>,
        clock: Arc<dyn Clock>,
        signing_secret: impl Into<String>,
        access_ttl_secs: i64,
        refresh_ttl_secs: i64,
        bcrypt_cost: u32,
        vod_bucket: impl Into<String>,
        signed_url_ttl: Duration,
    ) -> Self {
        Self {
            admins,
            storage,
            clock,
            signing_secret: signing_secret.into(),
            access_ttl_secs,
            refresh_ttl_secs,
            bcrypt_cost,
            vod_bucket: vod_bucket.into(),
            signed_url_ttl,
        }
    }

    pub async fn register(&self, input: RegisterAdminInput) -> Result<Admin> {
        input.validate()?;
        let email = input.email.trim().to_lowercase();
        if self.admins.find_by_email(&email).await?.is_some() {
            return Err(AppError::Conflict("Email already registered".into()));
        }
        let now_iso = self.clock.now_iso();
        let admin = Admin {
            admin_id: new_id(),
            email,
            name: input.name.trim().to_string(),
            password_hash: password::hash(&input.password, self.bcrypt_cost)?,
            refresh_token_hash: None,
            created_at: now_iso.clone(),
            updated_at: now_iso,
        };
        self.admins.create(&admin).await?;
        tracing::info!(admin_id = %admin.admin_id, "admin registered");
        Ok(admin)
    }

    pub async fn login(&self, input: LoginInput) -> Result<IssuedTokens> {
        let email = input.email.trim().to_lowercase();
        let admin = self
            .admins
            .find_by_email(&email)
            .await?
            .ok_or_else(|| AppError::Unauthorized("Invalid credentials".into()))?;
        if !bcrypt::verify(&input.password, &admin.password_hash)? {
            return Err(AppError::Unauthorized("Invalid credentials".into()));
        }
        self.issue(admin).await
    }

    pub async fn refresh(&self, refresh_token: &str) -> Result<IssuedTokens> {
        let claims = admin_token::verify(&self.signing_secret, refresh_token, "refresh")?;
        let admin = self
            .admins
            .get(&claims.sub)
            .await?
            .ok_or_else(|| AppError::Unauthorized("Unknown admin".into()))?;
        // The presented token must be the one most recently issued.
        let stored = admin
            .refresh_token_hash
            .as_deref()
            .ok_or_else(|| AppError::Unauthorized("Refresh token revoked".into()))?;
        if !password::constant_time_eq(stored, &sha256_hex(refresh_token)) {
            return Err(AppError::Unauthorized("Refresh token revoked".into()));
        }
        self.issue(admin).await
    }

    pub async fn logout(&self, admin_id: &str) -> Result<()> {
        self.admins
            .set_refresh_token_hash(admin_id, None, &self.clock.now_iso())
            .await
    }

    async fn issue(&self, admin: Admin) -> Result<IssuedTokens> {
        let now = self.clock.now();
        let access_token = admin_token::mint_access(
            &self.signing_secret,
            &admin.admin_id,
            self.access_ttl_secs,
            now,
        )?;
        let refresh_token = admin_token::mint_refresh(
            &self.signing_secret,
            &admin.admin_id,
            self.refresh_ttl_secs,
            now,
        )?;
        self.admins
            .set_refresh_token_hash(
                &admin.admin_id,
                Some(&sha256_hex(&refresh_token)),
                &self.clock.now_iso(),
            )
            .await?;
        Ok(IssuedTokens {
            access_token,
            refresh_token,
            admin,
        })
    }

    /// Pre-signed PUT for a fresh VOD upload key.
    pub async fn upload_url(&self, file_name: &str, content_type: &str) -> Result<(String, String)> {
        let safe_name: String = file_name
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '.' || c == '-' { c } else { '_' })
            .collect();
        if safe_name.trim_matches('_').is_empty() {
            return Err(AppError::InvalidInput("fileName is required".into()));
        }
        let key = format!("uploads/{}/{safe_name}", new_id());
        let url = self
            .storage
            .presign_put(&self.vod_bucket, &key, content_type, self.signed_url_ttl)
            .await?;
        Ok((key, url))
    }

    /// Pre-signed GET for an existing artifact key.
    pub async fn download_url(&self, key: &str) -> Result<String> {
        if key.trim().is_empty() || key.contains("..") {
            return Err(AppError::InvalidInput("invalid object key".into()));
        }
        self.storage
            .presign_get(&self.vod_bucket, key, self.signed_url_ttl)
            .await
    }
}
