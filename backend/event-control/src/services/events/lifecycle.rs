//! Create/update/list and the mode-dependent validation rules.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Deserialize;

use super::teardown::TeardownConfig;
use crate::clients::{MediaControl, ObjectStorage};
use crate::db::EventRepo;
use crate::error::{AppError, Result};
use crate::models::{
    AccessMode, Event, EventType, RegistrationField, VideoConfig, VodStatus,
};
use crate::security::password;
use crate::util::{currency, money, new_id, Clock};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateEventInput {
    pub title: String,
    pub description: String,
    pub event_type: EventType,
    pub access_mode: AccessMode,
    #[serde(default)]
    pub start_time: Option<String>,
    #[serde(default)]
    pub end_time: Option<String>,
    #[serde(default)]
    pub s3_key: Option<String>,
    #[serde(default)]
    pub video_config: Option<VideoConfig>,
    #[serde(default)]
    pub access_password: Option<String>,
    #[serde(default)]
    pub payment_amount: Option<serde_json::Number>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub registration_fields: Option<Vec<RegistrationField>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateEventInput {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub event_type: Option<EventType>,
    #[serde(default)]
    pub access_mode: Option<AccessMode>,
    #[serde(default)]
    pub start_time: Option<String>,
    #[serde(default)]
    pub end_time: Option<String>,
    #[serde(default)]
    pub video_config: Option<VideoConfig>,
    #[serde(default)]
    pub access_password: Option<String>,
    #[serde(default)]
    pub payment_amount: Option<serde_json::Number>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub registration_fields: Option<Vec<RegistrationField>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListEventsQuery {
    #[serde(default, rename = "q")]
    pub search: Option<String>,
    #[serde(default, rename = "type")]
    pub event_type: Option<EventType>,
    #[serde(default)]
    pub limit: Option<usize>,
    #[serde(default)]
    pub cursor: Option<String>,
}

pub struct EventService {
    pub(super) events: Arc<EventRepo>,
    pub(super) media: Arc<dyn MediaControl>,
    pub(super) storage: Arc<dyn ObjectStorage>,
    pub(super) clock: Arc<dyn Clock>,
    pub(super) teardown_config: TeardownConfig,
    pub(super) vod_bucket: String,
    pub(super) bcrypt_cost: u32,
}

impl EventService {
    pub fn new(
        events: Arc<EventRepo>,
        media: Arc<dyn MediaControl>,
        storage: Arc<dyn ObjectStorage>,
        clock: Arc<dyn Clock>,
        teardown_config: TeardownConfig,
        vod_bucket: impl Into<String>,
        bcrypt_cost: u32,
    ) -> Self {
        Self {
            events,
            media,
            storage,
            clock,
            teardown_config,
            vod_bucket: vod_bucket.into(),
            bcrypt_cost,
        }
    }

    pub async fn create(&self, created_by: &str, input: CreateEventInput) -> Result<Event> {
        let title = non_empty("title", &input.title)?;
        let description = non_empty("description", &input.description)?;

        if let Some(config) = &input.video_config {
            config.validate().map_err(AppError::InvalidInput)?;
        }

        let now = self.clock.now();
        let now_iso = self.clock.now_iso();

        let (s3_key, s3_prefix, vod_status) = match input.event_type {
            EventType::Vod => {
                let key = input
                    .s3_key
                    .as_deref()
                    .filter(|k| !k.trim().is_empty())
                    .ok_or_else(|| AppError::InvalidInput("s3Key is required for vod".into()))?
                    .trim()
                    .to_string();
                let prefix = derive_prefix(&key);
                (Some(key), Some(prefix), Some(VodStatus::Uploaded))
            }
            _ => (None, None, None),
        };

        if input.event_type == EventType::Scheduled {
            let start = input
                .start_time
                .as_deref()
                .ok_or_else(|| {
                    AppError::InvalidInput("startTime is required for scheduled events".into())
                })
                .and_then(parse_iso)?;
            if start <= now {
                return Err(AppError::InvalidInput(
                    "startTime must be in the future".into(),
                ));
            }
        }

        let gating = self.validate_access_fields(
            input.access_mode,
            input.access_password.as_deref(),
            input.payment_amount.as_ref(),
            input.currency.as_deref(),
        )?;

        let event = Event {
            event_id: new_id(),
            title,
            description,
            event_type: input.event_type,
            access_mode: input.access_mode,
            status: input.event_type.initial_status(),
            start_time: input.start_time,
            end_time: input.end_time,
            s3_key,
            s3_prefix,
            vod_status,
            video_config: input.video_config,
            access_password: gating.password,
            access_password_hash: gating.password_hash,
            payment_amount: gating.amount,
            currency: gating.currency,
            registration_fields: input.registration_fields,
            input_id: None,
            input_security_group_id: None,
            live_channel_id: None,
            packager_channel_id: None,
            packager_endpoint_id: None,
            distribution_id: None,
            origin_id: None,
            cache_behavior_ids: None,
            cloud_front_url: None,
            packager_url: None,
            vod_cloud_front_url: None,
            vod_output_path: None,
            recording_bucket: None,
            recording_prefix: None,
            is_deletion_in_progress: false,
            deletion_started_at: None,
            deletion_error: None,
            deletion_failed_at: None,
            created_by: created_by.to_string(),
            created_at: now_iso.clone(),
            updated_at: now_iso,
        };

        self.events.create(&event).await?;
        tracing::info!(
            event_id = %event.event_id,
            event_type = ?event.event_type,
            access_mode = event.access_mode.as_str(),
            "event created"
        );
        Ok(event)
    }

    pub async fn get(&self, event_id: &str) -> Result<Event> {
        self.events.require(event_id).await
    }

    pub async fn list(&self, query: ListEventsQuery) -> Result<(Vec<Event>, Option<String>)> {
        self.events
            .list(
                query.search.as_deref(),
                query.event_type,
                query.limit,
                query.cursor,
            )
            .await
    }

    pub async fn update(&self, event_id: &str, patch: UpdateEventInput) -> Result<Event> {
        let mut event = self.events.require(event_id).await?;

        if let Some(event_type) = patch.event_type {
            if event_type != event.event_type {
                return Err(AppError::InvalidTransition(
                    "eventType cannot be changed after creation".into(),
                ));
            }
        }

        let scheduling_touched =
            patch.start_time.is_some() || patch.end_time.is_some() || patch.video_config.is_some();
        if scheduling_touched && event.event_type != EventType::Scheduled {
            return Err(AppError::InvalidTransition(
                "startTime, endTime and videoConfig are only mutable while scheduled".into(),
            ));
        }

        if let Some(start) = &patch.start_time {
            if parse_iso(start)? <= self.clock.now() {
                return Err(AppError::InvalidInput(
                    "startTime must be in the future".into(),
                ));
            }
            event.start_time = Some(start.clone());
        }
        if let Some(end) = patch.end_time {
            event.end_time = Some(end);
        }
        if let Some(config) = patch.video_config {
            config.validate().map_err(AppError::InvalidInput)?;
            event.video_config = Some(config);
        }

        if let Some(title) = patch.title {
            event.title = non_empty("title", &title)?;
        }
        if let Some(description) = patch.description {
            event.description = non_empty("description", &description)?;
        }

        // Changing the access mode replaces the mode-dependent fields as a
        // coherent set; fields belonging to other modes stay in storage but
        // are dormant. The patch may fall back to already-stored values.
        if let Some(mode) = patch.access_mode {
            let gating = self.validate_access_fields(
                mode,
                patch
                    .access_password
                    .as_deref()
                    .or(event.access_password.as_deref()),
                patch
                    .payment_amount
                    .as_ref()
                    .or(stored_amount(&event).as_ref()),
                patch.currency.as_deref().or(event.currency.as_deref()),
            )?;
            event.access_mode = mode;
            if gating.password_hash.is_some() {
                event.access_password = gating.password;
                event.access_password_hash = gating.password_hash;
            }
            if mode.requires_payment() {
                event.payment_amount = gating.amount;
                event.currency = gating.currency;
            }
            if let Some(fields) = patch.registration_fields {
                event.registration_fields = Some(fields);
            }
        } else {
            if let Some(password) = patch.access_password {
                let trimmed = non_empty("accessPassword", &password)?;
                event.access_password_hash =
                    Some(password::hash(&trimmed, self.bcrypt_cost)?);
                event.access_password = Some(trimmed);
            }
            if let Some(fields) = patch.registration_fields {
                event.registration_fields = Some(fields);
            }
            if patch.payment_amount.is_some() || patch.currency.is_some() {
                let gating = self.validate_access_fields(
                    event.access_mode,
                    event.access_password.as_deref(),
                    patch
                        .payment_amount
                        .as_ref()
                        .or(stored_amount(&event).as_ref()),
                    patch.currency.as_deref().or(event.currency.as_deref()),
                )?;
                event.payment_amount = gating.amount;
                event.currency = gating.currency;
            }
        }

        event.updated_at = self.clock.now_iso();
        self.events.save(&event).await?;
        Ok(event)
    }

    /// Validates the gating fields a mode demands and returns them in
    /// storable form (bcrypt hash, f64 amount, normalized currency).
    fn validate_access_fields(
        &self,
        mode: AccessMode,
        access_password: Option<&str>,
        payment_amount: Option<&serde_json::Number>,
        currency_code: Option<&str>,
    ) -> Result<GatingFields> {
        let mut gating = GatingFields::default();

        if mode.requires_password() {
            let raw = access_password
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .ok_or_else(|| {
                    AppError::InvalidInput(format!(
                        "accessPassword is required for {}",
                        mode.as_str()
                    ))
                })?;
            gating.password_hash = Some(if raw.starts_with("$2") {
                // Already a bcrypt hash (re-validation of stored fields).
                raw.to_string()
            } else {
                password::hash(raw, self.bcrypt_cost)?
            });
            gating.password = Some(raw.to_string());
        }

        if mode.requires_payment() {
            let amount = payment_amount.ok_or_else(|| {
                AppError::InvalidInput("paymentAmount is required for paidAccess".into())
            })?;
            money::number_to_minor_units(amount)
                .map_err(|e| AppError::InvalidInput(e.to_string()))?;
            gating.amount = amount.as_f64();

            let code = currency_code.ok_or_else(|| {
                AppError::InvalidInput("currency is required for paidAccess".into())
            })?;
            gating.currency = Some(currency::normalize(code).ok_or_else(|| {
                AppError::InvalidInput(format!("unsupported currency: {code}"))
            })?);
        }

        Ok(gating)
    }
}

#[derive(Default)]
struct GatingFields {
    password: Option<String>,
    password_hash: Option<String>,
    amount: Option<f64>,
    currency: Option<String>,
}

fn non_empty(field: &str, value: &str) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AppError::InvalidInput(format!("{field} must not be empty")));
    }
    Ok(trimmed.to_string())
}

fn parse_iso(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| AppError::InvalidInput(format!("invalid timestamp: {value}")))
}

/// The upload prefix is everything up to the last path separator.
fn derive_prefix(s3_key: &str) -> String {
    match s3_key.rsplit_once('/') {
        Some((prefix, _)) => format!("{prefix}/"),
        None => String::new(),
    }
}

fn stored_amount(event: &Event) -> Option<serde_json::Number> {
    event.payment_amount.and_then(serde_json::Number::from_f64)
}
