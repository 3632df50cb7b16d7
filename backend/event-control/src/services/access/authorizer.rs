//! The per-event access state machine and playback authorization pipeline.
//!
//! Authorization is authoritative from the Viewer record at decision time:
//! a credential minted before payment still fails `get_stream` until the
//! webhook has flipped `isPaidViewer`.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Value};

use super::identity;
use crate::clients::PasswordMailer;
use crate::db::{EventRepo, ViewerRepo};
use crate::error::{AppError, Result};
use crate::models::{AccessMode, Event, EventType, PlaybackType, Viewer, ViewerPaymentStatus};
use crate::security::{password, viewer_token};
use crate::util::Clock;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StepState {
    pub form_submitted: bool,
    pub password_verified: bool,
    pub payment_verified: bool,
    pub registration_complete: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessConfig {
    pub access_mode: AccessMode,
    pub requires_form: bool,
    pub requires_password: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub registration_fields: Option<Vec<crate::models::RegistrationField>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment: Option<Value>,
}

#[derive(Debug, Default)]
pub struct RegisterInput {
    pub client_viewer_id: String,
    pub email: Option<String>,
    pub name: Option<String>,
    pub form_data: Option<Value>,
    pub device: Option<Value>,
    pub network: Option<Value>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterOutcome {
    pub viewer_token: String,
    pub resolved_client_viewer_id: String,
    pub access_verified: bool,
    pub access_mode: AccessMode,
    pub steps: StepState,
    /// True when identity reuse re-bound the request to a prior viewer.
    pub identity_reused: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyPasswordOutcome {
    pub success: bool,
    pub access_verified: bool,
    pub password_verified: bool,
    pub registration_complete: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamInfo {
    pub stream_url: String,
    pub playback_type: PlaybackType,
    pub event_type: EventType,
}

/// Step snapshot of a viewer against the event's current access mode.
/// Steps a mode does not require read as satisfied.
pub fn steps_for(viewer: &Viewer, mode: AccessMode) -> StepState {
    let form_submitted = !mode.requires_form()
        || viewer.form_data.is_some()
        || viewer.normalized_email.is_some();
    let password_verified = !mode.requires_password() || viewer.password_verified;
    let payment_verified = !mode.requires_payment() || viewer.is_paid_viewer;
    StepState {
        form_submitted,
        password_verified,
        payment_verified,
        registration_complete: form_submitted && password_verified && payment_verified,
    }
}

/// Whether the viewer has already satisfied the mode's gate. Drives identity
/// reuse and is the source of the derived `accessVerified` flag.
pub fn gate_satisfied(viewer: &Viewer, mode: AccessMode) -> bool {
    match mode {
        AccessMode::FreeAccess => true,
        AccessMode::EmailAccess => {
            viewer.form_data.is_some() || viewer.normalized_email.is_some()
        }
        AccessMode::PasswordAccess => viewer.password_verified,
        AccessMode::PaidAccess => viewer.is_paid_viewer,
    }
}

/// Recomputes the derived access flags after any step changes.
pub fn apply_derived_flags(viewer: &mut Viewer, mode: AccessMode, now_iso: &str) {
    let steps = steps_for(viewer, mode);
    viewer.registration_complete = steps.registration_complete;
    if steps.registration_complete && viewer.registration_completed_at.is_none() {
        viewer.registration_completed_at = Some(now_iso.to_string());
    }
    viewer.access_verified = match mode {
        AccessMode::FreeAccess => true,
        AccessMode::EmailAccess => steps.form_submitted,
        AccessMode::PasswordAccess => viewer.password_verified,
        AccessMode::PaidAccess => viewer.is_paid_viewer && viewer.password_verified,
    };
}

/// Stream-resolution decision table. Blocked outcomes surface as Forbidden
/// with the user-visible reason.
pub fn resolve_stream(event: &Event, now: DateTime<Utc>) -> Result<(String, PlaybackType)> {
    let vod = || {
        event
            .vod_url()
            .map(|url| (url.to_string(), PlaybackType::Vod))
    };
    let live = || {
        event
            .live_url()
            .map(|url| (url.to_string(), PlaybackType::Live))
    };
    match event.event_type {
        EventType::Live => {
            if event.vod_ready() {
                return vod().ok_or_else(|| unreachable_blocked());
            }
            live().ok_or_else(|| AppError::Forbidden("Live stream not available".into()))
        }
        EventType::Scheduled => {
            if let Some(start) = &event.start_time {
                let start = DateTime::parse_from_rfc3339(start)
                    .map_err(|_| AppError::Storage("unparseable startTime".into()))?;
                if now < start.with_timezone(&Utc) {
                    return Err(AppError::Forbidden("Event has not started yet".into()));
                }
            }
            if event.vod_ready() {
                return vod().ok_or_else(|| unreachable_blocked());
            }
            live().ok_or_else(|| AppError::Forbidden("Stream not available".into()))
        }
        EventType::Vod => {
            if event.vod_ready() {
                return vod().ok_or_else(|| unreachable_blocked());
            }
            Err(AppError::Forbidden("VOD is still processing".into()))
        }
    }
}

fn unreachable_blocked() -> AppError {
    // vod_ready() implies vod_url() is Some.
    AppError::Internal("vod url vanished during resolution".into())
}

pub struct AccessService {
    events: Arc<EventRepo>,
    viewers: Arc<ViewerRepo>,
    mailer: Arc<dyn PasswordMailer>,
    clock: Arc<dyn Clock>,
    viewer_secret: String,
    viewer_token_ttl_secs: i64,
}

impl AccessService {
    pub fn new(
        events: Arc<EventRepo>,
        viewers: Arc<ViewerRepo>,
        mailer: Arc<dyn PasswordMailer>,
        clock: Arc<dyn Clock>,
        viewer_secret: impl Into<String>,
        viewer_token_ttl_secs: i64,
    ) -> Self {
        Self {
            events,
            viewers,
            mailer,
            clock,
            viewer_secret: viewer_secret.into(),
            viewer_token_ttl_secs,
        }
    }

    pub async fn access_config(&self, event_id: &str) -> Result<AccessConfig> {
        let event = self.events.require(event_id).await?;
        let payment = event.access_mode.requires_payment().then(|| {
            json!({
                "amount": event.payment_amount,
                "currency": event.currency,
            })
        });
        Ok(AccessConfig {
            access_mode: event.access_mode,
            requires_form: event.access_mode.requires_form(),
            requires_password: event.access_mode.requires_password(),
            registration_fields: event.registration_fields.clone(),
            payment,
        })
    }

    /// Registers (or re-registers) a viewer and mints a credential. May
    /// resolve to a prior viewer via identity reuse.
    pub async fn register(&self, event_id: &str, input: RegisterInput) -> Result<RegisterOutcome> {
        if input.client_viewer_id.trim().is_empty() {
            return Err(AppError::InvalidInput("clientViewerId is required".into()));
        }
        let event = self.events.require(event_id).await?;
        let mode = event.access_mode;

        let has_identity =
            input.email.is_some() || input.name.is_some() || input.form_data.is_some();
        if mode.requires_form() && !has_identity {
            return Err(AppError::InvalidInput(
                "Registration details are required for this event".into(),
            ));
        }

        let normalized_email = input.email.as_deref().map(identity::normalize_email);
        let normalized_fields = input
            .form_data
            .as_ref()
            .map(identity::normalize_form_data)
            .unwrap_or_default();
        let registration_identity_key = has_identity.then(|| {
            identity::identity_key(
                input.name.as_deref(),
                input.email.as_deref(),
                &normalized_fields,
            )
        });

        let now_iso = self.clock.now_iso();
        let existing = self.viewers.get(event_id, &input.client_viewer_id).await?;

        // Identity reuse: a brand-new device presenting an identity that
        // already satisfied the gate reclaims the prior viewer.
        if existing.is_none() && has_identity {
            if let Some(mut prior) = self
                .find_prior_viewer(
                    event_id,
                    registration_identity_key.as_deref(),
                    normalized_email.as_deref(),
                    mode,
                )
                .await?
            {
                prior.email = input.email.clone().or(prior.email);
                prior.normalized_email = normalized_email.clone().or(prior.normalized_email);
                prior.name = input.name.clone().or(prior.name);
                if input.form_data.is_some() {
                    prior.form_data = input.form_data.clone();
                }
                prior.device = input.device.clone().or(prior.device.take());
                prior.network = input.network.clone().or(prior.network.take());
                prior.updated_at = now_iso.clone();
                apply_derived_flags(&mut prior, mode, &now_iso);
                self.viewers.save(&prior).await?;
                tracing::info!(
                    event_id,
                    client_viewer_id = %input.client_viewer_id,
                    resolved = %prior.client_viewer_id,
                    "identity reuse: rebinding registration to prior viewer"
                );
                return self.outcome(&event, prior, true);
            }
        }

        let mut viewer = existing.unwrap_or_else(|| Viewer {
            event_id: event_id.to_string(),
            client_viewer_id: input.client_viewer_id.clone(),
            email: None,
            normalized_email: None,
            name: None,
            form_data: None,
            registration_identity_key: None,
            access_verified: false,
            password_verified: false,
            password_verified_at: None,
            is_paid_viewer: false,
            payment_status: ViewerPaymentStatus::None,
            registration_complete: false,
            registration_completed_at: None,
            last_payment_id: None,
            last_checkout_session_id: None,
            last_payment_intent_id: None,
            device: None,
            network: None,
            first_join_at: None,
            last_join_at: None,
            total_sessions: 0,
            total_watch_time: 0.0,
            created_at: now_iso.clone(),
            updated_at: now_iso.clone(),
        });

        // Upsert preserves previously earned paid/verified flags.
        if input.email.is_some() {
            viewer.email = input.email.clone();
            viewer.normalized_email = normalized_email.clone();
        }
        if input.name.is_some() {
            viewer.name = input.name.clone();
        }
        if input.form_data.is_some() {
            viewer.form_data = input.form_data.clone();
        }
        if let Some(key) = &registration_identity_key {
            viewer.registration_identity_key = Some(key.clone());
        }
        if input.device.is_some() {
            viewer.device = input.device.clone();
        }
        if input.network.is_some() {
            viewer.network = input.network.clone();
        }
        viewer.updated_at = now_iso.clone();
        apply_derived_flags(&mut viewer, mode, &now_iso);
        self.viewers.save(&viewer).await?;

        self.dispatch_password_email(&event, &viewer).await;
        self.outcome(&event, viewer, false)
    }

    async fn find_prior_viewer(
        &self,
        event_id: &str,
        identity_key: Option<&str>,
        normalized_email: Option<&str>,
        mode: AccessMode,
    ) -> Result<Option<Viewer>> {
        if let Some(key) = identity_key {
            let matches = self
                .viewers
                .find_by_attr(event_id, "registrationIdentityKey", key)
                .await?;
            if let Some(viewer) = matches.into_iter().find(|v| gate_satisfied(v, mode)) {
                return Ok(Some(viewer));
            }
        }
        if let Some(email) = normalized_email {
            let matches = self
                .viewers
                .find_by_attr(event_id, "normalizedEmail", email)
                .await?;
            if let Some(viewer) = matches.into_iter().find(|v| gate_satisfied(v, mode)) {
                return Ok(Some(viewer));
            }
        }
        Ok(None)
    }

    /// Password email side effect: fired when the mode gates on a password
    /// the viewer has not verified yet. Failure never fails registration.
    async fn dispatch_password_email(&self, event: &Event, viewer: &Viewer) {
        if !event.access_mode.requires_password() || viewer.password_verified {
            return;
        }
        let (Some(password), Some(email)) = (&event.access_password, &viewer.email) else {
            return;
        };
        if let Err(err) = self
            .mailer
            .send_access_password(email, &event.event_id, &event.title, password)
            .await
        {
            tracing::warn!(
                event_id = %event.event_id,
                client_viewer_id = %viewer.client_viewer_id,
                error = %err,
                "password email dispatch failed"
            );
        }
    }

    fn outcome(
        &self,
        event: &Event,
        viewer: Viewer,
        identity_reused: bool,
    ) -> Result<RegisterOutcome> {
        let steps = steps_for(&viewer, event.access_mode);
        let token = viewer_token::mint(
            &self.viewer_secret,
            &event.event_id,
            &viewer.client_viewer_id,
            viewer.is_paid_viewer,
            self.viewer_token_ttl_secs,
            self.clock.now(),
        )?;
        crate::metrics::observe_registration(event.access_mode, identity_reused);
        Ok(RegisterOutcome {
            viewer_token: token,
            resolved_client_viewer_id: viewer.client_viewer_id,
            access_verified: viewer.access_verified,
            access_mode: event.access_mode,
            steps,
            identity_reused,
        })
    }

    pub async fn verify_password(
        &self,
        event_id: &str,
        client_viewer_id: &str,
        submitted: &str,
    ) -> Result<VerifyPasswordOutcome> {
        let event = self.events.require(event_id).await?;
        if !event.access_mode.requires_password() {
            return Err(AppError::InvalidInput(
                "Event does not use password access".into(),
            ));
        }
        let stored = event
            .access_password_hash
            .as_deref()
            .or(event.access_password.as_deref())
            .ok_or_else(|| {
                AppError::InvalidInput("Event has no access password configured".into())
            })?;
        if !password::verify(submitted, stored)? {
            return Err(AppError::Unauthorized("Invalid password".into()));
        }

        let mut viewer = self
            .viewers
            .get(event_id, client_viewer_id)
            .await?
            .ok_or_else(|| AppError::Forbidden("Viewer is not registered".into()))?;
        let now_iso = self.clock.now_iso();
        viewer.password_verified = true;
        viewer.password_verified_at = Some(now_iso.clone());
        viewer.updated_at = now_iso.clone();
        apply_derived_flags(&mut viewer, event.access_mode, &now_iso);
        self.viewers.save(&viewer).await?;

        Ok(VerifyPasswordOutcome {
            success: true,
            access_verified: viewer.access_verified,
            password_verified: viewer.password_verified,
            registration_complete: viewer.registration_complete,
        })
    }

    /// Gate enforcement plus stream resolution. The credential's event claim
    /// must match the requested event.
    pub async fn get_stream(
        &self,
        event_id: &str,
        claims: &viewer_token::ViewerClaims,
    ) -> Result<StreamInfo> {
        if claims.event_id != event_id {
            return Err(AppError::Forbidden("Credential does not match event".into()));
        }
        let viewer = self
            .viewers
            .get(event_id, &claims.client_viewer_id)
            .await?
            .ok_or_else(|| AppError::Forbidden("Viewer is not registered".into()))?;
        let event = self.events.require(event_id).await?;

        match event.access_mode {
            AccessMode::FreeAccess => {}
            AccessMode::EmailAccess | AccessMode::PasswordAccess => {
                if !viewer.access_verified {
                    crate::metrics::observe_authorization("denied");
                    return Err(AppError::Forbidden("Access not verified".into()));
                }
            }
            AccessMode::PaidAccess => {
                // Entitlement is authoritative from the record, not the token.
                if !viewer.is_paid_viewer {
                    crate::metrics::observe_authorization("payment_required");
                    return Err(AppError::PaymentRequired(
                        "Payment required to watch this event".into(),
                    ));
                }
            }
        }

        let (stream_url, playback_type) = match resolve_stream(&event, self.clock.now()) {
            Ok(resolved) => resolved,
            Err(err) => {
                crate::metrics::observe_authorization("blocked");
                return Err(err);
            }
        };

        let now_iso = self.clock.now_iso();
        self.viewers
            .update(
                event_id,
                &claims.client_viewer_id,
                vec![
                    doc_store::Mutation::Set("lastJoinAt", json!(now_iso)),
                    doc_store::Mutation::Set("updatedAt", json!(now_iso)),
                ],
            )
            .await?;

        crate::metrics::observe_authorization("granted");
        Ok(StreamInfo {
            stream_url,
            playback_type,
            event_type: event.event_type,
        })
    }
}
