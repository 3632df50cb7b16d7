//! Event entity and its enumerations.
//!
//! Stored documents use camelCase attribute names; timestamps are ISO-8601
//! UTC strings. The access password is persisted as a bcrypt hash for
//! verification, plus the original value as the mail payload delivered to
//! registrants; neither leaves the service through the API.

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventType {
    Live,
    Scheduled,
    Vod,
}

impl EventType {
    /// Initial status assigned at creation.
    pub fn initial_status(self) -> EventStatus {
        match self {
            EventType::Live => EventStatus::Live,
            EventType::Scheduled => EventStatus::Scheduled,
            EventType::Vod => EventStatus::Uploaded,
        }
    }

    pub fn is_streamed(self) -> bool {
        matches!(self, EventType::Live | EventType::Scheduled)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AccessMode {
    FreeAccess,
    EmailAccess,
    PasswordAccess,
    // Legacy vocabulary: older records spell this "paymentAccess".
    #[serde(alias = "paymentAccess")]
    PaidAccess,
}

impl AccessMode {
    pub fn requires_form(self) -> bool {
        !matches!(self, AccessMode::FreeAccess)
    }

    pub fn requires_password(self) -> bool {
        matches!(self, AccessMode::PasswordAccess | AccessMode::PaidAccess)
    }

    pub fn requires_payment(self) -> bool {
        matches!(self, AccessMode::PaidAccess)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AccessMode::FreeAccess => "freeAccess",
            AccessMode::EmailAccess => "emailAccess",
            AccessMode::PasswordAccess => "passwordAccess",
            AccessMode::PaidAccess => "paidAccess",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventStatus {
    Draft,
    Scheduled,
    Live,
    Uploaded,
    Ended,
    Archived,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum VodStatus {
    Uploaded,
    Processing,
    Ready,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Resolution {
    #[serde(rename = "1080p")]
    R1080p,
    #[serde(rename = "720p")]
    R720p,
    #[serde(rename = "480p")]
    R480p,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BitrateProfile {
    Low,
    Medium,
    High,
}

pub const ALLOWED_FRAME_RATES: &[u32] = &[25, 30, 60];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoConfig {
    pub resolution: Resolution,
    pub frame_rate: u32,
    pub bitrate_profile: BitrateProfile,
}

impl VideoConfig {
    pub fn validate(&self) -> Result<(), String> {
        if !ALLOWED_FRAME_RATES.contains(&self.frame_rate) {
            return Err(format!(
                "frameRate must be one of 25, 30, 60 (got {})",
                self.frame_rate
            ));
        }
        Ok(())
    }
}

/// One entry of the semantic registration form schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationField {
    pub field_id: String,
    pub label: String,
    #[serde(default)]
    pub required: bool,
    #[serde(rename = "type")]
    pub field_type: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub event_id: String,
    pub title: String,
    pub description: String,
    pub event_type: EventType,
    pub access_mode: AccessMode,
    pub status: EventStatus,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<String>,

    // VOD source artifacts
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub s3_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub s3_prefix: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vod_status: Option<VodStatus>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_config: Option<VideoConfig>,

    // Access gating (secrets; stripped from API responses)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_password: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_password_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_amount: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registration_fields: Option<Vec<RegistrationField>>,

    // Provisioned media resource handles
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_security_group_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub live_channel_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub packager_channel_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub packager_endpoint_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distribution_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_behavior_ids: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cloud_front_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub packager_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vod_cloud_front_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vod_output_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recording_bucket: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recording_prefix: Option<String>,

    // Deletion state
    #[serde(default)]
    pub is_deletion_in_progress: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deletion_started_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deletion_error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deletion_failed_at: Option<String>,

    pub created_by: String,
    pub created_at: String,
    pub updated_at: String,
}

impl Event {
    /// Resolved live playback URL: CDN first, packager origin as fallback.
    pub fn live_url(&self) -> Option<&str> {
        self.cloud_front_url
            .as_deref()
            .or(self.packager_url.as_deref())
    }

    /// Resolved VOD playback URL.
    pub fn vod_url(&self) -> Option<&str> {
        self.vod_cloud_front_url
            .as_deref()
            .or(self.vod_output_path.as_deref())
    }

    pub fn vod_ready(&self) -> bool {
        self.vod_status == Some(VodStatus::Ready) && self.vod_url().is_some()
    }

    /// API representation with secrets stripped.
    pub fn public_view(&self) -> Value {
        let mut value = serde_json::to_value(self).unwrap_or(Value::Null);
        if let Some(map) = value.as_object_mut() {
            map.remove("accessPassword");
            map.remove("accessPasswordHash");
        }
        value
    }
}

/// Deterministic rewrite of legacy event documents before typed decode.
///
/// Older records mix two vocabularies: `paymentAccess` for the paid mode and
/// a two-value event-type taxonomy where scheduled events were stored as
/// `live` with a `scheduled` status.
pub fn migrate_event_document(doc: &mut serde_json::Map<String, Value>) {
    if doc.get("accessMode").and_then(Value::as_str) == Some("paymentAccess") {
        doc.insert("accessMode".into(), Value::String("paidAccess".into()));
    }
    let status = doc.get("status").and_then(Value::as_str);
    if doc.get("eventType").and_then(Value::as_str) == Some("live") && status == Some("scheduled") {
        doc.insert("eventType".into(), Value::String("scheduled".into()));
    }
}
