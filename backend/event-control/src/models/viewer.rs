//! Viewer entity: per-event identity, access state and telemetry.

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewerPaymentStatus {
    None,
    Pending,
    Succeeded,
    Failed,
    Canceled,
}

impl Default for ViewerPaymentStatus {
    fn default() -> Self {
        ViewerPaymentStatus::None
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Viewer {
    pub event_id: String,
    /// Viewer-chosen opaque token, stable per device. The per-event identity.
    pub client_viewer_id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub normalized_email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub form_data: Option<Value>,
    /// SHA-256 over the normalized name/email/fields, used for
    /// reclaim-by-same-identity on a new device.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registration_identity_key: Option<String>,

    #[serde(default)]
    pub access_verified: bool,
    #[serde(default)]
    pub password_verified: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password_verified_at: Option<String>,
    #[serde(default)]
    pub is_paid_viewer: bool,
    #[serde(default)]
    pub payment_status: ViewerPaymentStatus,
    #[serde(default)]
    pub registration_complete: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registration_completed_at: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_payment_id: Option<String>,
    #[serde(
        default,
        rename = "lastStripeCheckoutSessionId",
        skip_serializing_if = "Option::is_none"
    )]
    pub last_checkout_session_id: Option<String>,
    #[serde(
        default,
        rename = "lastStripePaymentIntentId",
        skip_serializing_if = "Option::is_none"
    )]
    pub last_payment_intent_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_join_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_join_at: Option<String>,
    #[serde(default)]
    pub total_sessions: i64,
    #[serde(default)]
    pub total_watch_time: f64,

    pub created_at: String,
    pub updated_at: String,
}

/// Deterministic rewrite of legacy viewer documents: the random `viewerId`
/// scheme predates client-supplied identity.
pub fn migrate_viewer_document(doc: &mut serde_json::Map<String, Value>) {
    if !doc.contains_key("clientViewerId") {
        if let Some(legacy) = doc.remove("viewerId") {
            doc.insert("clientViewerId".into(), legacy);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn legacy_viewer_id_is_renamed() {
        let mut doc = json!({"eventId": "e1", "viewerId": "v-old"})
            .as_object()
            .cloned()
            .unwrap();
        migrate_viewer_document(&mut doc);
        assert_eq!(doc["clientViewerId"], json!("v-old"));
        assert!(doc.get("viewerId").is_none());
    }

    #[test]
    fn sparse_documents_decode_with_defaults() {
        let viewer: Viewer = serde_json::from_value(json!({
            "eventId": "e1",
            "clientViewerId": "c1",
            "createdAt": "2026-01-01T00:00:00.000Z",
            "updatedAt": "2026-01-01T00:00:00.000Z",
        }))
        .unwrap();
        assert!(!viewer.access_verified);
        assert_eq!(viewer.payment_status, ViewerPaymentStatus::None);
        assert_eq!(viewer.total_sessions, 0);
    }
}
