//! Table names and index layout for the five keyed collections.

use doc_store::TableSchema;

pub const VIEWERS_BY_CLIENT_ID: &str = "byClientViewerId";
pub const PAYMENTS_BY_EVENT: &str = "byEvent";
pub const PAYMENTS_BY_EVENT_VIEWER: &str = "byEventViewer";
pub const SESSIONS_BY_EVENT: &str = "byEvent";
pub const ADMINS_BY_EMAIL: &str = "byEmail";

#[derive(Debug, Clone)]
pub struct TableNames {
    pub events: String,
    pub viewers: String,
    pub payments: String,
    pub sessions: String,
    pub admins: String,
}

impl Default for TableNames {
    fn default() -> Self {
        Self {
            events: "events".to_string(),
            viewers: "viewers".to_string(),
            payments: "payments".to_string(),
            sessions: "sessions".to_string(),
            admins: "admins".to_string(),
        }
    }
}

/// Schemas registered with the store engine at startup.
pub fn schemas(names: &TableNames) -> Vec<TableSchema> {
    vec![
        TableSchema::new(names.events.clone(), "eventId"),
        TableSchema::new(names.viewers.clone(), "eventId")
            .with_sort("clientViewerId")
            .with_index(VIEWERS_BY_CLIENT_ID, "clientViewerId", None),
        TableSchema::new(names.payments.clone(), "paymentId")
            .with_sort("createdAt")
            .with_index(PAYMENTS_BY_EVENT, "eventId", Some("createdAt"))
            .with_index(PAYMENTS_BY_EVENT_VIEWER, "eventId", Some("clientViewerId")),
        TableSchema::new(names.sessions.clone(), "sessionId")
            .with_index(SESSIONS_BY_EVENT, "eventId", Some("startTime")),
        TableSchema::new(names.admins.clone(), "adminId")
            .with_index(ADMINS_BY_EMAIL, "email", None),
    ]
}
