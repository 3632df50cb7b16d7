//! Admin account. Managed at boundary depth: register, login, refresh.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Admin {
    pub admin_id: String,
    pub email: String,
    pub name: String,
    /// bcrypt digest; never serialized to clients.
    pub password_hash: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token_hash: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl Admin {
    pub fn public_view(&self) -> serde_json::Value {
        serde_json::json!({
            "adminId": self.admin_id,
            "email": self.email,
            "name": self.name,
            "createdAt": self.created_at,
        })
    }
}
