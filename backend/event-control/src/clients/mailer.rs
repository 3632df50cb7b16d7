//! Password-email worker port. Delivery is owned by a separate worker; the
//! control plane only hands it a payload. Failures are logged by callers and
//! never fail the viewer-facing request.

use async_trait::async_trait;
use serde_json::json;

use crate::error::{AppError, Result};

#[async_trait]
pub trait PasswordMailer: Send + Sync {
    async fn send_access_password(
        &self,
        to: &str,
        event_id: &str,
        event_title: &str,
        password: &str,
    ) -> Result<()>;
}

pub struct HttpPasswordMailer {
    http: reqwest::Client,
    worker_url: String,
}

impl HttpPasswordMailer {
    pub fn new(worker_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            worker_url: worker_url.into(),
        }
    }
}

#[async_trait]
impl PasswordMailer for HttpPasswordMailer {
    async fn send_access_password(
        &self,
        to: &str,
        event_id: &str,
        event_title: &str,
        password: &str,
    ) -> Result<()> {
        let response = self
            .http
            .post(&self.worker_url)
            .json(&json!({
                "template": "event-password",
                "to": to,
                "eventId": event_id,
                "eventTitle": event_title,
                "password": password,
            }))
            .send()
            .await
            .map_err(|e| AppError::Upstream(format!("email worker: {e}")))?;
        if !response.status().is_success() {
            return Err(AppError::Upstream(format!(
                "email worker returned {}",
                response.status()
            )));
        }
        Ok(())
    }
}
