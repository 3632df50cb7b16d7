//! Payment gateway port: hosted checkout creation and payment-intent
//! retrieval, plus webhook signature verification.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::error::{AppError, Result};

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Clone)]
pub struct CheckoutSessionRequest {
    pub amount_minor: i64,
    pub currency: String,
    pub product_name: String,
    /// `eventId:clientViewerId`, echoed back by the gateway.
    pub client_reference_id: String,
    pub metadata: BTreeMap<String, String>,
    pub success_url: String,
    pub cancel_url: String,
    pub customer_email: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CheckoutSession {
    pub id: String,
    pub url: String,
    pub status: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct PaymentIntentDetails {
    pub payment_intent_id: String,
    pub receipt_url: Option<String>,
    pub payment_method_type: Option<String>,
    pub payment_method_details: Option<serde_json::Value>,
    pub customer_id: Option<String>,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_checkout_session(
        &self,
        request: CheckoutSessionRequest,
    ) -> Result<CheckoutSession>;

    /// Best-effort enrichment; `None` when the intent cannot be retrieved.
    async fn retrieve_payment_intent(
        &self,
        payment_intent_id: &str,
    ) -> Result<Option<PaymentIntentDetails>>;
}

/// Verifies the gateway's `t=<ts>,v1=<sig>` webhook signature header:
/// HMAC-SHA256 over `"{t}.{body}"` with the shared webhook secret,
/// constant-time comparison, bounded timestamp tolerance.
pub fn verify_webhook_signature(
    payload: &[u8],
    signature_header: &str,
    secret: &str,
    tolerance_secs: i64,
    now: DateTime<Utc>,
) -> Result<()> {
    let mut timestamp: Option<i64> = None;
    let mut signatures: Vec<&str> = Vec::new();
    for part in signature_header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => timestamp = value.parse().ok(),
            Some(("v1", value)) => signatures.push(value),
            _ => {}
        }
    }
    let timestamp =
        timestamp.ok_or_else(|| AppError::InvalidInput("Malformed signature header".into()))?;
    if signatures.is_empty() {
        return Err(AppError::InvalidInput("Malformed signature header".into()));
    }
    if (now.timestamp() - timestamp).abs() > tolerance_secs {
        return Err(AppError::InvalidInput(
            "Webhook timestamp outside tolerance".into(),
        ));
    }

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| AppError::Internal(format!("webhook secret: {e}")))?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    let expected = hex::encode(mac.finalize().into_bytes());

    for candidate in signatures {
        if crate::security::password::constant_time_eq(candidate, &expected) {
            return Ok(());
        }
    }
    Err(AppError::InvalidInput("Invalid webhook signature".into()))
}

/// REST implementation against the gateway's form-encoded API.
pub struct StripeGateway {
    http: reqwest::Client,
    api_base: String,
    secret_key: String,
}

impl StripeGateway {
    pub fn new(secret_key: impl Into<String>) -> Self {
        Self::with_base("https://api.stripe.com", secret_key)
    }

    pub fn with_base(api_base: impl Into<String>, secret_key: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_base: api_base.into(),
            secret_key: secret_key.into(),
        }
    }
}

fn upstream(err: impl std::fmt::Display) -> AppError {
    AppError::Upstream(format!("payment gateway: {err}"))
}

#[async_trait]
impl PaymentGateway for StripeGateway {
    async fn create_checkout_session(
        &self,
        request: CheckoutSessionRequest,
    ) -> Result<CheckoutSession> {
        let mut form: Vec<(String, String)> = vec![
            ("mode".into(), "payment".into()),
            (
                "client_reference_id".into(),
                request.client_reference_id.clone(),
            ),
            ("success_url".into(), request.success_url.clone()),
            ("cancel_url".into(), request.cancel_url.clone()),
            ("line_items[0][quantity]".into(), "1".into()),
            (
                "line_items[0][price_data][currency]".into(),
                request.currency.to_lowercase(),
            ),
            (
                "line_items[0][price_data][unit_amount]".into(),
                request.amount_minor.to_string(),
            ),
            (
                "line_items[0][price_data][product_data][name]".into(),
                request.product_name.clone(),
            ),
        ];
        for (key, value) in &request.metadata {
            form.push((format!("metadata[{key}]"), value.clone()));
        }
        if let Some(email) = &request.customer_email {
            form.push(("customer_email".into(), email.clone()));
        }

        let response = self
            .http
            .post(format!("{}/v1/checkout/sessions", self.api_base))
            .bearer_auth(&self.secret_key)
            .form(&form)
            .send()
            .await
            .map_err(upstream)?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(upstream(format!("{status}: {body}")));
        }
        let body: serde_json::Value = response.json().await.map_err(upstream)?;
        let id = body["id"]
            .as_str()
            .ok_or_else(|| upstream("checkout session missing id"))?
            .to_string();
        let url = body["url"]
            .as_str()
            .ok_or_else(|| upstream("checkout session missing url"))?
            .to_string();
        Ok(CheckoutSession {
            id,
            url,
            status: body["status"].as_str().map(str::to_string),
        })
    }

    async fn retrieve_payment_intent(
        &self,
        payment_intent_id: &str,
    ) -> Result<Option<PaymentIntentDetails>> {
        let response = self
            .http
            .get(format!(
                "{}/v1/payment_intents/{payment_intent_id}",
                self.api_base
            ))
            .query(&[("expand[]", "latest_charge")])
            .bearer_auth(&self.secret_key)
            .send()
            .await
            .map_err(upstream)?;
        if !response.status().is_success() {
            // Enrichment only; the webhook proceeds without it.
            return Ok(None);
        }
        let body: serde_json::Value = response.json().await.map_err(upstream)?;
        let charge = &body["latest_charge"];
        Ok(Some(PaymentIntentDetails {
            payment_intent_id: payment_intent_id.to_string(),
            receipt_url: charge["receipt_url"].as_str().map(str::to_string),
            payment_method_type: charge["payment_method_details"]["type"]
                .as_str()
                .map(str::to_string),
            payment_method_details: charge
                .get("payment_method_details")
                .filter(|v| !v.is_null())
                .cloned(),
            customer_id: body["customer"].as_str().map(str::to_string),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sign(payload: &[u8], secret: &str, timestamp: i64) -> String {
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(timestamp.to_string().as_bytes());
        mac.update(b".");
        mac.update(payload);
        format!("t={timestamp},v1={}", hex::encode(mac.finalize().into_bytes()))
    }

    #[test]
    fn valid_signature_accepted() {
        let now = Utc::now();
        let payload = br#"{"type":"checkout.session.completed"}"#;
        let header = sign(payload, "whsec_test", now.timestamp());
        assert!(verify_webhook_signature(payload, &header, "whsec_test", 300, now).is_ok());
    }

    #[test]
    fn tampered_payload_rejected() {
        let now = Utc::now();
        let header = sign(b"{}", "whsec_test", now.timestamp());
        assert!(verify_webhook_signature(b"{ }", &header, "whsec_test", 300, now).is_err());
    }

    #[test]
    fn wrong_secret_rejected() {
        let now = Utc::now();
        let header = sign(b"{}", "whsec_other", now.timestamp());
        assert!(verify_webhook_signature(b"{}", &header, "whsec_test", 300, now).is_err());
    }

    #[test]
    fn stale_timestamp_rejected() {
        let now = Utc::now();
        let header = sign(b"{}", "whsec_test", now.timestamp() - 3600);
        assert!(verify_webhook_signature(b"{}", &header, "whsec_test", 300, now).is_err());
    }

    #[test]
    fn malformed_header_rejected() {
        let now = Utc::now();
        assert!(verify_webhook_signature(b"{}", "v1=deadbeef", "s", 300, now).is_err());
        assert!(verify_webhook_signature(b"{}", "t=123", "s", 300, now).is_err());
    }
}
