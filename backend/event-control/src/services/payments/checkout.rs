//! Checkout session creation and payment status lookups.
//!
//! `paymentId` is minted before the gateway call and is the idempotency key.
//! The gateway is called first; if the subsequent persist fails the id was
//! never surfaced, so the orphan checkout simply expires.

use std::collections::BTreeMap;
use std::sync::Arc;

use doc_store::Mutation;
use serde::Serialize;
use serde_json::json;

use crate::clients::{CheckoutSessionRequest, PaymentGateway};
use crate::db::{EventRepo, PaymentRepo, ViewerRepo};
use crate::error::{AppError, Result};
use crate::models::{
    AccessMode, Payment, PaymentStatus, Viewer, ViewerPaymentStatus,
};
use crate::security::viewer_token::ViewerClaims;
use crate::util::{money, new_id, Clock};

pub struct PaymentService {
    pub(super) events: Arc<EventRepo>,
    pub(super) viewers: Arc<ViewerRepo>,
    pub(super) payments: Arc<PaymentRepo>,
    pub(super) gateway: Arc<dyn PaymentGateway>,
    pub(super) clock: Arc<dyn Clock>,
    pub(super) webhook_secret: String,
    pub(super) webhook_tolerance_secs: i64,
    pub(super) frontend_url: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutOutcome {
    pub already_paid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<PaymentStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentStatusView {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment: Option<Payment>,
    pub payment_status: ViewerPaymentStatus,
    pub is_paid_viewer: bool,
}

impl PaymentService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        events: Arc<EventRepo>,
        viewers: Arc<ViewerRepo>,
        payments: Arc<PaymentRepo>,
        gateway: Arc<dyn PaymentGateway>,
        clock: Arc<dyn Clock>,
        webhook_secret: impl Into<String>,
        webhook_tolerance_secs: i64,
        frontend_url: impl Into<String>,
    ) -> Self {
        Self {
            events,
            viewers,
            payments,
            gateway,
            clock,
            webhook_secret: webhook_secret.into(),
            webhook_tolerance_secs,
            frontend_url: frontend_url.into(),
        }
    }

    pub async fn create_session(
        &self,
        event_id: &str,
        claims: &ViewerClaims,
    ) -> Result<CheckoutOutcome> {
        if claims.event_id != event_id {
            return Err(AppError::Forbidden("Credential does not match event".into()));
        }
        let event = self.events.require(event_id).await?;
        if event.access_mode != AccessMode::PaidAccess {
            return Err(AppError::InvalidInput(
                "Event does not require payment".into(),
            ));
        }
        let amount = event.payment_amount.ok_or_else(|| {
            AppError::Invariant("paid event without paymentAmount".into())
        })?;
        let currency = event
            .currency
            .clone()
            .ok_or_else(|| AppError::Invariant("paid event without currency".into()))?;

        let viewer = self
            .viewers
            .get(event_id, &claims.client_viewer_id)
            .await?
            .ok_or_else(|| AppError::Forbidden("Viewer is not registered".into()))?;
        if viewer.is_paid_viewer {
            return Ok(CheckoutOutcome {
                already_paid: true,
                payment_id: None,
                created_at: None,
                status: None,
                session_id: None,
                url: None,
            });
        }

        let payment_id = new_id();
        let created_at = self.clock.now_iso();
        let amount_minor = money::to_minor_units(&amount.to_string())
            .map_err(|e| AppError::InvalidInput(e.to_string()))?;

        let mut metadata = BTreeMap::new();
        metadata.insert("paymentId".to_string(), payment_id.clone());
        metadata.insert("eventId".to_string(), event_id.to_string());
        metadata.insert("clientViewerId".to_string(), claims.client_viewer_id.clone());
        metadata.insert("createdAt".to_string(), created_at.clone());

        let base = self.frontend_url.trim_end_matches('/');
        let session = self
            .gateway
            .create_checkout_session(CheckoutSessionRequest {
                amount_minor,
                currency: currency.clone(),
                product_name: event.title.clone(),
                client_reference_id: format!("{event_id}:{}", claims.client_viewer_id),
                metadata,
                success_url: format!("{base}/event/{event_id}?checkout=success"),
                cancel_url: format!("{base}/event/{event_id}?checkout=canceled"),
                customer_email: viewer.email.clone(),
            })
            .await?;

        let payment = Payment {
            payment_id: payment_id.clone(),
            created_at: created_at.clone(),
            event_id: event_id.to_string(),
            client_viewer_id: claims.client_viewer_id.clone(),
            amount,
            amount_minor,
            currency,
            status: PaymentStatus::Pending,
            checkout_session_id: Some(session.id.clone()),
            payment_intent_id: None,
            payment_method_type: None,
            payment_method_details: None,
            receipt_url: None,
            failure_reason: None,
            gateway_event_type: None,
            gateway_session_status: session.status.clone(),
            gateway_payment_status: None,
            customer_id: None,
            customer_email: viewer.email.clone(),
            updated_at: created_at.clone(),
        };
        self.payments.create(&payment).await?;

        self.viewers
            .update(
                event_id,
                &claims.client_viewer_id,
                vec![
                    Mutation::Set("paymentStatus", json!("pending")),
                    Mutation::Set("lastPaymentId", json!(payment_id)),
                    Mutation::Set("lastStripeCheckoutSessionId", json!(session.id)),
                    Mutation::Set("updatedAt", json!(self.clock.now_iso())),
                ],
            )
            .await?;

        tracing::info!(
            event_id,
            client_viewer_id = %claims.client_viewer_id,
            payment_id = %payment.payment_id,
            "checkout session created"
        );
        Ok(CheckoutOutcome {
            already_paid: false,
            payment_id: Some(payment.payment_id),
            created_at: Some(payment.created_at),
            status: Some(PaymentStatus::Pending),
            session_id: Some(session.id),
            url: Some(session.url),
        })
    }

    /// Viewer-facing status check: the viewer record is authoritative, the
    /// latest payment is attached for display.
    pub async fn verify_payment(
        &self,
        event_id: &str,
        claims: &ViewerClaims,
    ) -> Result<PaymentStatusView> {
        if claims.event_id != event_id {
            return Err(AppError::Forbidden("Credential does not match event".into()));
        }
        self.events.require(event_id).await?;
        let viewer: Viewer = self
            .viewers
            .get(event_id, &claims.client_viewer_id)
            .await?
            .ok_or_else(|| AppError::Forbidden("Viewer is not registered".into()))?;
        let payment = self
            .payments
            .latest_for_viewer(event_id, &claims.client_viewer_id)
            .await?;
        Ok(PaymentStatusView {
            payment,
            payment_status: viewer.payment_status,
            is_paid_viewer: viewer.is_paid_viewer,
        })
    }

    pub async fn list_for_event(
        &self,
        event_id: &str,
        limit: Option<usize>,
        cursor: Option<String>,
    ) -> Result<(Vec<Payment>, Option<String>)> {
        self.events.require(event_id).await?;
        self.payments.list_by_event(event_id, limit, cursor).await
    }

    pub async fn detail(&self, payment_id: &str, created_at: &str) -> Result<Payment> {
        self.payments
            .get(payment_id, created_at)
            .await?
            .ok_or_else(|| AppError::NotFound("Payment not found".into()))
    }
}
