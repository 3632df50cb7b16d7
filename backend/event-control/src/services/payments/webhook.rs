//! Webhook ingestion: signature check, event-type dispatch, terminal-state
//! stickiness, intent enrichment, then Payment write followed by the Viewer
//! mirror.
//!
//! Stray or replayed deliveries resolve to 200 so the gateway stops
//! retrying; persistence failures propagate as 500 so it retries.

use doc_store::Mutation;
use serde_json::{json, Value};

use super::checkout::PaymentService;
use crate::clients::verify_webhook_signature;
use crate::error::Result;
use crate::models::{Payment, PaymentStatus, ViewerPaymentStatus};
use crate::services::access::authorizer::apply_derived_flags;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookOutcome {
    /// State advanced: Payment finalized and Viewer mirrored.
    Reconciled,
    /// The payment was already terminal; delivery was a no-op.
    Replayed,
    /// Unknown event type, missing metadata, or unknown payment.
    Ignored,
}

struct Delivery {
    event_type: String,
    mapped: PaymentStatus,
    payment_id: String,
    created_at: String,
    object: Value,
}

impl PaymentService {
    pub async fn ingest_webhook(
        &self,
        payload: &[u8],
        signature_header: &str,
    ) -> Result<WebhookOutcome> {
        verify_webhook_signature(
            payload,
            signature_header,
            &self.webhook_secret,
            self.webhook_tolerance_secs,
            self.clock.now(),
        )?;

        let envelope: Value = serde_json::from_slice(payload)?;
        let event_type = envelope["type"].as_str().unwrap_or_default().to_string();
        let object = envelope["data"]["object"].clone();

        let Some(mapped) = dispatch(&event_type, &object) else {
            tracing::debug!(event_type, "webhook ignored: unhandled event type");
            crate::metrics::observe_webhook(&event_type, "ignored");
            return Ok(WebhookOutcome::Ignored);
        };

        let metadata = &object["metadata"];
        let (Some(payment_id), Some(created_at)) = (
            metadata["paymentId"].as_str(),
            metadata["createdAt"].as_str(),
        ) else {
            tracing::warn!(event_type, "webhook ignored: missing payment metadata");
            crate::metrics::observe_webhook(&event_type, "ignored");
            return Ok(WebhookOutcome::Ignored);
        };

        let delivery = Delivery {
            event_type: event_type.clone(),
            mapped,
            payment_id: payment_id.to_string(),
            created_at: created_at.to_string(),
            object,
        };
        let outcome = self.reconcile(delivery).await?;
        crate::metrics::observe_webhook(
            &event_type,
            match outcome {
                WebhookOutcome::Reconciled => "reconciled",
                WebhookOutcome::Replayed => "replayed",
                WebhookOutcome::Ignored => "ignored",
            },
        );
        Ok(outcome)
    }

    async fn reconcile(&self, delivery: Delivery) -> Result<WebhookOutcome> {
        let Some(existing) = self
            .payments
            .get(&delivery.payment_id, &delivery.created_at)
            .await?
        else {
            tracing::warn!(
                payment_id = %delivery.payment_id,
                event_type = %delivery.event_type,
                "webhook ignored: unknown payment"
            );
            return Ok(WebhookOutcome::Ignored);
        };

        if existing.status.is_terminal() {
            if existing.status == PaymentStatus::Succeeded
                && delivery.mapped != PaymentStatus::Succeeded
            {
                // Late expiration or failure after success never demotes.
                tracing::info!(
                    payment_id = %delivery.payment_id,
                    event_type = %delivery.event_type,
                    "terminal payment kept: delivery would demote succeeded"
                );
            } else if delivery.mapped == existing.status {
                // A replayed delivery can carry fields the finalizing write
                // lacked; backfill without touching the status.
                let backfill = backfill_mutations(&existing, &delivery.object);
                if !backfill.is_empty() {
                    self.payments
                        .enrich(
                            &delivery.payment_id,
                            &delivery.created_at,
                            backfill,
                            &self.clock.now_iso(),
                        )
                        .await?;
                }
            }
            return Ok(WebhookOutcome::Replayed);
        }

        let mut mutations = enrichment_mutations(&delivery);
        if delivery.mapped == PaymentStatus::Succeeded {
            if let Some(intent_id) = delivery.object["payment_intent"].as_str() {
                if let Some(details) = self.gateway.retrieve_payment_intent(intent_id).await? {
                    if let Some(receipt) = details.receipt_url {
                        mutations.push(Mutation::Set("receiptUrl", json!(receipt)));
                    }
                    if let Some(method) = details.payment_method_type {
                        mutations.push(Mutation::Set("paymentMethodType", json!(method)));
                    }
                    if let Some(method_details) = details.payment_method_details {
                        mutations.push(Mutation::Set("paymentMethodDetails", method_details));
                    }
                    if let Some(customer) = details.customer_id {
                        mutations.push(Mutation::Set("customerId", json!(customer)));
                    }
                }
            }
        }

        let now_iso = self.clock.now_iso();
        let Some(updated) = self
            .payments
            .transition_from_pending(
                &delivery.payment_id,
                &delivery.created_at,
                delivery.mapped,
                mutations,
                &now_iso,
            )
            .await?
        else {
            // A concurrent delivery finalized first.
            return Ok(WebhookOutcome::Replayed);
        };

        self.mirror_viewer(&updated).await?;
        tracing::info!(
            payment_id = %updated.payment_id,
            event_id = %updated.event_id,
            status = updated.status.as_str(),
            "payment reconciled"
        );
        Ok(WebhookOutcome::Reconciled)
    }

    /// Mirrors the finalized payment onto the viewer record and re-derives
    /// the access flags.
    async fn mirror_viewer(&self, payment: &crate::models::Payment) -> Result<()> {
        let Some(mut viewer) = self
            .viewers
            .get(&payment.event_id, &payment.client_viewer_id)
            .await?
        else {
            tracing::warn!(
                event_id = %payment.event_id,
                client_viewer_id = %payment.client_viewer_id,
                "payment finalized for unknown viewer"
            );
            return Ok(());
        };

        let now_iso = self.clock.now_iso();
        viewer.is_paid_viewer = payment.status == PaymentStatus::Succeeded;
        viewer.payment_status = mirror_status(payment.status);
        viewer.last_payment_id = Some(payment.payment_id.clone());
        viewer.last_checkout_session_id = payment.checkout_session_id.clone();
        viewer.last_payment_intent_id = payment.payment_intent_id.clone();
        viewer.updated_at = now_iso.clone();

        if let Some(event) = self.events.get(&payment.event_id).await? {
            apply_derived_flags(&mut viewer, event.access_mode, &now_iso);
        }
        self.viewers.save(&viewer).await
    }
}

/// Maps a gateway event type to the payment status it finalizes, or `None`
/// when the delivery carries nothing actionable.
fn dispatch(event_type: &str, object: &Value) -> Option<PaymentStatus> {
    match event_type {
        "checkout.session.completed" | "checkout.session.async_payment_succeeded" => {
            let paid = matches!(
                object["payment_status"].as_str(),
                Some("paid") | Some("succeeded")
            );
            paid.then_some(PaymentStatus::Succeeded)
        }
        "checkout.session.async_payment_failed" | "payment_intent.payment_failed" => {
            Some(PaymentStatus::Failed)
        }
        "checkout.session.expired" => Some(PaymentStatus::Canceled),
        _ => None,
    }
}

fn enrichment_mutations(delivery: &Delivery) -> Vec<Mutation> {
    let object = &delivery.object;
    let mut mutations = vec![Mutation::Set(
        "gatewayEventType",
        json!(delivery.event_type),
    )];
    if let Some(session_id) = object["id"].as_str() {
        if object["object"].as_str() == Some("checkout.session") {
            mutations.push(Mutation::Set("checkoutSessionId", json!(session_id)));
        }
    }
    if let Some(intent) = object["payment_intent"].as_str() {
        mutations.push(Mutation::Set("paymentIntentId", json!(intent)));
    }
    if let Some(status) = object["status"].as_str() {
        mutations.push(Mutation::Set("gatewaySessionStatus", json!(status)));
    }
    if let Some(status) = object["payment_status"].as_str() {
        mutations.push(Mutation::Set("gatewayPaymentStatus", json!(status)));
    }
    if let Some(email) = object["customer_details"]["email"]
        .as_str()
        .or_else(|| object["customer_email"].as_str())
    {
        mutations.push(Mutation::Set("customerEmail", json!(email)));
    }
    if let Some(reason) = object["last_payment_error"]["message"].as_str() {
        mutations.push(Mutation::Set("failureReason", json!(reason)));
    }
    mutations
}

/// Mutations for attributes the stored payment is missing but the replayed
/// delivery carries. Status and existing attributes are never overwritten.
fn backfill_mutations(existing: &Payment, object: &Value) -> Vec<Mutation> {
    let mut mutations = Vec::new();
    if existing.checkout_session_id.is_none() {
        if let Some(session_id) = object["id"].as_str() {
            if object["object"].as_str() == Some("checkout.session") {
                mutations.push(Mutation::Set("checkoutSessionId", json!(session_id)));
            }
        }
    }
    if existing.payment_intent_id.is_none() {
        if let Some(intent) = object["payment_intent"].as_str() {
            mutations.push(Mutation::Set("paymentIntentId", json!(intent)));
        }
    }
    if existing.customer_email.is_none() {
        if let Some(email) = object["customer_details"]["email"]
            .as_str()
            .or_else(|| object["customer_email"].as_str())
        {
            mutations.push(Mutation::Set("customerEmail", json!(email)));
        }
    }
    mutations
}

fn mirror_status(status: PaymentStatus) -> ViewerPaymentStatus {
    match status {
        PaymentStatus::Pending => ViewerPaymentStatus::Pending,
        PaymentStatus::Succeeded => ViewerPaymentStatus::Succeeded,
        PaymentStatus::Failed => ViewerPaymentStatus::Failed,
        PaymentStatus::Canceled => ViewerPaymentStatus::Canceled,
    }
}
