//! Payment coordinator: idempotent checkout creation and webhook-driven
//! reconciliation with terminal-state stickiness.

pub mod checkout;
pub mod webhook;

pub use checkout::{CheckoutOutcome, PaymentService, PaymentStatusView};
pub use webhook::WebhookOutcome;
