use std::time::Duration;

use actix_web::HttpResponse;
use once_cell::sync::Lazy;
use prometheus::{Encoder, HistogramOpts, HistogramVec, IntCounterVec, Opts, TextEncoder};

use crate::models::AccessMode;

static HTTP_REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    let counter = IntCounterVec::new(
        Opts::new(
            "event_control_http_requests_total",
            "Total HTTP requests handled by event-control",
        ),
        &["method", "path", "status"],
    )
    .expect("failed to create event_control_http_requests_total");
    prometheus::default_registry()
        .register(Box::new(counter.clone()))
        .expect("failed to register event_control_http_requests_total");
    counter
});

static HTTP_REQUEST_DURATION_SECONDS: Lazy<HistogramVec> = Lazy::new(|| {
    let histogram = HistogramVec::new(
        HistogramOpts::new(
            "event_control_http_request_duration_seconds",
            "HTTP request latency for event-control",
        )
        .buckets(vec![
            0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5,
        ]),
        &["method", "path", "status"],
    )
    .expect("failed to create event_control_http_request_duration_seconds");
    prometheus::default_registry()
        .register(Box::new(histogram.clone()))
        .expect("failed to register event_control_http_request_duration_seconds");
    histogram
});

static REGISTRATIONS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    let counter = IntCounterVec::new(
        Opts::new(
            "event_control_registrations_total",
            "Viewer registrations by access mode",
        ),
        &["access_mode", "identity_reused"],
    )
    .expect("failed to create event_control_registrations_total");
    prometheus::default_registry()
        .register(Box::new(counter.clone()))
        .expect("failed to register event_control_registrations_total");
    counter
});

static AUTHORIZATIONS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    let counter = IntCounterVec::new(
        Opts::new(
            "event_control_authorizations_total",
            "Playback authorization outcomes",
        ),
        &["outcome"],
    )
    .expect("failed to create event_control_authorizations_total");
    prometheus::default_registry()
        .register(Box::new(counter.clone()))
        .expect("failed to register event_control_authorizations_total");
    counter
});

static WEBHOOKS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    let counter = IntCounterVec::new(
        Opts::new(
            "event_control_webhooks_total",
            "Payment webhook ingestion outcomes",
        ),
        &["event_type", "outcome"],
    )
    .expect("failed to create event_control_webhooks_total");
    prometheus::default_registry()
        .register(Box::new(counter.clone()))
        .expect("failed to register event_control_webhooks_total");
    counter
});

static TEARDOWNS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    let counter = IntCounterVec::new(
        Opts::new(
            "event_control_teardowns_total",
            "Event teardown completions by result",
        ),
        &["result"],
    )
    .expect("failed to create event_control_teardowns_total");
    prometheus::default_registry()
        .register(Box::new(counter.clone()))
        .expect("failed to register event_control_teardowns_total");
    counter
});

pub fn observe_http_request(method: &str, path: &str, status: u16, elapsed: Duration) {
    let status_label = status.to_string();
    HTTP_REQUESTS_TOTAL
        .with_label_values(&[method, path, &status_label])
        .inc();
    HTTP_REQUEST_DURATION_SECONDS
        .with_label_values(&[method, path, &status_label])
        .observe(elapsed.as_secs_f64());
}

pub fn observe_registration(access_mode: AccessMode, identity_reused: bool) {
    REGISTRATIONS_TOTAL
        .with_label_values(&[
            access_mode.as_str(),
            if identity_reused { "true" } else { "false" },
        ])
        .inc();
}

pub fn observe_authorization(outcome: &str) {
    AUTHORIZATIONS_TOTAL.with_label_values(&[outcome]).inc();
}

pub fn observe_webhook(event_type: &str, outcome: &str) {
    WEBHOOKS_TOTAL
        .with_label_values(&[event_type, outcome])
        .inc();
}

pub fn observe_teardown(result: &str) {
    TEARDOWNS_TOTAL.with_label_values(&[result]).inc();
}

pub async fn serve_metrics() -> HttpResponse {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();

    let mut buffer = Vec::new();
    if let Err(err) = encoder.encode(&metric_families, &mut buffer) {
        return HttpResponse::InternalServerError().body(err.to_string());
    }

    HttpResponse::Ok()
        .content_type(encoder.format_type())
        .body(buffer)
}
