//! Control plane for live and on-demand video events: event lifecycle with
//! asynchronous media teardown, per-event viewer access gating, payment
//! coordination against a hosted checkout gateway, and playback telemetry.

pub mod app_state;
pub mod clients;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod security;
pub mod services;
pub mod util;

pub use app_state::AppState;
pub use config::Config;
pub use error::{AppError, Result};
