//! Route configuration.
//!
//! Literal segments are registered before parameterized siblings so
//! `/api/payments/stripe/webhook` and `/api/payments/detail/...` never fall
//! into the `/{event_id}/...` scope. The webhook route takes the raw body.

use actix_web::web;

use crate::handlers;
use crate::metrics;
use crate::middleware::AdminAuthMiddleware;

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/metrics", web::get().to(metrics::serve_metrics))
        .route("/health", web::get().to(handlers::health_check))
        .service(
            web::scope("/api/auth")
                .route("/register", web::post().to(handlers::auth::register))
                .route("/login", web::post().to(handlers::auth::login))
                .route("/refresh", web::post().to(handlers::auth::refresh))
                .service(
                    web::scope("")
                        .wrap(AdminAuthMiddleware)
                        .route("/logout", web::post().to(handlers::auth::logout)),
                ),
        )
        .service(
            web::scope("/api/events")
                .wrap(AdminAuthMiddleware)
                .route("/create", web::post().to(handlers::events::create))
                .route("/list", web::get().to(handlers::events::list))
                .route("/event/{event_id}", web::get().to(handlers::events::get))
                .route("/update/{event_id}", web::put().to(handlers::events::update))
                .route(
                    "/delete/{event_id}",
                    web::delete().to(handlers::events::delete),
                )
                .route("/upload-url", web::post().to(handlers::auth::upload_url))
                .route("/download-url", web::get().to(handlers::auth::download_url)),
        )
        .service(
            web::scope("/api/playback/event/{event_id}")
                .route("/access", web::get().to(handlers::playback::access_config))
                .route("/register", web::post().to(handlers::playback::register))
                .route(
                    "/verify-password",
                    web::post().to(handlers::playback::verify_password),
                )
                .route("/stream", web::get().to(handlers::playback::stream)),
        )
        .service(
            web::scope("/api/payments")
                .route("/stripe/webhook", web::post().to(handlers::payments::webhook))
                .service(
                    web::scope("/detail")
                        .wrap(AdminAuthMiddleware)
                        .route("/{payment_id}", web::get().to(handlers::payments::detail)),
                )
                .service(
                    web::scope("/{event_id}")
                        .route(
                            "/create-session",
                            web::post().to(handlers::payments::create_session),
                        )
                        .route("/verify", web::get().to(handlers::payments::verify))
                        .service(
                            web::scope("")
                                .wrap(AdminAuthMiddleware)
                                .route("/list", web::post().to(handlers::payments::list)),
                        ),
                ),
        )
        .service(
            web::scope("/api/sessions")
                .route("/start/{event_id}", web::post().to(handlers::sessions::start))
                .route(
                    "/heartbeat/{session_id}",
                    web::post().to(handlers::sessions::heartbeat),
                )
                .route("/end/{session_id}", web::post().to(handlers::sessions::end)),
        );
}
