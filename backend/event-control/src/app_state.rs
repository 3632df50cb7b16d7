//! Shared application state: the wired service graph.

use std::sync::Arc;
use std::time::Duration;

use doc_store::DocumentStore;

use crate::clients::{MediaControl, ObjectStorage, PasswordMailer, PaymentGateway};
use crate::config::Config;
use crate::db::{AdminRepo, EventRepo, PaymentRepo, SessionRepo, ViewerRepo};
use crate::services::access::AccessService;
use crate::services::admin::AdminService;
use crate::services::events::{EventService, TeardownConfig};
use crate::services::payments::PaymentService;
use crate::services::sessions::SessionService;
use crate::util::Clock;

pub struct AppState {
    pub events: Arc<EventService>,
    pub access: Arc<AccessService>,
    pub payments: Arc<PaymentService>,
    pub sessions: Arc<SessionService>,
    pub admin: Arc<AdminService>,
    pub viewer_secret: String,
    pub admin_secret: String,
}

impl AppState {
    /// Wires repositories and services over the injected collaborators.
    pub fn build(
        config: &Config,
        store: Arc<dyn DocumentStore>,
        media: Arc<dyn MediaControl>,
        storage: Arc<dyn ObjectStorage>,
        mailer: Arc<dyn PasswordMailer>,
        gateway: Arc<dyn PaymentGateway>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let event_repo = Arc::new(EventRepo::new(
            store.clone(),
            config.store.events_table.clone(),
        ));
        let viewer_repo = Arc::new(ViewerRepo::new(
            store.clone(),
            config.store.viewers_table.clone(),
        ));
        let payment_repo = Arc::new(PaymentRepo::new(
            store.clone(),
            config.store.payments_table.clone(),
        ));
        let session_repo = Arc::new(SessionRepo::new(
            store.clone(),
            config.store.sessions_table.clone(),
        ));
        let admin_repo = Arc::new(AdminRepo::new(store, config.store.admins_table.clone()));

        let teardown = TeardownConfig {
            poll_interval: Duration::from_secs(config.teardown.poll_interval_secs),
            budget: Duration::from_secs(config.teardown.budget_secs),
        };

        let events = Arc::new(EventService::new(
            event_repo.clone(),
            media,
            storage.clone(),
            clock.clone(),
            teardown,
            config.storage.vod_bucket.clone(),
            config.auth.bcrypt_cost,
        ));
        let access = Arc::new(AccessService::new(
            event_repo.clone(),
            viewer_repo.clone(),
            mailer,
            clock.clone(),
            config.auth.viewer_secret.clone(),
            config.auth.viewer_token_ttl,
        ));
        let payments = Arc::new(PaymentService::new(
            event_repo,
            viewer_repo.clone(),
            payment_repo,
            gateway,
            clock.clone(),
            config.payment.webhook_secret.clone(),
            config.payment.webhook_tolerance_secs,
            config.app.frontend_url.clone(),
        ));
        let sessions = Arc::new(SessionService::new(session_repo, viewer_repo, clock.clone()));
        let admin = Arc::new(AdminService::new(
            admin_repo,
            storage,
            clock,
            config.auth.admin_secret.clone(),
            config.auth.admin_access_ttl,
            config.auth.admin_refresh_ttl,
            config.auth.bcrypt_cost,
            config.storage.vod_bucket.clone(),
            Duration::from_secs(config.storage.signed_url_ttl_secs),
        ));

        Self {
            events,
            access,
            payments,
            sessions,
            admin,
            viewer_secret: config.auth.viewer_secret.clone(),
            admin_secret: config.auth.admin_secret.clone(),
        }
    }
}
