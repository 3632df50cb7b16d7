//! Shared fixture: the full service graph wired over the in-memory store
//! and recording fakes for every external collaborator.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;

use doc_store::MemoryStore;
use event_control::clients::{
    ChannelState, CheckoutSession, CheckoutSessionRequest, Distribution, LiveInput, MediaControl,
    MediaError, ObjectStorage, PackagerEndpoint, PasswordMailer, PaymentGateway,
    PaymentIntentDetails,
};
use event_control::config::{
    AppConfig, AuthConfig, Config, MediaConfig, PaymentConfig, StorageConfig, StoreConfig,
    TeardownSettings,
};
use event_control::db::tables::{schemas, TableNames};
use event_control::db::{EventRepo, PaymentRepo, ViewerRepo};
use event_control::error::{AppError, Result};
use event_control::models::VideoConfig;
use event_control::security::viewer_token;
use event_control::util::{Clock, FixedClock};
use event_control::AppState;

pub const VIEWER_SECRET: &str = "viewer-secret";
pub const ADMIN_SECRET: &str = "admin-secret";
pub const WEBHOOK_SECRET: &str = "whsec_test";

pub fn test_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
}

type MediaResult<T> = std::result::Result<T, MediaError>;

/// Media control fake: hands out deterministic ids, tracks channel states,
/// and can be armed to fail a single operation by name.
#[derive(Default)]
pub struct FakeMediaControl {
    pub calls: Mutex<Vec<String>>,
    pub channels: Mutex<HashMap<String, ChannelState>>,
    pub fail_on: Mutex<Option<String>>,
    counter: AtomicUsize,
}

impl FakeMediaControl {
    fn next_id(&self, prefix: &str) -> String {
        let n = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        format!("{prefix}-{n}")
    }

    fn record(&self, call: impl Into<String>) -> MediaResult<()> {
        let call = call.into();
        let armed = self.fail_on.lock().unwrap().clone();
        self.calls.lock().unwrap().push(call.clone());
        if let Some(op) = armed {
            if call.starts_with(&op) {
                return Err(MediaError::Upstream(format!("injected failure in {op}")));
            }
        }
        Ok(())
    }

    pub fn call_names(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl MediaControl for FakeMediaControl {
    async fn create_input_security_group(&self, event_id: &str) -> MediaResult<String> {
        self.record(format!("create_input_security_group {event_id}"))?;
        Ok(self.next_id("sg"))
    }

    async fn create_input(&self, event_id: &str, security_group_id: &str) -> MediaResult<LiveInput> {
        self.record(format!("create_input {event_id} {security_group_id}"))?;
        let input_id = self.next_id("in");
        Ok(LiveInput {
            ingest_url: format!("rtmp://ingest/{input_id}"),
            input_id,
        })
    }

    async fn create_live_channel(
        &self,
        event_id: &str,
        input_id: &str,
        _config: &VideoConfig,
    ) -> MediaResult<String> {
        self.record(format!("create_live_channel {event_id} {input_id}"))?;
        let channel_id = self.next_id("ch");
        self.channels
            .lock()
            .unwrap()
            .insert(channel_id.clone(), ChannelState::Running);
        Ok(channel_id)
    }

    async fn describe_channel(&self, channel_id: &str) -> MediaResult<ChannelState> {
        self.channels
            .lock()
            .unwrap()
            .get(channel_id)
            .copied()
            .ok_or(MediaError::NotFound)
    }

    async fn start_channel(&self, channel_id: &str) -> MediaResult<()> {
        self.record(format!("start_channel {channel_id}"))?;
        self.channels
            .lock()
            .unwrap()
            .insert(channel_id.to_string(), ChannelState::Running);
        Ok(())
    }

    async fn stop_channel(&self, channel_id: &str) -> MediaResult<()> {
        self.record(format!("stop_channel {channel_id}"))?;
        let mut channels = self.channels.lock().unwrap();
        match channels.get_mut(channel_id) {
            Some(state) => {
                *state = ChannelState::Idle;
                Ok(())
            }
            None => Err(MediaError::NotFound),
        }
    }

    async fn delete_channel(&self, channel_id: &str) -> MediaResult<()> {
        self.record(format!("delete_channel {channel_id}"))?;
        self.channels.lock().unwrap().remove(channel_id);
        Ok(())
    }

    async fn delete_input(&self, input_id: &str) -> MediaResult<()> {
        self.record(format!("delete_input {input_id}"))
    }

    async fn delete_input_security_group(&self, group_id: &str) -> MediaResult<()> {
        self.record(format!("delete_input_security_group {group_id}"))
    }

    async fn create_packager_channel(&self, event_id: &str) -> MediaResult<String> {
        self.record(format!("create_packager_channel {event_id}"))?;
        Ok(self.next_id("pkg"))
    }

    async fn create_packager_endpoint(&self, channel_id: &str) -> MediaResult<PackagerEndpoint> {
        self.record(format!("create_packager_endpoint {channel_id}"))?;
        let endpoint_id = self.next_id("ep");
        Ok(PackagerEndpoint {
            playback_url: format!("https://packager/{endpoint_id}/index.m3u8"),
            endpoint_id,
        })
    }

    async fn delete_packager_endpoint(&self, endpoint_id: &str) -> MediaResult<()> {
        self.record(format!("delete_packager_endpoint {endpoint_id}"))
    }

    async fn delete_packager_channel(&self, channel_id: &str) -> MediaResult<()> {
        self.record(format!("delete_packager_channel {channel_id}"))
    }

    async fn create_distribution(
        &self,
        event_id: &str,
        _packager_url: &str,
    ) -> MediaResult<Distribution> {
        self.record(format!("create_distribution {event_id}"))?;
        let distribution_id = self.next_id("dist");
        Ok(Distribution {
            origin_id: self.next_id("origin"),
            cache_behavior_ids: vec![self.next_id("behavior")],
            domain_url: format!("https://cdn/{event_id}/index.m3u8"),
            distribution_id,
        })
    }

    async fn remove_cache_behaviors(
        &self,
        distribution_id: &str,
        path_prefix: &str,
    ) -> MediaResult<()> {
        self.record(format!("remove_cache_behaviors {distribution_id} {path_prefix}"))
    }

    async fn remove_origin(&self, distribution_id: &str, origin_id: &str) -> MediaResult<()> {
        self.record(format!("remove_origin {distribution_id} {origin_id}"))
    }
}

/// Object store fake recording every purge and handing out fake signed URLs.
#[derive(Default)]
pub struct RecordingStorage {
    pub purged: Mutex<Vec<(String, String)>>,
}

#[async_trait]
impl ObjectStorage for RecordingStorage {
    async fn delete_prefix(&self, bucket: &str, prefix: &str) -> Result<usize> {
        self.purged
            .lock()
            .unwrap()
            .push((bucket.to_string(), prefix.to_string()));
        Ok(0)
    }

    async fn presign_put(
        &self,
        bucket: &str,
        key: &str,
        _content_type: &str,
        _ttl: Duration,
    ) -> Result<String> {
        Ok(format!("https://signed/{bucket}/{key}?method=put"))
    }

    async fn presign_get(&self, bucket: &str, key: &str, _ttl: Duration) -> Result<String> {
        Ok(format!("https://signed/{bucket}/{key}?method=get"))
    }
}

#[derive(Default)]
pub struct RecordingMailer {
    pub sent: Mutex<Vec<(String, String, String)>>,
}

#[async_trait]
impl PasswordMailer for RecordingMailer {
    async fn send_access_password(
        &self,
        to: &str,
        event_id: &str,
        _event_title: &str,
        password: &str,
    ) -> Result<()> {
        self.sent
            .lock()
            .unwrap()
            .push((to.to_string(), event_id.to_string(), password.to_string()));
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeGateway {
    pub requests: Mutex<Vec<CheckoutSessionRequest>>,
    pub intent_details: Mutex<Option<PaymentIntentDetails>>,
    pub fail_checkout: Mutex<bool>,
    counter: AtomicUsize,
}

#[async_trait]
impl PaymentGateway for FakeGateway {
    async fn create_checkout_session(
        &self,
        request: CheckoutSessionRequest,
    ) -> Result<CheckoutSession> {
        if *self.fail_checkout.lock().unwrap() {
            return Err(AppError::Upstream("payment gateway: injected".into()));
        }
        let n = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        self.requests.lock().unwrap().push(request);
        Ok(CheckoutSession {
            id: format!("cs_test_{n}"),
            url: format!("https://gateway/checkout/cs_test_{n}"),
            status: Some("open".to_string()),
        })
    }

    async fn retrieve_payment_intent(
        &self,
        payment_intent_id: &str,
    ) -> Result<Option<PaymentIntentDetails>> {
        let configured = self.intent_details.lock().unwrap().clone();
        Ok(configured.map(|mut details| {
            details.payment_intent_id = payment_intent_id.to_string();
            details
        }))
    }
}

pub fn test_config() -> Config {
    Config {
        app: AppConfig {
            env: "test".to_string(),
            host: "127.0.0.1".to_string(),
            port: 0,
            frontend_url: "https://front.example".to_string(),
        },
        store: StoreConfig {
            events_table: "events".to_string(),
            viewers_table: "viewers".to_string(),
            payments_table: "payments".to_string(),
            sessions_table: "sessions".to_string(),
            admins_table: "admins".to_string(),
        },
        auth: AuthConfig {
            admin_secret: ADMIN_SECRET.to_string(),
            viewer_secret: VIEWER_SECRET.to_string(),
            admin_access_ttl: 900,
            admin_refresh_ttl: 604800,
            viewer_token_ttl: 3600,
            bcrypt_cost: 4,
        },
        payment: PaymentConfig {
            gateway_secret_key: "sk_test".to_string(),
            webhook_secret: WEBHOOK_SECRET.to_string(),
            webhook_tolerance_secs: 300,
        },
        media: MediaConfig {
            control_url: "http://media.test".to_string(),
            mailer_url: "http://mailer.test".to_string(),
        },
        storage: StorageConfig {
            vod_bucket: "vod-test".to_string(),
            signed_url_ttl_secs: 900,
        },
        teardown: TeardownSettings {
            poll_interval_secs: 0,
            budget_secs: 5,
        },
    }
}

pub struct TestApp {
    pub state: AppState,
    pub store: Arc<MemoryStore>,
    pub media: Arc<FakeMediaControl>,
    pub storage: Arc<RecordingStorage>,
    pub mailer: Arc<RecordingMailer>,
    pub gateway: Arc<FakeGateway>,
    pub clock: Arc<FixedClock>,
    pub config: Config,
}

impl TestApp {
    pub fn event_repo(&self) -> EventRepo {
        EventRepo::new(self.store.clone(), "events")
    }

    pub fn viewer_repo(&self) -> ViewerRepo {
        ViewerRepo::new(self.store.clone(), "viewers")
    }

    pub fn payment_repo(&self) -> PaymentRepo {
        PaymentRepo::new(self.store.clone(), "payments")
    }

    pub fn mint_viewer(&self, event_id: &str, client_viewer_id: &str, is_paid: bool) -> String {
        viewer_token::mint(
            VIEWER_SECRET,
            event_id,
            client_viewer_id,
            is_paid,
            3600,
            self.clock.now(),
        )
        .unwrap()
    }

    pub fn claims(&self, event_id: &str, client_viewer_id: &str, is_paid: bool) -> viewer_token::ViewerClaims {
        let token = self.mint_viewer(event_id, client_viewer_id, is_paid);
        viewer_token::verify(VIEWER_SECRET, &token).unwrap()
    }

    pub fn sign_webhook(&self, payload: &[u8]) -> String {
        let timestamp = self.clock.now().timestamp();
        let mut mac = Hmac::<Sha256>::new_from_slice(WEBHOOK_SECRET.as_bytes()).unwrap();
        mac.update(timestamp.to_string().as_bytes());
        mac.update(b".");
        mac.update(payload);
        format!("t={timestamp},v1={}", hex::encode(mac.finalize().into_bytes()))
    }
}

pub fn spawn_app() -> TestApp {
    let config = test_config();
    let store = Arc::new(MemoryStore::new(schemas(&TableNames::default())));
    let media = Arc::new(FakeMediaControl::default());
    let storage = Arc::new(RecordingStorage::default());
    let mailer = Arc::new(RecordingMailer::default());
    let gateway = Arc::new(FakeGateway::default());
    let clock = Arc::new(FixedClock::new(test_time()));

    let state = AppState::build(
        &config,
        store.clone(),
        media.clone(),
        storage.clone(),
        mailer.clone(),
        gateway.clone(),
        clock.clone(),
    );

    TestApp {
        state,
        store,
        media,
        storage,
        mailer,
        gateway,
        clock,
        config,
    }
}
