use serde::Deserialize;
use std::env;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub app: AppConfig,
    pub store: StoreConfig,
    pub auth: AuthConfig,
    pub payment: PaymentConfig,
    pub media: MediaConfig,
    pub storage: StorageConfig,
    pub teardown: TeardownSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_app_env")]
    pub env: String,

    #[serde(default = "default_app_host")]
    pub host: String,

    #[serde(default = "default_app_port")]
    pub port: u16,

    #[serde(default = "default_frontend_url")]
    pub frontend_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_events_table")]
    pub events_table: String,

    #[serde(default = "default_viewers_table")]
    pub viewers_table: String,

    #[serde(default = "default_payments_table")]
    pub payments_table: String,

    #[serde(default = "default_sessions_table")]
    pub sessions_table: String,

    #[serde(default = "default_admins_table")]
    pub admins_table: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    pub admin_secret: String,

    pub viewer_secret: String,

    #[serde(default = "default_admin_access_ttl")]
    pub admin_access_ttl: i64,

    #[serde(default = "default_admin_refresh_ttl")]
    pub admin_refresh_ttl: i64,

    #[serde(default = "default_viewer_token_ttl")]
    pub viewer_token_ttl: i64,

    #[serde(default = "default_bcrypt_cost")]
    pub bcrypt_cost: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PaymentConfig {
    pub gateway_secret_key: String,

    pub webhook_secret: String,

    #[serde(default = "default_webhook_tolerance")]
    pub webhook_tolerance_secs: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MediaConfig {
    #[serde(default = "default_media_control_url")]
    pub control_url: String,

    #[serde(default = "default_mailer_url")]
    pub mailer_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_vod_bucket")]
    pub vod_bucket: String,

    #[serde(default = "default_signed_url_ttl")]
    pub signed_url_ttl_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TeardownSettings {
    #[serde(default = "default_teardown_poll")]
    pub poll_interval_secs: u64,

    #[serde(default = "default_teardown_budget")]
    pub budget_secs: u64,
}

// Default value functions
fn default_app_env() -> String {
    "development".to_string()
}

fn default_app_host() -> String {
    "0.0.0.0".to_string()
}

fn default_app_port() -> u16 {
    8080
}

fn default_frontend_url() -> String {
    "http://localhost:3000".to_string()
}

fn default_events_table() -> String {
    "events".to_string()
}

fn default_viewers_table() -> String {
    "viewers".to_string()
}

fn default_payments_table() -> String {
    "payments".to_string()
}

fn default_sessions_table() -> String {
    "sessions".to_string()
}

fn default_admins_table() -> String {
    "admins".to_string()
}

fn default_admin_access_ttl() -> i64 {
    900 // 15 minutes
}

fn default_admin_refresh_ttl() -> i64 {
    604800 // 7 days
}

fn default_viewer_token_ttl() -> i64 {
    604800 // 7 days, the maximum
}

fn default_bcrypt_cost() -> u32 {
    10
}

fn default_webhook_tolerance() -> i64 {
    300
}

fn default_media_control_url() -> String {
    "http://localhost:8090".to_string()
}

fn default_mailer_url() -> String {
    "http://localhost:8091".to_string()
}

fn default_vod_bucket() -> String {
    "event-vod-artifacts".to_string()
}

fn default_signed_url_ttl() -> u64 {
    900
}

fn default_teardown_poll() -> u64 {
    15
}

fn default_teardown_budget() -> u64 {
    900
}

fn var_or(key: &str, fallback: impl Fn() -> String) -> String {
    env::var(key).unwrap_or_else(|_| fallback())
}

fn parsed_or<T: std::str::FromStr>(key: &str, fallback: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(fallback)
}

impl Config {
    pub fn from_env() -> Result<Self, envy::Error> {
        dotenv::dotenv().ok();

        let app = AppConfig {
            env: var_or("APP_ENV", default_app_env),
            host: var_or("APP_HOST", default_app_host),
            port: parsed_or("APP_PORT", default_app_port()),
            frontend_url: var_or("FRONTEND_URL", default_frontend_url),
        };

        let store = StoreConfig {
            events_table: var_or("EVENTS_TABLE", default_events_table),
            viewers_table: var_or("VIEWERS_TABLE", default_viewers_table),
            payments_table: var_or("PAYMENTS_TABLE", default_payments_table),
            sessions_table: var_or("SESSIONS_TABLE", default_sessions_table),
            admins_table: var_or("ADMINS_TABLE", default_admins_table),
        };

        let auth = AuthConfig {
            admin_secret: env::var("ADMIN_JWT_SECRET")
                .map_err(|_| envy::Error::MissingValue("ADMIN_JWT_SECRET"))?,
            viewer_secret: env::var("VIEWER_JWT_SECRET")
                .map_err(|_| envy::Error::MissingValue("VIEWER_JWT_SECRET"))?,
            admin_access_ttl: parsed_or("ADMIN_ACCESS_TTL", default_admin_access_ttl()),
            admin_refresh_ttl: parsed_or("ADMIN_REFRESH_TTL", default_admin_refresh_ttl()),
            viewer_token_ttl: parsed_or("VIEWER_TOKEN_TTL", default_viewer_token_ttl()),
            bcrypt_cost: parsed_or("BCRYPT_COST", default_bcrypt_cost()),
        };

        let payment = PaymentConfig {
            gateway_secret_key: env::var("STRIPE_SECRET_KEY")
                .map_err(|_| envy::Error::MissingValue("STRIPE_SECRET_KEY"))?,
            webhook_secret: env::var("STRIPE_WEBHOOK_SECRET")
                .map_err(|_| envy::Error::MissingValue("STRIPE_WEBHOOK_SECRET"))?,
            webhook_tolerance_secs: parsed_or("WEBHOOK_TOLERANCE_SECS", default_webhook_tolerance()),
        };

        let media = MediaConfig {
            control_url: var_or("MEDIA_CONTROL_URL", default_media_control_url),
            mailer_url: var_or("MAILER_URL", default_mailer_url),
        };

        let storage = StorageConfig {
            vod_bucket: var_or("VOD_BUCKET", default_vod_bucket),
            signed_url_ttl_secs: parsed_or("SIGNED_URL_TTL_SECS", default_signed_url_ttl()),
        };

        let teardown = TeardownSettings {
            poll_interval_secs: parsed_or("TEARDOWN_POLL_SECS", default_teardown_poll()),
            budget_secs: parsed_or("TEARDOWN_BUDGET_SECS", default_teardown_budget()),
        };

        Ok(Config {
            app,
            store,
            auth,
            payment,
            media,
            storage,
            teardown,
        })
    }
}
