//! Runtime configuration, layered with `figment`: built-in defaults, then
//! an optional TOML file, then environment variables (highest priority),
//! matching the precedence order the teacher's config loader documents.

use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

use crate::domain::error::Result;
use crate::metrics::MetricsConfig;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    pub api: ApiConfig,
    pub logging: LoggingConfig,
    pub object_store: ObjectStoreConfig,
    pub cdn: CdnConfig,
    pub upstream: UpstreamConfig,
    pub budget: BudgetConfig,
    pub rate_limit: RateLimitConfig,
    pub metrics: MetricsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_pool_size")]
    pub pool_size: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_frontend_url")]
    pub frontend_url: String,
    #[serde(default = "default_app_env")]
    pub app_env: String,
}

impl ApiConfig {
    pub fn is_production(&self) -> bool {
        self.app_env == "production"
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectStoreConfig {
    #[serde(default)]
    pub access_key_id: Option<String>,
    #[serde(default)]
    pub secret_access_key: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub bucket: Option<String>,
    #[serde(default = "default_local_store_dir")]
    pub local_dir: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CdnConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub zone_id: Option<String>,
    #[serde(default)]
    pub api_token: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    #[serde(default)]
    pub google_places_api_key: Option<String>,
    #[serde(default)]
    pub yelp_api_key: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BudgetConfig {
    #[serde(default = "default_budget_monthly_usd")]
    pub monthly_usd: f64,
    #[serde(default = "default_alert_threshold")]
    pub alert_threshold: f32,
    #[serde(default = "default_emergency_threshold")]
    pub emergency_threshold: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    #[serde(default = "default_rate_limit_per_hour")]
    pub per_hour: u32,
    #[serde(default = "default_rate_limit_per_day")]
    pub per_day: u32,
}

fn default_pool_size() -> u32 {
    10
}
fn default_port() -> u16 {
    3000
}
fn default_frontend_url() -> String {
    "http://localhost:5173".to_string()
}
fn default_app_env() -> String {
    "development".to_string()
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_local_store_dir() -> String {
    "./data/objects".to_string()
}
fn default_budget_monthly_usd() -> f64 {
    20.0
}
fn default_alert_threshold() -> f32 {
    0.80
}
fn default_emergency_threshold() -> f32 {
    0.95
}
fn default_rate_limit_per_hour() -> u32 {
    1_000
}
fn default_rate_limit_per_day() -> u32 {
    10_000
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: DatabaseConfig { url: "sqlite:venue-ingest.db".to_string(), pool_size: default_pool_size() },
            api: ApiConfig {
                port: default_port(),
                frontend_url: default_frontend_url(),
                app_env: default_app_env(),
            },
            logging: LoggingConfig { level: default_log_level(), json: false },
            object_store: ObjectStoreConfig {
                access_key_id: None,
                secret_access_key: None,
                region: None,
                bucket: None,
                local_dir: default_local_store_dir(),
            },
            cdn: CdnConfig { enabled: false, base_url: None, zone_id: None, api_token: None },
            upstream: UpstreamConfig { google_places_api_key: None, yelp_api_key: None },
            budget: BudgetConfig {
                monthly_usd: default_budget_monthly_usd(),
                alert_threshold: default_alert_threshold(),
                emergency_threshold: default_emergency_threshold(),
            },
            rate_limit: RateLimitConfig { per_hour: default_rate_limit_per_hour(), per_day: default_rate_limit_per_day() },
            metrics: MetricsConfig::default(),
        }
    }
}

impl Config {
    /// Loads configuration from, in ascending priority: built-in defaults,
    /// `config.toml` in the current directory (if present), then
    /// environment variables. `DATABASE_URL` and friends map onto nested
    /// keys via `Env::prefixed("")` with `.split("_")` left to figment's
    /// default env-var dotting; most are single top-level overrides so we
    /// wire them in explicitly instead of relying on nested env key guessing.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Same precedence order as `load`, but reading the TOML layer from an
    /// explicit path (the composition root's `--config` flag) instead of
    /// the current directory's `config.toml`.
    pub fn load_from(config_path: Option<&std::path::Path>) -> Result<Self> {
        let toml_path = config_path
            .map(std::path::Path::to_path_buf)
            .unwrap_or_else(|| std::path::PathBuf::from("config.toml"));

        let figment = Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::file(toml_path))
            .merge(Env::raw().only(&["DATABASE_URL"]).map(|_| "database.url".into()))
            .merge(Env::raw().only(&["PORT"]).map(|_| "api.port".into()))
            .merge(Env::raw().only(&["FRONTEND_URL"]).map(|_| "api.frontend_url".into()))
            .merge(Env::raw().only(&["APP_ENV"]).map(|_| "api.app_env".into()))
            .merge(Env::raw().only(&["OBJECT_STORE_ACCESS_KEY_ID"]).map(|_| "object_store.access_key_id".into()))
            .merge(Env::raw().only(&["OBJECT_STORE_SECRET_ACCESS_KEY"]).map(|_| "object_store.secret_access_key".into()))
            .merge(Env::raw().only(&["OBJECT_STORE_REGION"]).map(|_| "object_store.region".into()))
            .merge(Env::raw().only(&["OBJECT_STORE_BUCKET"]).map(|_| "object_store.bucket".into()))
            .merge(Env::raw().only(&["CDN_ENABLED"]).map(|_| "cdn.enabled".into()))
            .merge(Env::raw().only(&["CDN_BASE_URL"]).map(|_| "cdn.base_url".into()))
            .merge(Env::raw().only(&["CDN_ZONE_ID"]).map(|_| "cdn.zone_id".into()))
            .merge(Env::raw().only(&["CDN_API_TOKEN"]).map(|_| "cdn.api_token".into()))
            .merge(Env::raw().only(&["GOOGLE_PLACES_API_KEY"]).map(|_| "upstream.google_places_api_key".into()))
            .merge(Env::raw().only(&["YELP_API_KEY"]).map(|_| "upstream.yelp_api_key".into()))
            .merge(Env::raw().only(&["BUDGET_MONTHLY_USD"]).map(|_| "budget.monthly_usd".into()))
            .merge(Env::raw().only(&["BUDGET_ALERT_THRESHOLD"]).map(|_| "budget.alert_threshold".into()))
            .merge(Env::raw().only(&["BUDGET_EMERGENCY_THRESHOLD"]).map(|_| "budget.emergency_threshold".into()))
            .merge(Env::raw().only(&["RATE_LIMIT_PER_HOUR"]).map(|_| "rate_limit.per_hour".into()))
            .merge(Env::raw().only(&["RATE_LIMIT_PER_DAY"]).map(|_| "rate_limit.per_day".into()))
            .merge(Env::raw().only(&["METRICS_ENABLED"]).map(|_| "metrics.enabled".into()))
            .merge(Env::raw().only(&["METRICS_PROMETHEUS_ADDR"]).map(|_| "metrics.prometheus_addr".into()));

        figment.extract().map_err(|e| crate::domain::error::IngestError::config(e.to_string()))
    }

    pub fn default_sqlite() -> Self {
        Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_sane_budget_thresholds() {
        let config = Config::default();
        assert_eq!(config.budget.monthly_usd, 20.0);
        assert_eq!(config.budget.alert_threshold, 0.80);
        assert_eq!(config.budget.emergency_threshold, 0.95);
    }

    #[test]
    fn load_falls_back_to_defaults_when_no_file_or_env_present() {
        figment::Jail::expect_with(|_jail| {
            let config = Config::load().expect("config loads from defaults alone");
            assert_eq!(config.api.port, 3000);
            assert!(!config.api.is_production());
            Ok(())
        });
    }

    #[test]
    fn env_var_overrides_the_default_port() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("PORT", "8080");
            let config = Config::load().expect("config loads with env override");
            assert_eq!(config.api.port, 8080);
            Ok(())
        });
    }
}
