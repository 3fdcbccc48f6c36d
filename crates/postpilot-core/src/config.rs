use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::types::Platform;

pub const DEFAULT_PORT: u16 = 8000;
pub const DEFAULT_BIND: &str = "127.0.0.1";
pub const HEARTBEAT_INTERVAL_SECS: u64 = 30; // server ping cadence on live channels
pub const DEFAULT_TICK_SECS: u64 = 30;
pub const DEFAULT_REMINDER_LEAD_MINUTES: i64 = 10;
pub const DEFAULT_REMINDER_TOLERANCE_MINUTES: i64 = 2;
pub const DEFAULT_RETENTION_DAYS: i64 = 30;

/// Top-level config (postpilot.toml + POSTPILOT_* env overrides).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PostpilotConfig {
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub notifications: NotificationsConfig,
    #[serde(default)]
    pub instagram: GraphApiConfig,
    #[serde(default = "GraphApiConfig::facebook")]
    pub facebook: GraphApiConfig,
    pub cloudinary: Option<CloudinaryConfig>,
    pub stability: Option<StabilityConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            bind: DEFAULT_BIND.to_string(),
        }
    }
}

/// Bearer tokens are HS256 JWTs signed with this secret.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(default = "default_jwt_secret")]
    pub jwt_secret: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: default_jwt_secret(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

/// Scan loop cadence and the pre-alert window.
///
/// The reminder fires while `minutes_until` lies in
/// `[lead - tolerance, lead + tolerance]`. The tick must be short enough to
/// sample that window several times; 30 s against a 4-minute window gives
/// eight samples.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    #[serde(default = "default_tick_secs")]
    pub tick_secs: u64,
    /// Platforms the due-post executor publishes to.
    #[serde(default = "default_platforms")]
    pub platforms: Vec<Platform>,
    #[serde(default = "default_lead")]
    pub reminder_lead_minutes: i64,
    #[serde(default = "default_tolerance")]
    pub reminder_tolerance_minutes: i64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_secs: DEFAULT_TICK_SECS,
            platforms: default_platforms(),
            reminder_lead_minutes: DEFAULT_REMINDER_LEAD_MINUTES,
            reminder_tolerance_minutes: DEFAULT_REMINDER_TOLERANCE_MINUTES,
        }
    }
}

impl SchedulerConfig {
    /// Inclusive `(min, max)` bounds of the pre-alert window in minutes.
    pub fn reminder_window(&self) -> (i64, i64) {
        (
            self.reminder_lead_minutes - self.reminder_tolerance_minutes,
            self.reminder_lead_minutes + self.reminder_tolerance_minutes,
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationsConfig {
    /// Notifications older than this are deleted by the retention task.
    #[serde(default = "default_retention_days")]
    pub retention_days: i64,
    #[serde(default = "default_cleanup_hours")]
    pub cleanup_interval_hours: u64,
    /// Per-connection outbound queue depth; a full queue counts as a dead channel.
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

impl Default for NotificationsConfig {
    fn default() -> Self {
        Self {
            retention_days: DEFAULT_RETENTION_DAYS,
            cleanup_interval_hours: default_cleanup_hours(),
            channel_capacity: default_channel_capacity(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphApiConfig {
    #[serde(default = "default_instagram_graph_url")]
    pub graph_base_url: String,
}

impl Default for GraphApiConfig {
    fn default() -> Self {
        Self {
            graph_base_url: default_instagram_graph_url(),
        }
    }
}

impl GraphApiConfig {
    fn facebook() -> Self {
        Self {
            graph_base_url: "https://graph.facebook.com/v19.0".to_string(),
        }
    }
}

/// Media host used to turn raw image bytes into public URLs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CloudinaryConfig {
    pub cloud_name: String,
    /// Unsigned upload preset configured in the Cloudinary console.
    pub upload_preset: String,
    #[serde(default = "default_cloudinary_folder")]
    pub folder: String,
}

/// AI image generation backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StabilityConfig {
    pub api_key: String,
    #[serde(default = "default_stability_base_url")]
    pub base_url: String,
    #[serde(default = "default_stability_engine")]
    pub engine: String,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_bind() -> String {
    DEFAULT_BIND.to_string()
}
fn default_jwt_secret() -> String {
    "change-me".to_string()
}
fn default_tick_secs() -> u64 {
    DEFAULT_TICK_SECS
}
fn default_platforms() -> Vec<Platform> {
    vec![Platform::Instagram]
}
fn default_lead() -> i64 {
    DEFAULT_REMINDER_LEAD_MINUTES
}
fn default_tolerance() -> i64 {
    DEFAULT_REMINDER_TOLERANCE_MINUTES
}
fn default_retention_days() -> i64 {
    DEFAULT_RETENTION_DAYS
}
fn default_cleanup_hours() -> u64 {
    24
}
fn default_channel_capacity() -> usize {
    64
}
fn default_instagram_graph_url() -> String {
    "https://graph.facebook.com/v19.0".to_string()
}
fn default_cloudinary_folder() -> String {
    "instagram".to_string()
}
fn default_stability_base_url() -> String {
    "https://api.stability.ai".to_string()
}
fn default_stability_engine() -> String {
    "stable-diffusion-xl-1024-v1-0".to_string()
}
fn default_db_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.postpilot/postpilot.db", home)
}

impl PostpilotConfig {
    /// Load config from a TOML file with POSTPILOT_* env var overrides.
    ///
    /// Nested keys use a double underscore, e.g.
    /// `POSTPILOT_SCHEDULER__TICK_SECS=10`.
    pub fn load(config_path: Option<&str>) -> crate::error::Result<Self> {
        let path = config_path
            .map(String::from)
            .unwrap_or_else(default_config_path);

        let config: PostpilotConfig = Figment::new()
            .merge(Toml::file(&path))
            .merge(Env::prefixed("POSTPILOT_").split("__"))
            .extract()
            .map_err(|e| crate::error::PostpilotError::Config(e.to_string()))?;

        Ok(config)
    }
}

fn default_config_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.postpilot/postpilot.toml", home)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_reminder_window() {
        let cfg = PostpilotConfig::default();
        assert_eq!(cfg.scheduler.tick_secs, 30);
        assert_eq!(cfg.scheduler.reminder_window(), (8, 12));
        assert_eq!(cfg.scheduler.platforms, vec![Platform::Instagram]);
        assert_eq!(cfg.notifications.retention_days, 30);
    }

    #[test]
    fn toml_and_env_are_merged() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                "postpilot.toml",
                r#"
                [gateway]
                port = 9100

                [scheduler]
                platforms = ["instagram", "facebook"]

                [cloudinary]
                cloud_name = "demo"
                upload_preset = "unsigned"
                "#,
            )?;
            jail.set_env("POSTPILOT_SCHEDULER__TICK_SECS", "5");

            let cfg = PostpilotConfig::load(Some("postpilot.toml")).expect("config loads");
            assert_eq!(cfg.gateway.port, 9100);
            assert_eq!(cfg.gateway.bind, DEFAULT_BIND);
            assert_eq!(cfg.scheduler.tick_secs, 5);
            assert_eq!(
                cfg.scheduler.platforms,
                vec![Platform::Instagram, Platform::Facebook]
            );
            let cloudinary = cfg.cloudinary.expect("cloudinary section");
            assert_eq!(cloudinary.folder, "instagram");
            assert!(cfg.stability.is_none());
            Ok(())
        });
    }
}
