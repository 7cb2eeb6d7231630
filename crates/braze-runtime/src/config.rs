//! Configuration loading.
//!
//! Sources, lowest to highest priority:
//!
//! 1. built-in defaults,
//! 2. `braze.toml` (or the file named by `BRAZE_CONFIG`),
//! 3. `BRAZE_*` environment variables, nested with `__`
//!    (`BRAZE_RATE_LIMIT__CAPACITY=40` sets `rate_limit.capacity`).

use std::path::PathBuf;
use std::time::Duration;

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use braze_chat::ChatSettings;
use braze_guard::{BanCooldown, BanSettings, RateLimitSettings};

const CONFIG_FILE: &str = "braze.toml";
const ENV_PREFIX: &str = "BRAZE_";

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read configuration: {0}")]
    Load(#[from] figment::Error),
}

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BrazeConfig {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    #[serde(default)]
    pub moderation: ModerationConfig,
    #[serde(default)]
    pub chat: ChatConfig,
}

impl BrazeConfig {
    /// Loads configuration from the default sources.
    pub fn load() -> Result<Self, ConfigError> {
        let file = std::env::var("BRAZE_CONFIG").unwrap_or_else(|_| CONFIG_FILE.to_string());
        Self::load_from(&file)
    }

    /// Loads configuration with an explicit file path.
    pub fn load_from(file: &str) -> Result<Self, ConfigError> {
        let config = Figment::from(Serialized::defaults(Self::default()))
            .merge(Toml::file(file))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()?;
        Ok(config)
    }
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Base level directive, overridden by `RUST_LOG` when set.
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Optional log file; stdout when absent.
    #[serde(default)]
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Key namespace settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Prefix for every persisted key.
    #[serde(default = "default_prefix")]
    pub prefix: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            prefix: default_prefix(),
        }
    }
}

fn default_prefix() -> String {
    "braze".to_string()
}

/// Per-member token bucket settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    #[serde(default = "default_capacity")]
    pub capacity: u32,
    #[serde(default = "default_refill_per_sec")]
    pub refill_per_sec: f64,
    #[serde(default = "default_cost")]
    pub cost: u32,
    #[serde(default = "default_sticker_cost")]
    pub sticker_cost: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            capacity: default_capacity(),
            refill_per_sec: default_refill_per_sec(),
            cost: default_cost(),
            sticker_cost: default_sticker_cost(),
        }
    }
}

impl RateLimitConfig {
    pub fn to_settings(&self) -> RateLimitSettings {
        RateLimitSettings {
            capacity: self.capacity,
            refill_per_sec: self.refill_per_sec,
            cost: self.cost,
            sticker_cost: self.sticker_cost,
        }
    }
}

fn default_capacity() -> u32 {
    20
}

fn default_refill_per_sec() -> f64 {
    0.5
}

fn default_cost() -> u32 {
    1
}

fn default_sticker_cost() -> u32 {
    3
}

/// Ban command and issuer cooldown settings, in seconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModerationConfig {
    #[serde(default = "default_ban_secs")]
    pub default_ban_secs: u64,
    #[serde(default = "default_self_ban_min_secs")]
    pub self_ban_min_secs: u64,
    #[serde(default = "default_self_ban_max_secs")]
    pub self_ban_max_secs: u64,
    #[serde(default = "default_cooldown_ratio")]
    pub cooldown_ratio: f64,
    #[serde(default = "default_cooldown_min_secs")]
    pub cooldown_min_secs: u64,
    #[serde(default = "default_cooldown_max_secs")]
    pub cooldown_max_secs: u64,
}

impl Default for ModerationConfig {
    fn default() -> Self {
        Self {
            default_ban_secs: default_ban_secs(),
            self_ban_min_secs: default_self_ban_min_secs(),
            self_ban_max_secs: default_self_ban_max_secs(),
            cooldown_ratio: default_cooldown_ratio(),
            cooldown_min_secs: default_cooldown_min_secs(),
            cooldown_max_secs: default_cooldown_max_secs(),
        }
    }
}

impl ModerationConfig {
    pub fn to_ban_settings(&self) -> BanSettings {
        BanSettings {
            default_duration: Duration::from_secs(self.default_ban_secs),
            self_ban_min: Duration::from_secs(self.self_ban_min_secs),
            self_ban_max: Duration::from_secs(self.self_ban_max_secs),
        }
    }

    pub fn to_cooldown(&self) -> BanCooldown {
        BanCooldown {
            ratio: self.cooldown_ratio,
            min: Duration::from_secs(self.cooldown_min_secs),
            max: Duration::from_secs(self.cooldown_max_secs),
        }
    }
}

fn default_ban_secs() -> u64 {
    60
}

fn default_self_ban_min_secs() -> u64 {
    60
}

fn default_self_ban_max_secs() -> u64 {
    120
}

fn default_cooldown_ratio() -> f64 {
    2.0
}

fn default_cooldown_min_secs() -> u64 {
    60
}

fn default_cooldown_max_secs() -> u64 {
    1200
}

/// Completion worker settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatConfig {
    #[serde(default = "default_queue_depth")]
    pub queue_depth: usize,
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,
    #[serde(default = "default_keep_context")]
    pub keep_context: usize,
    #[serde(default = "default_flush_secs")]
    pub flush_secs: u64,
    #[serde(default = "default_prompt_limit")]
    pub prompt_limit: usize,
    #[serde(default)]
    pub system_prompt: Option<String>,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            queue_depth: default_queue_depth(),
            max_workers: default_max_workers(),
            keep_context: default_keep_context(),
            flush_secs: default_flush_secs(),
            prompt_limit: default_prompt_limit(),
            system_prompt: None,
        }
    }
}

impl ChatConfig {
    pub fn to_settings(&self) -> ChatSettings {
        ChatSettings {
            queue_depth: self.queue_depth,
            max_workers: self.max_workers,
            keep_context: self.keep_context,
            flush_interval: Duration::from_secs(self.flush_secs),
            prompt_limit: self.prompt_limit,
            system_prompt: self.system_prompt.clone(),
            ..ChatSettings::default()
        }
    }
}

fn default_queue_depth() -> usize {
    16
}

fn default_max_workers() -> usize {
    8
}

fn default_keep_context() -> usize {
    5
}

fn default_flush_secs() -> u64 {
    2
}

fn default_prompt_limit() -> usize {
    1000
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_complete() {
        let config = BrazeConfig::default();
        assert_eq!(config.rate_limit.capacity, 20);
        assert_eq!(config.chat.queue_depth, 16);
        assert_eq!(config.moderation.cooldown_max_secs, 1200);
        assert_eq!(config.store.prefix, "braze");
    }

    #[test]
    fn toml_overrides_defaults() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                "braze.toml",
                r#"
                    [rate_limit]
                    capacity = 40

                    [chat]
                    system_prompt = "be brief"
                "#,
            )?;
            let config = BrazeConfig::load_from("braze.toml").expect("load");
            assert_eq!(config.rate_limit.capacity, 40);
            assert_eq!(config.chat.system_prompt.as_deref(), Some("be brief"));
            // Untouched sections keep their defaults.
            assert_eq!(config.chat.queue_depth, 16);
            Ok(())
        });
    }

    #[test]
    fn env_overrides_file() {
        figment::Jail::expect_with(|jail| {
            jail.create_file("braze.toml", "[chat]\nqueue_depth = 8\n")?;
            jail.set_env("BRAZE_CHAT__QUEUE_DEPTH", "32");
            let config = BrazeConfig::load_from("braze.toml").expect("load");
            assert_eq!(config.chat.queue_depth, 32);
            Ok(())
        });
    }

    #[test]
    fn conversions_produce_durations() {
        let config = BrazeConfig::default();
        assert_eq!(
            config.moderation.to_ban_settings().default_duration,
            Duration::from_secs(60)
        );
        assert_eq!(
            config.chat.to_settings().flush_interval,
            Duration::from_secs(2)
        );
    }
}
