use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{str::FromStr, time::Duration};

use crate::audio::session::SessionSettings;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    // Discord
    pub discord_token: String,
    pub application_id: u64,
    pub guild_id: Option<u64>, // Para comandos de desarrollo

    // Audio
    pub default_volume: f32,
    pub idle_timeout_secs: u64,

    // Resolución
    pub resolve_timeout_secs: u64,
    pub max_concurrent_resolves: usize,
    pub ytdlp_path: String,
}

impl Config {
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self::from_lookup(|key| std::env::var(key).ok())?;

        // Validate configuration before returning
        config.validate()?;

        Ok(config)
    }

    /// Builds the configuration from any key/value source.
    ///
    /// Missing optional keys fall back to [`Config::default`]; present but
    /// malformed values are errors rather than silently defaulted.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();

        Ok(Self {
            // Discord
            discord_token: lookup("DISCORD_TOKEN").context("DISCORD_TOKEN no está definido")?,
            application_id: required(&lookup, "APPLICATION_ID")?,
            guild_id: lookup("GUILD_ID").and_then(|s| s.trim().parse().ok()),

            // Audio
            default_volume: optional(&lookup, "DEFAULT_VOLUME", defaults.default_volume)?,
            idle_timeout_secs: optional(&lookup, "IDLE_TIMEOUT_SECS", defaults.idle_timeout_secs)?,

            // Resolución
            resolve_timeout_secs: optional(
                &lookup,
                "RESOLVE_TIMEOUT_SECS",
                defaults.resolve_timeout_secs,
            )?,
            max_concurrent_resolves: optional(
                &lookup,
                "MAX_CONCURRENT_RESOLVES",
                defaults.max_concurrent_resolves,
            )?,
            ytdlp_path: lookup("YTDLP_PATH")
                .filter(|s| !s.trim().is_empty())
                .unwrap_or(defaults.ytdlp_path),
        })
    }

    /// Validates configuration values for correctness.
    ///
    /// # Validation Rules
    ///
    /// - Token must be present
    /// - Volume must be between 0.0 and 1.0
    /// - Timeouts and the resolve concurrency limit must be greater than 0
    pub fn validate(&self) -> Result<()> {
        if self.discord_token.trim().is_empty() {
            anyhow::bail!("DISCORD_TOKEN cannot be empty");
        }

        if !(0.0..=1.0).contains(&self.default_volume) {
            anyhow::bail!("Default volume must be between 0.0 and 1.0, got: {}", self.default_volume);
        }

        if self.idle_timeout_secs == 0 {
            anyhow::bail!("Idle timeout must be greater than 0");
        }

        if self.resolve_timeout_secs == 0 {
            anyhow::bail!("Resolve timeout must be greater than 0");
        }

        if self.max_concurrent_resolves == 0 {
            anyhow::bail!("Max concurrent resolves must be greater than 0");
        }

        Ok(())
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    pub fn resolve_timeout(&self) -> Duration {
        Duration::from_secs(self.resolve_timeout_secs)
    }

    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            idle_timeout: self.idle_timeout(),
            default_volume: self.default_volume,
        }
    }

    /// Returns a summary of the current configuration for logging.
    ///
    /// The token is never included.
    pub fn summary(&self) -> String {
        format!(
            "Config Summary:\n  \
            Discord: App ID {} (Guild: {})\n  \
            Audio: {}% vol, idle timeout {}\n  \
            Resolver: {} ({} concurrent, timeout {})",
            self.application_id,
            self.guild_id.map_or("global".to_string(), |id| id.to_string()),
            (self.default_volume * 100.0).round() as u32,
            humantime::format_duration(self.idle_timeout()),
            self.ytdlp_path,
            self.max_concurrent_resolves,
            humantime::format_duration(self.resolve_timeout()),
        )
    }
}

/// Default configuration values.
///
/// Used as fallbacks when environment variables are not provided.
impl Default for Config {
    fn default() -> Self {
        Self {
            // Discord (no defaults - must be provided)
            discord_token: String::new(),
            application_id: 0,
            guild_id: None,

            // Audio defaults
            default_volume: 0.5,
            idle_timeout_secs: 180, // 3 minutos

            // Resolver defaults
            resolve_timeout_secs: 60,
            max_concurrent_resolves: 3,
            ytdlp_path: "yt-dlp".to_string(),
        }
    }
}

fn required<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw = lookup(key).with_context(|| format!("{} no está definido", key))?;
    raw.trim()
        .parse()
        .with_context(|| format!("{} tiene un valor inválido: {:?}", key, raw))
}

fn optional<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .with_context(|| format!("{} tiene un valor inválido: {:?}", key, raw)),
        _ => Ok(default),
    }
}
