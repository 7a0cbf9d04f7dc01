//! # gb-config
//!
//! Layered runtime settings: built-in defaults, then an optional
//! `config/guestbook.toml`, then `GUESTBOOK__SECTION__KEY` environment
//! variables (a `.env` file is loaded into the environment first).

use std::time::Duration;

use chrono::FixedOffset;
use config::builder::DefaultState;
use config::{Config, ConfigBuilder, Environment, File};
use gb_core::moderation::ListingPages;
use gb_core::submission::SubmissionLimits;
use gb_core::{PublicationPolicy, SiteInfo};
use secrecy::SecretString;
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load settings: {0}")]
    Load(#[from] config::ConfigError),

    #[error("invalid setting `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    /// Proxies that append to `X-Forwarded-For`. Unset when the edge
    /// rewrites the header; `0` when clients connect directly.
    #[serde(default)]
    pub trusted_proxy_hops: Option<usize>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseSettings {
    pub url: String,
}

/// Where uploaded photos land on disk and the URL prefix they are served under.
#[derive(Debug, Clone, Deserialize)]
pub struct MediaSettings {
    pub root: String,
    pub url_prefix: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TelegramSettings {
    pub bot_token: SecretString,
    pub chat_id: i64,
    pub api_base: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GuestbookSettings {
    pub publication: PublicationPolicy,
    pub submissions_per_window: u32,
    pub window_secs: u64,
    pub pending_page_size: i64,
    pub list_page_size: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VisitorSettings {
    pub window_minutes: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SiteSettings {
    pub public_base_url: String,
    /// Offset applied to timestamps shown to the operator, in minutes east of UTC
    pub utc_offset_minutes: i32,
    pub zone_label: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IdentitySettings {
    pub salt: SecretString,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub server: ServerSettings,
    pub database: DatabaseSettings,
    pub media: MediaSettings,
    pub telegram: TelegramSettings,
    pub guestbook: GuestbookSettings,
    pub visitors: VisitorSettings,
    pub site: SiteSettings,
    pub identity: IdentitySettings,
}

impl Settings {
    /// Reads `.env`, the optional settings file and the environment.
    pub fn load() -> Result<Self, ConfigError> {
        if let Ok(path) = dotenvy::dotenv() {
            tracing::debug!(path = %path.display(), "loaded .env");
        }

        let config = defaults()?
            .add_source(File::with_name("config/guestbook").required(false))
            .add_source(Environment::with_prefix("GUESTBOOK").separator("__"))
            .build()?;
        Self::from_config(config)
    }

    pub fn from_config(config: Config) -> Result<Self, ConfigError> {
        let settings: Settings = config.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.guestbook.window_secs == 0 {
            return Err(invalid("guestbook.window_secs", "must be positive"));
        }
        if self.guestbook.pending_page_size <= 0 || self.guestbook.list_page_size <= 0 {
            return Err(invalid("guestbook.*_page_size", "must be positive"));
        }
        if self.visitors.window_minutes == 0 {
            return Err(invalid("visitors.window_minutes", "must be positive"));
        }
        self.utc_offset()?;
        Ok(())
    }

    fn utc_offset(&self) -> Result<FixedOffset, ConfigError> {
        self.site
            .utc_offset_minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
            .ok_or_else(|| invalid("site.utc_offset_minutes", "out of range"))
    }

    pub fn bind_address(&self) -> (String, u16) {
        (self.server.host.clone(), self.server.port)
    }

    pub fn site_info(&self) -> Result<SiteInfo, ConfigError> {
        Ok(SiteInfo {
            public_base_url: self.site.public_base_url.trim_end_matches('/').to_string(),
            utc_offset: self.utc_offset()?,
            zone_label: self.site.zone_label.clone(),
        })
    }

    pub fn submission_limits(&self) -> SubmissionLimits {
        SubmissionLimits {
            max_per_window: self.guestbook.submissions_per_window,
            window: Duration::from_secs(self.guestbook.window_secs),
        }
    }

    pub fn listing_pages(&self) -> ListingPages {
        ListingPages {
            pending: self.guestbook.pending_page_size,
            all: self.guestbook.list_page_size,
        }
    }

    pub fn visitor_window(&self) -> Duration {
        Duration::from_secs(self.visitors.window_minutes * 60)
    }
}

fn invalid(key: &'static str, reason: &str) -> ConfigError {
    ConfigError::Invalid { key, reason: reason.to_string() }
}

/// Builder pre-filled with every default; callers add their own sources on top.
pub fn defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    let builder = Config::builder()
        .set_default("server.host", "0.0.0.0")?
        .set_default("server.port", 8080)?
        .set_default("database.url", "sqlite://guestbook.db")?
        .set_default("media.root", "./uploads")?
        .set_default("media.url_prefix", "/uploads")?
        .set_default("telegram.bot_token", "")?
        .set_default("telegram.chat_id", 0)?
        .set_default("telegram.api_base", "https://api.telegram.org")?
        .set_default("guestbook.publication", "auto")?
        .set_default("guestbook.submissions_per_window", 5)?
        .set_default("guestbook.window_secs", 3600)?
        .set_default("guestbook.pending_page_size", 10)?
        .set_default("guestbook.list_page_size", 50)?
        .set_default("visitors.window_minutes", 10)?
        .set_default("site.public_base_url", "http://localhost:8080")?
        .set_default("site.utc_offset_minutes", 240)?
        .set_default("site.zone_label", "GST")?
        .set_default("identity.salt", "")?;
    Ok(builder)
}
