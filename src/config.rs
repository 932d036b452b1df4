// src/config.rs
//! Runtime configuration loaded from the environment (after `.env`).

use crate::error::AppError;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_DATABASE_URL: &str = "sqlite://video_info.db?mode=rwc";
pub const DEFAULT_DOWNLOAD_COMMAND: &str = "yt-dlp";
pub const DEFAULT_WATERMARK_TEXT: &str = "Watermark";

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub download: DownloadConfig,
    pub watermark: WatermarkConfig,
    pub tiktok: TikTokConfig,
    pub youtube: YouTubeConfig,
}

#[derive(Debug, Clone)]
pub struct DownloadConfig {
    pub download_dir: PathBuf,
    /// Executable that fetches a video URL into a directory (yt-dlp compatible flags).
    pub command: String,
    pub timeout: Duration,
    pub poll_interval: Duration,
}

#[derive(Debug, Clone)]
pub struct WatermarkConfig {
    pub output_dir: PathBuf,
    pub text: String,
    pub margin: u32,
    pub font_file: Option<String>,
    pub font_color: String,
    pub max_output_seconds: f64,
}

#[derive(Debug, Clone)]
pub struct TikTokConfig {
    pub access_token: Option<String>,
    pub privacy_level: String,
}

#[derive(Debug, Clone)]
pub struct YouTubeConfig {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub refresh_token: Option<String>,
    pub privacy_status: String,
    pub category_id: String,
    pub like_after_upload: bool,
}

impl AppConfig {
    /// Load config from process environment variables
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load config through an arbitrary key lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let download = DownloadConfig {
            download_dir: PathBuf::from(get("DOWNLOAD_DIR").unwrap_or_else(|| "downloads".to_string())),
            command: get("DOWNLOAD_COMMAND").unwrap_or_else(|| DEFAULT_DOWNLOAD_COMMAND.to_string()),
            timeout: Duration::from_secs(parse_or(&get, "DOWNLOAD_TIMEOUT_SECS", 300u64)?),
            poll_interval: Duration::from_secs(parse_or(&get, "DOWNLOAD_POLL_INTERVAL_SECS", 5u64)?),
        };

        if download.poll_interval.is_zero() {
            return Err(AppError::config("DOWNLOAD_POLL_INTERVAL_SECS must be greater than zero"));
        }

        let watermark = WatermarkConfig {
            output_dir: PathBuf::from(get("EDITED_DIR").unwrap_or_else(|| "edited".to_string())),
            text: get("WATERMARK_TEXT").unwrap_or_else(|| DEFAULT_WATERMARK_TEXT.to_string()),
            margin: parse_or(&get, "WATERMARK_MARGIN", 20u32)?,
            font_file: get("WATERMARK_FONT"),
            font_color: get("WATERMARK_COLOR").unwrap_or_else(|| "blue".to_string()),
            max_output_seconds: parse_or(&get, "MAX_OUTPUT_SECONDS", 59.9f64)?,
        };

        if watermark.max_output_seconds <= 0.0 {
            return Err(AppError::config("MAX_OUTPUT_SECONDS must be positive"));
        }

        let tiktok = TikTokConfig {
            access_token: get("TIKTOK_ACCESS_TOKEN"),
            privacy_level: get("TIKTOK_PRIVACY_LEVEL")
                .unwrap_or_else(|| "PUBLIC_TO_EVERYONE".to_string()),
        };

        let youtube = YouTubeConfig {
            client_id: get("YOUTUBE_CLIENT_ID"),
            client_secret: get("YOUTUBE_CLIENT_SECRET"),
            refresh_token: get("YOUTUBE_REFRESH_TOKEN"),
            privacy_status: get("YOUTUBE_PRIVACY_STATUS").unwrap_or_else(|| "public".to_string()),
            category_id: get("YOUTUBE_CATEGORY_ID").unwrap_or_else(|| "22".to_string()),
            like_after_upload: parse_bool_or(&get, "YOUTUBE_LIKE_AFTER_UPLOAD", true)?,
        };

        if !["public", "private", "unlisted"].contains(&youtube.privacy_status.as_str()) {
            return Err(AppError::config(format!(
                "YOUTUBE_PRIVACY_STATUS must be 'public', 'private' or 'unlisted', got '{}'",
                youtube.privacy_status
            )));
        }

        Ok(Self {
            database_url: get("DATABASE_URL").unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string()),
            download,
            watermark,
            tiktok,
            youtube,
        })
    }

    /// One-line summary of which destinations have credentials, for startup logs.
    pub fn describe_credentials(&self) -> String {
        let yt = self.youtube.client_id.is_some()
            && self.youtube.client_secret.is_some()
            && self.youtube.refresh_token.is_some();
        format!(
            "TikTok: {}, YouTube: {}",
            if self.tiktok.access_token.is_some() { "✅" } else { "❌" },
            if yt { "✅" } else { "❌" }
        )
    }
}

fn parse_or<T, G>(get: &G, key: &str, default: T) -> Result<T, AppError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => raw
            .parse::<T>()
            .map_err(|e| AppError::config(format!("{} has invalid value '{}': {}", key, raw, e))),
        None => Ok(default),
    }
}

fn parse_bool_or<G>(get: &G, key: &str, default: bool) -> Result<bool, AppError>
where
    G: Fn(&str) -> Option<String>,
{
    match get(key).map(|v| v.to_lowercase()) {
        None => Ok(default),
        Some(v) if ["1", "true", "yes", "on"].contains(&v.as_str()) => Ok(true),
        Some(v) if ["0", "false", "no", "off"].contains(&v.as_str()) => Ok(false),
        Some(v) => Err(AppError::config(format!("{} must be a boolean, got '{}'", key, v))),
    }
}
