// YouTube Data API v3 client for video uploads
// Docs: https://developers.google.com/youtube/v3

use super::PublishSecondary;
use crate::config::YouTubeConfig;
use crate::error::{StageError, StageResult};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::path::Path;
use tokio::sync::Mutex;

const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const UPLOAD_URL: &str = "https://www.googleapis.com/upload/youtube/v3/videos";
const RATE_URL: &str = "https://www.googleapis.com/youtube/v3/videos/rate";

// ============================================================================
// Video Upload Structures
// ============================================================================

#[derive(Debug, Serialize)]
pub struct VideoSnippet {
    pub title: String,
    pub description: String,
    #[serde(rename = "categoryId")]
    pub category_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
}

#[derive(Debug, Serialize)]
pub struct VideoStatus {
    #[serde(rename = "privacyStatus")]
    pub privacy_status: String, // "public", "private", "unlisted"
}

#[derive(Debug, Serialize)]
pub struct VideoResource {
    pub snippet: VideoSnippet,
    pub status: VideoStatus,
}

#[derive(Debug, Deserialize)]
pub struct VideoUploadResponse {
    pub id: String,
    pub snippet: Option<VideoResponseSnippet>,
}

#[derive(Debug, Deserialize)]
pub struct VideoResponseSnippet {
    pub title: String,
    #[serde(rename = "publishedAt")]
    pub published_at: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TokenRefreshResponse {
    pub access_token: String,
    pub expires_in: i64,
    pub token_type: String,
}

#[derive(Debug, Clone)]
struct CachedToken {
    access_token: String,
    expires_at: DateTime<Utc>,
}

impl CachedToken {
    /// Treat tokens expiring within 5 minutes as already expired.
    fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now + Duration::minutes(5)
    }
}

// ============================================================================
// YouTube Publisher Implementation
// ============================================================================

pub struct YouTubePublisher {
    client: Client,
    config: YouTubeConfig,
    token: Mutex<Option<CachedToken>>,
}

impl YouTubePublisher {
    pub fn new(config: YouTubeConfig) -> Self {
        Self {
            client: Client::new(),
            config,
            token: Mutex::new(None),
        }
    }

    pub fn video_resource(&self, title: &str, description: &str) -> VideoResource {
        VideoResource {
            snippet: VideoSnippet {
                title: title.to_string(),
                description: description.to_string(),
                category_id: self.config.category_id.clone(),
                tags: None,
            },
            status: VideoStatus {
                privacy_status: self.config.privacy_status.clone(),
            },
        }
    }

    /// Access token from cache, refreshed from the stored refresh token when stale.
    async fn access_token(&self) -> Result<String, Box<dyn std::error::Error + Send + Sync>> {
        let mut cached = self.token.lock().await;
        let now = Utc::now();

        if let Some(token) = cached.as_ref().filter(|t| t.is_fresh(now)) {
            return Ok(token.access_token.clone());
        }

        let (client_id, client_secret, refresh_token) = match (
            self.config.client_id.as_deref(),
            self.config.client_secret.as_deref(),
            self.config.refresh_token.as_deref(),
        ) {
            (Some(id), Some(secret), Some(refresh)) => (id, secret, refresh),
            _ => {
                return Err(
                    "YouTube credentials missing: set YOUTUBE_CLIENT_ID, YOUTUBE_CLIENT_SECRET and YOUTUBE_REFRESH_TOKEN"
                        .into(),
                )
            }
        };

        tracing::debug!("Refreshing YouTube access token");
        let refreshed = self
            .refresh_access_token(refresh_token, client_id, client_secret)
            .await?;

        let token = CachedToken {
            access_token: refreshed.access_token,
            expires_at: now + Duration::seconds(refreshed.expires_in),
        };
        let access_token = token.access_token.clone();
        *cached = Some(token);
        Ok(access_token)
    }

    /// Refresh an expired access token using refresh token
    pub async fn refresh_access_token(
        &self,
        refresh_token: &str,
        client_id: &str,
        client_secret: &str,
    ) -> Result<TokenRefreshResponse, Box<dyn std::error::Error + Send + Sync>> {
        let params = json!({
            "client_id": client_id,
            "client_secret": client_secret,
            "refresh_token": refresh_token,
            "grant_type": "refresh_token"
        });

        let response = self.client.post(TOKEN_URL).json(&params).send().await?;

        if !response.status().is_success() {
            let error_text = response.text().await?;
            return Err(format!("Failed to refresh token: {}", error_text).into());
        }

        let token_response: TokenRefreshResponse = response.json().await?;
        Ok(token_response)
    }

    /// Upload a video and return its YouTube id
    pub async fn upload_video(
        &self,
        video_path: &Path,
        title: &str,
        description: &str,
    ) -> Result<String, Box<dyn std::error::Error + Send + Sync>> {
        let access_token = self.access_token().await?;

        let video_data = tokio::fs::read(video_path).await?;
        let file_name = video_path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("video.mp4")
            .to_string();

        let metadata_json = serde_json::to_string(&self.video_resource(title, description))?;

        let form = reqwest::multipart::Form::new()
            .part(
                "snippet",
                reqwest::multipart::Part::text(metadata_json).mime_str("application/json")?,
            )
            .part(
                "media",
                reqwest::multipart::Part::bytes(video_data)
                    .file_name(file_name)
                    .mime_str("video/*")?,
            );

        let response = self
            .client
            .post(UPLOAD_URL)
            .query(&[("part", "snippet,status"), ("uploadType", "multipart")])
            .header("Authorization", format!("Bearer {}", access_token))
            .multipart(form)
            .send()
            .await?;

        if !response.status().is_success() {
            let error_text = response.text().await?;
            return Err(format!("Failed to upload video: {}", error_text).into());
        }

        let upload_response: VideoUploadResponse = response.json().await?;
        tracing::info!("✅ Video uploaded to YouTube (ID: {})", upload_response.id);

        if self.config.like_after_upload {
            if let Err(e) = self.like_video(&access_token, &upload_response.id).await {
                tracing::warn!("Could not like video {}: {}", upload_response.id, e);
            }
        }

        Ok(upload_response.id)
    }

    /// Rate a video "like" on behalf of the uploading account
    pub async fn like_video(
        &self,
        access_token: &str,
        video_id: &str,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let response = self
            .client
            .post(RATE_URL)
            .query(&[("id", video_id), ("rating", "like")])
            .header("Authorization", format!("Bearer {}", access_token))
            .header("Content-Length", "0")
            .send()
            .await?;

        if !response.status().is_success() {
            let error_text = response.text().await?;
            return Err(format!("Failed to like video: {}", error_text).into());
        }

        tracing::info!("👍 Liked YouTube video {}", video_id);
        Ok(())
    }
}

#[async_trait]
impl PublishSecondary for YouTubePublisher {
    async fn publish_secondary(&self, video: &Path, title: &str, description: &str) -> StageResult<String> {
        self.upload_video(video, title, description).await.map_err(|e| {
            tracing::error!("YouTube upload failed for {}: {}", video.display(), e);
            StageError::publish_secondary(e.to_string())
        })
    }
}
