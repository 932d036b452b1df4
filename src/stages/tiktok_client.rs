// TikTok Content Posting API client (direct post, FILE_UPLOAD source)
// Docs: https://developers.tiktok.com/doc/content-posting-api-reference-direct-post

use super::PublishPrimary;
use crate::config::TikTokConfig;
use crate::error::{StageError, StageResult};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

const API_BASE: &str = "https://open.tiktokapis.com";

/// Files up to this size go up as a single chunk.
const SINGLE_CHUNK_LIMIT: u64 = 64 * 1024 * 1024;
const CHUNK_SIZE: u64 = 10 * 1024 * 1024;

// ============================================================================
// Request / Response Structures
// ============================================================================

#[derive(Debug, Serialize)]
pub struct PostInfo {
    pub title: String,
    pub privacy_level: String,
    pub disable_duet: bool,
    pub disable_comment: bool,
    pub disable_stitch: bool,
}

#[derive(Debug, Serialize)]
pub struct SourceInfo {
    pub source: String,
    pub video_size: u64,
    pub chunk_size: u64,
    pub total_chunk_count: u64,
}

#[derive(Debug, Serialize)]
pub struct InitRequest {
    pub post_info: PostInfo,
    pub source_info: SourceInfo,
}

#[derive(Debug, Deserialize)]
pub struct InitResponse {
    pub data: Option<InitData>,
    pub error: ApiError,
}

#[derive(Debug, Deserialize)]
pub struct InitData {
    pub publish_id: String,
    pub upload_url: String,
}

#[derive(Debug, Deserialize)]
pub struct ApiError {
    pub code: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub log_id: String,
}

/// How a file of `video_size` bytes is split for upload: (chunk size, chunk count).
/// The last chunk carries the remainder.
pub fn chunk_plan(video_size: u64) -> (u64, u64) {
    if video_size <= SINGLE_CHUNK_LIMIT {
        (video_size, 1)
    } else {
        (CHUNK_SIZE, video_size / CHUNK_SIZE)
    }
}

/// Inclusive byte range of chunk `index`.
pub fn chunk_range(index: u64, chunk_size: u64, chunk_count: u64, video_size: u64) -> (u64, u64) {
    let start = index * chunk_size;
    let end = if index + 1 == chunk_count {
        video_size - 1
    } else {
        start + chunk_size - 1
    };
    (start, end)
}

// ============================================================================
// TikTok Publisher Implementation
// ============================================================================

#[derive(Debug, Clone)]
pub struct TikTokPublisher {
    client: Client,
    config: TikTokConfig,
}

impl TikTokPublisher {
    pub fn new(config: TikTokConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(600))
            .build()
            .unwrap_or_else(|_| Client::new());
        Self { client, config }
    }

    pub fn init_request(&self, description: &str, video_size: u64) -> InitRequest {
        let (chunk_size, total_chunk_count) = chunk_plan(video_size);
        InitRequest {
            post_info: PostInfo {
                title: description.to_string(),
                privacy_level: self.config.privacy_level.clone(),
                disable_duet: false,
                disable_comment: false,
                disable_stitch: false,
            },
            source_info: SourceInfo {
                source: "FILE_UPLOAD".to_string(),
                video_size,
                chunk_size,
                total_chunk_count,
            },
        }
    }

    /// Upload a video and return its publish id.
    pub async fn upload_video(
        &self,
        video_path: &Path,
        description: &str,
    ) -> Result<String, Box<dyn std::error::Error + Send + Sync>> {
        let access_token = self
            .config
            .access_token
            .as_deref()
            .ok_or("TIKTOK_ACCESS_TOKEN is not set")?;

        let video_data = tokio::fs::read(video_path).await?;
        let video_size = video_data.len() as u64;
        if video_size == 0 {
            return Err(format!("Video file is empty: {}", video_path.display()).into());
        }

        let request = self.init_request(description, video_size);
        let (chunk_size, chunk_count) = (request.source_info.chunk_size, request.source_info.total_chunk_count);

        tracing::info!("📤 Uploading {} to TikTok ({} bytes, {} chunk(s))", video_path.display(), video_size, chunk_count);

        let response = self
            .client
            .post(format!("{}/v2/post/publish/video/init/", API_BASE))
            .header("Authorization", format!("Bearer {}", access_token))
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        let init: InitResponse = response.json().await?;
        if !status.is_success() || init.error.code != "ok" {
            return Err(format!(
                "TikTok init failed ({}): {} {} [log_id {}]",
                status, init.error.code, init.error.message, init.error.log_id
            )
            .into());
        }
        let data = init.data.ok_or("TikTok init response carried no data")?;

        for index in 0..chunk_count {
            let (start, end) = chunk_range(index, chunk_size, chunk_count, video_size);
            let chunk = video_data[start as usize..=end as usize].to_vec();

            let response = self
                .client
                .put(&data.upload_url)
                .header("Content-Type", "video/mp4")
                .header("Content-Range", format!("bytes {}-{}/{}", start, end, video_size))
                .body(chunk)
                .send()
                .await?;

            if !response.status().is_success() {
                let error_text = response.text().await?;
                return Err(format!("TikTok chunk {} upload failed: {}", index, error_text).into());
            }
        }

        tracing::info!("✅ Video uploaded to TikTok (publish id: {})", data.publish_id);
        Ok(data.publish_id)
    }
}

#[async_trait]
impl PublishPrimary for TikTokPublisher {
    async fn publish_primary(&self, video: &Path, description: &str) -> StageResult<String> {
        self.upload_video(video, description).await.map_err(|e| {
            tracing::error!("TikTok upload failed for {}: {}", video.display(), e);
            StageError::publish_primary(e.to_string())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn publisher(token: Option<&str>) -> TikTokPublisher {
        TikTokPublisher::new(TikTokConfig {
            access_token: token.map(String::from),
            privacy_level: "SELF_ONLY".to_string(),
        })
    }

    #[test]
    fn test_chunk_plan() {
        assert_eq!(chunk_plan(1_000), (1_000, 1));
        assert_eq!(chunk_plan(SINGLE_CHUNK_LIMIT), (SINGLE_CHUNK_LIMIT, 1));
        assert_eq!(chunk_plan(SINGLE_CHUNK_LIMIT + 1), (CHUNK_SIZE, 6));
    }

    #[test]
    fn test_last_chunk_takes_remainder() {
        let size = 25 * 1024 * 1024 + 7;
        assert_eq!(chunk_range(0, CHUNK_SIZE, 2, size), (0, CHUNK_SIZE - 1));
        assert_eq!(chunk_range(1, CHUNK_SIZE, 2, size), (CHUNK_SIZE, size - 1));
        assert_eq!(chunk_range(0, 500, 1, 500), (0, 499));
    }

    #[test]
    fn test_init_request_body() {
        let body = serde_json::to_value(publisher(Some("t")).init_request("Top bins", 2048)).unwrap();
        assert_eq!(body["post_info"]["title"], "Top bins");
        assert_eq!(body["post_info"]["privacy_level"], "SELF_ONLY");
        assert_eq!(body["source_info"]["source"], "FILE_UPLOAD");
        assert_eq!(body["source_info"]["video_size"], 2048);
        assert_eq!(body["source_info"]["total_chunk_count"], 1);
    }

    #[test]
    fn test_init_response_parsing() {
        let ok: InitResponse = serde_json::from_str(
            r#"{"data":{"publish_id":"v_pub_1","upload_url":"https://upload.example/1"},
                "error":{"code":"ok","message":"","log_id":"abc"}}"#,
        )
        .unwrap();
        assert_eq!(ok.data.unwrap().publish_id, "v_pub_1");

        let failed: InitResponse = serde_json::from_str(
            r#"{"error":{"code":"access_token_invalid","message":"expired"}}"#,
        )
        .unwrap();
        assert!(failed.data.is_none());
        assert_eq!(failed.error.code, "access_token_invalid");
    }

    #[tokio::test]
    async fn test_missing_token_is_a_publish_failure() {
        let err = publisher(None)
            .publish_primary(Path::new("edited/clip.mp4"), "desc")
            .await
            .unwrap_err();
        assert_eq!(err.stage, crate::pipeline::Stage::PublishPrimary);
        assert!(err.reason.contains("TIKTOK_ACCESS_TOKEN"));
    }
}
