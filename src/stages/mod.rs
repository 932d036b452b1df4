// src/stages/mod.rs
// Collaborators behind the four pipeline stages: download, watermark, and the two uploads.
// Each returns either its artifact or a StageError describing why there is none.

use crate::error::StageResult;
use crate::validation::WatermarkPosition;
use async_trait::async_trait;
use std::path::{Path, PathBuf};

pub mod downloader;
pub mod tiktok_client;
pub mod watermark;
pub mod youtube_client;

pub use downloader::DirectoryDownloader;
pub use tiktok_client::TikTokPublisher;
pub use watermark::FfmpegWatermarker;
pub use youtube_client::YouTubePublisher;

/// Fetch the source video to a local file.
#[async_trait]
pub trait Acquire: Send + Sync {
    async fn acquire(&self, source_url: &str) -> StageResult<PathBuf>;
}

/// Produce the watermarked, reformatted upload file.
#[async_trait]
pub trait Transform: Send + Sync {
    async fn transform(&self, input: &Path, position: WatermarkPosition) -> StageResult<PathBuf>;
}

/// First destination. Returns a publish token (or "1" when there is only a yes/no answer).
#[async_trait]
pub trait PublishPrimary: Send + Sync {
    async fn publish_primary(&self, video: &Path, description: &str) -> StageResult<String>;
}

/// Second destination. Returns the destination's id for the new video.
#[async_trait]
pub trait PublishSecondary: Send + Sync {
    async fn publish_secondary(
        &self,
        video: &Path,
        title: &str,
        description: &str,
    ) -> StageResult<String>;
}

/// The full set of collaborators the engine drives.
pub struct Collaborators {
    pub acquire: Box<dyn Acquire>,
    pub transform: Box<dyn Transform>,
    pub publish_primary: Box<dyn PublishPrimary>,
    pub publish_secondary: Box<dyn PublishSecondary>,
}

impl Collaborators {
    /// Production collaborators built from configuration.
    pub fn from_config(config: &crate::config::AppConfig) -> Self {
        Self {
            acquire: Box::new(DirectoryDownloader::new(config.download.clone())),
            transform: Box::new(FfmpegWatermarker::new(config.watermark.clone())),
            publish_primary: Box::new(TikTokPublisher::new(config.tiktok.clone())),
            publish_secondary: Box::new(YouTubePublisher::new(config.youtube.clone())),
        }
    }
}
