// src/stages/downloader.rs
// Acquire stage: run the download command, then watch the download directory
// until a new .mp4 shows up or the wait window closes.

use super::Acquire;
use crate::config::DownloadConfig;
use crate::error::{StageError, StageResult};
use crate::utils::get_file_extension;
use crate::validation::validate_source_url;
use async_trait::async_trait;
use std::collections::HashSet;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::Instant;

pub struct DirectoryDownloader {
    config: DownloadConfig,
}

impl DirectoryDownloader {
    pub fn new(config: DownloadConfig) -> Self {
        Self { config }
    }

    /// Arguments for a yt-dlp compatible downloader writing into `download_dir`.
    /// `attempt` makes the file name unique, so a URL that was already
    /// downloaded is fetched again instead of being skipped.
    pub fn download_args(video_url: &str, download_dir: &Path, attempt: &str) -> Vec<OsString> {
        let template = download_dir.join(format!("%(uploader)s_%(id)s_{}.%(ext)s", attempt));
        vec![
            "--no-playlist".into(),
            "--format".into(),
            "bestvideo[ext=mp4]+bestaudio[ext=m4a]/best[ext=mp4]/best".into(),
            "--merge-output-format".into(),
            "mp4".into(),
            "--output".into(),
            template.into_os_string(),
            video_url.into(),
        ]
    }

    async fn download(&self, video_url: &str) -> Result<PathBuf, String> {
        if !validate_source_url(video_url) {
            return Err(format!("Invalid source video URL: {}", video_url));
        }

        let dir = &self.config.download_dir;
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|e| format!("Failed to create download directory {}: {}", dir.display(), e))?;

        let deadline = Instant::now() + self.config.timeout;
        let before = snapshot(dir).await?;
        let attempt = attempt_tag();

        tracing::info!("📥 Downloading video: {} (attempt {})", video_url, attempt);

        let child = Command::new(&self.config.command)
            .args(Self::download_args(video_url, dir, &attempt))
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                format!(
                    "Failed to execute {}: {}. Make sure it is installed.",
                    self.config.command, e
                )
            })?;

        let output = tokio::time::timeout_at(deadline, child.wait_with_output())
            .await
            .map_err(|_| format!("Download did not finish within {:?}", self.config.timeout))?
            .map_err(|e| format!("Download command failed: {}", e))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            tracing::error!("{} error: {}", self.config.command, stderr);
            return Err(format!("Download command exited with {}", output.status));
        }

        tracing::debug!("{} output: {}", self.config.command, String::from_utf8_lossy(&output.stdout));

        let remaining = deadline.saturating_duration_since(Instant::now());
        match wait_for_new_file(dir, &before, remaining, self.config.poll_interval).await? {
            Some(path) => {
                tracing::info!("✅ Download completed: {}", path.display());
                Ok(path)
            }
            None => Err("Download did not complete within the specified timeout period".to_string()),
        }
    }
}

#[async_trait]
impl Acquire for DirectoryDownloader {
    async fn acquire(&self, source_url: &str) -> StageResult<PathBuf> {
        self.download(source_url).await.map_err(|e| {
            tracing::error!("Download failed for {}: {}", source_url, e);
            StageError::acquire(e)
        })
    }
}

fn attempt_tag() -> String {
    let id = uuid::Uuid::new_v4().simple().to_string();
    id[..12].to_string()
}

/// File names currently in `dir`.
pub async fn snapshot(dir: &Path) -> Result<HashSet<OsString>, String> {
    let mut names = HashSet::new();
    let mut entries = tokio::fs::read_dir(dir)
        .await
        .map_err(|e| format!("Failed to read {}: {}", dir.display(), e))?;

    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| format!("Failed to read {}: {}", dir.display(), e))?
    {
        names.insert(entry.file_name());
    }
    Ok(names)
}

/// `.mp4` files in `current` that were not in `before`, sorted by name.
pub fn new_mp4_files(before: &HashSet<OsString>, current: &HashSet<OsString>) -> Vec<OsString> {
    let mut found: Vec<OsString> = current
        .iter()
        .filter(|name| !before.contains(*name))
        .filter(|name| get_file_extension(Path::new(name)).as_deref() == Some("mp4"))
        .cloned()
        .collect();
    found.sort();
    found
}

/// Poll `dir` every `interval` until a new `.mp4` appears or `timeout` passes.
/// The directory is always checked at least once.
pub async fn wait_for_new_file(
    dir: &Path,
    before: &HashSet<OsString>,
    timeout: Duration,
    interval: Duration,
) -> Result<Option<PathBuf>, String> {
    let deadline = Instant::now() + timeout;

    loop {
        let current = snapshot(dir).await?;
        if let Some(name) = new_mp4_files(before, &current).into_iter().next() {
            return Ok(Some(dir.join(name)));
        }

        let now = Instant::now();
        if now >= deadline {
            return Ok(None);
        }
        tokio::time::sleep(interval.min(deadline - now)).await;
    }
}
