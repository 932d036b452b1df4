// utils.rs - FFmpeg / FFprobe process helpers
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;

/// Pixel size of a video stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoDimensions {
    pub width: u32,
    pub height: u32,
}

impl VideoDimensions {
    pub fn is_landscape(&self) -> bool {
        self.width > self.height
    }

    pub fn min_side(&self) -> u32 {
        self.width.min(self.height)
    }
}

/// Execute FFmpeg command with error handling
pub async fn execute_ffmpeg_command(mut command: Command) -> Result<String, String> {
    tracing::debug!("Executing FFmpeg: {:?}", command.as_std());

    let output = command
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await
        .map_err(|e| format!("Failed to execute FFmpeg: {}", e))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(format!("FFmpeg error: {}", last_lines(&stderr, 8)));
    }

    Ok(String::from_utf8_lossy(&output.stdout).to_string())
}

/// Execute FFprobe for media analysis
pub async fn execute_ffprobe_command(args: &[&str]) -> Result<String, String> {
    let output = Command::new("ffprobe")
        .args(args)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await
        .map_err(|e| format!("Failed to execute FFprobe: {}", e))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(format!("FFprobe error: {}", stderr));
    }

    Ok(String::from_utf8_lossy(&output.stdout).to_string())
}

/// Width and height of the first video stream in `file_path`.
pub async fn probe_dimensions(file_path: &Path) -> Result<VideoDimensions, String> {
    let path = file_path.to_string_lossy();
    let args = [
        "-v",
        "quiet",
        "-print_format",
        "json",
        "-show_streams",
        "-select_streams",
        "v:0",
        &*path,
    ];
    let ffprobe_output = execute_ffprobe_command(&args).await?;
    parse_dimensions(&ffprobe_output)
}

pub fn parse_dimensions(ffprobe_json: &str) -> Result<VideoDimensions, String> {
    let json: Value = serde_json::from_str(ffprobe_json)
        .map_err(|e| format!("Failed to parse ffprobe output: {}", e))?;

    let stream = json["streams"]
        .as_array()
        .and_then(|streams| streams.iter().find(|s| s["codec_type"] == "video"))
        .ok_or_else(|| "No video stream found".to_string())?;

    let width = stream["width"].as_u64().unwrap_or(0) as u32;
    let height = stream["height"].as_u64().unwrap_or(0) as u32;
    if width == 0 || height == 0 {
        return Err(format!("Video stream has no usable size ({}x{})", width, height));
    }

    Ok(VideoDimensions { width, height })
}

/// Check if an external tool answers to `-version`
pub async fn check_tool_available(tool: &str) -> Result<(), String> {
    let status = Command::new(tool)
        .arg("-version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await;

    match status {
        Ok(status) if status.success() => Ok(()),
        _ => Err(format!("{} not found. Please install it and make sure it is on PATH.", tool)),
    }
}

/// Create the parent directory of `output_path` if it doesn't exist
pub async fn ensure_output_directory(output_path: &Path) -> Result<(), String> {
    if let Some(parent) = output_path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| format!("Failed to create output directory: {}", e))?;
        }
    }
    Ok(())
}

/// Lowercased file extension
pub fn get_file_extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_lowercase())
}

// ffmpeg stderr is mostly banner; the tail carries the actual error.
fn last_lines(text: &str, n: usize) -> String {
    let lines: Vec<&str> = text.lines().collect();
    lines[lines.len().saturating_sub(n)..].join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_dimensions() {
        let json = r#"{"streams":[
            {"codec_type":"audio","sample_rate":"44100"},
            {"codec_type":"video","width":1920,"height":1080}
        ]}"#;
        let dims = parse_dimensions(json).unwrap();
        assert_eq!(dims, VideoDimensions { width: 1920, height: 1080 });
        assert!(dims.is_landscape());
        assert_eq!(dims.min_side(), 1080);
    }

    #[test]
    fn test_parse_dimensions_errors() {
        assert!(parse_dimensions("not json").is_err());
        assert!(parse_dimensions(r#"{"streams":[{"codec_type":"audio"}]}"#).is_err());
        assert!(parse_dimensions(r#"{"streams":[{"codec_type":"video","width":0,"height":0}]}"#).is_err());
    }

    #[test]
    fn test_file_extension_and_tail() {
        assert_eq!(get_file_extension(Path::new("clip.MP4")).as_deref(), Some("mp4"));
        assert_eq!(get_file_extension(Path::new("clip")), None);
        assert_eq!(last_lines("a\nb\nc", 2), "b\nc");
        assert_eq!(last_lines("a", 5), "a");
    }
}
