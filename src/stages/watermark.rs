// src/stages/watermark.rs
//! Watermark / reformat pass: portrait 9:16 framing, centred text, capped duration.

use super::Transform;
use crate::config::WatermarkConfig;
use crate::error::{StageError, StageResult};
use crate::utils::{ensure_output_directory, execute_ffmpeg_command, probe_dimensions, VideoDimensions};
use crate::validation::WatermarkPosition;
use async_trait::async_trait;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tokio::process::Command;

/// What ffmpeg will be asked to render.
#[derive(Debug, Clone, PartialEq)]
pub struct WatermarkPlan {
    pub output: VideoDimensions,
    pub font_size: u32,
    pub filter: String,
}

/// Landscape input is fitted into a 9:16 canvas whose height is the input's
/// short side, padded with black. Portrait (and square) input keeps its size.
pub fn portrait_canvas(input: VideoDimensions) -> Option<VideoDimensions> {
    if !input.is_landscape() {
        return None;
    }
    let height = input.min_side() & !1;
    let width = (height * 9 / 16) & !1;
    Some(VideoDimensions { width, height })
}

/// Prefix every character matching `special` with a backslash.
fn backslash_escape(text: &str, special: impl Fn(char) -> bool) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        if special(ch) {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

/// Escape an option value for a filter inside a `-vf` graph. ffmpeg unescapes
/// it twice: first the graph parser (`,` `;` `[` `]` end a filter), then the
/// option parser (`:` ends an option). Only backslashes are used, never quotes.
pub fn escape_filter_value(value: &str) -> String {
    let option_level = backslash_escape(value, |ch| matches!(ch, '\\' | '\'' | ':' | '=') || ch.is_whitespace());
    backslash_escape(&option_level, |ch| matches!(ch, '\\' | '\'' | '[' | ']' | ',' | ';'))
}

/// Escape watermark text for drawtext. After filter parsing, drawtext expands
/// `%{...}` and backslash sequences in the text itself.
pub fn escape_drawtext(text: &str) -> String {
    escape_filter_value(&backslash_escape(text, |ch| matches!(ch, '\\' | '%')))
}

pub fn plan_watermark(
    input: VideoDimensions,
    position: WatermarkPosition,
    config: &WatermarkConfig,
) -> WatermarkPlan {
    let mut filters = Vec::new();

    let output = match portrait_canvas(input) {
        Some(canvas) => {
            filters.push(format!(
                "scale={w}:{h}:force_original_aspect_ratio=decrease,pad={w}:{h}:(ow-iw)/2:(oh-ih)/2:black",
                w = canvas.width,
                h = canvas.height
            ));
            canvas
        }
        None => input,
    };

    let font_size = (output.min_side() / 10).max(1);
    let y = match position {
        WatermarkPosition::Top => config.margin.to_string(),
        WatermarkPosition::Bottom => format!("h-{}-{}", config.margin, font_size),
    };

    let mut drawtext = format!(
        "drawtext=text={}:fontsize={}:fontcolor={}:x=(w-text_w)/2:y={}",
        escape_drawtext(&config.text),
        font_size,
        config.font_color,
        y
    );
    if let Some(font_file) = &config.font_file {
        drawtext.push_str(&format!(":fontfile={}", escape_filter_value(font_file)));
    }
    filters.push(drawtext);

    WatermarkPlan {
        output,
        font_size,
        filter: filters.join(","),
    }
}

/// Transform stage backed by ffmpeg.
pub struct FfmpegWatermarker {
    config: WatermarkConfig,
}

impl FfmpegWatermarker {
    pub fn new(config: WatermarkConfig) -> Self {
        Self { config }
    }

    /// Edited videos keep the downloaded file name, in the edited directory.
    pub fn output_path_for(&self, input: &Path) -> Result<PathBuf, String> {
        let file_name = input
            .file_name()
            .ok_or_else(|| format!("Input path has no file name: {}", input.display()))?;
        Ok(self.config.output_dir.join(file_name))
    }

    /// Arguments for the render. The duration cap is passed as configured, unrounded.
    pub fn ffmpeg_args(&self, input: &Path, output: &Path, plan: &WatermarkPlan) -> Vec<OsString> {
        vec![
            "-y".into(),
            "-i".into(),
            input.into(),
            "-vf".into(),
            plan.filter.as_str().into(),
            "-t".into(),
            self.config.max_output_seconds.to_string().into(),
            "-c:v".into(),
            "libx264".into(),
            "-pix_fmt".into(),
            "yuv420p".into(),
            "-c:a".into(),
            "aac".into(),
            output.into(),
        ]
    }

    async fn render(&self, input: &Path, position: WatermarkPosition) -> Result<PathBuf, String> {
        if !tokio::fs::try_exists(input).await.unwrap_or(false) {
            return Err(format!("Input file does not exist: {}", input.display()));
        }

        let output_path = self.output_path_for(input)?;
        if output_path == input {
            return Err("Edited output would overwrite the downloaded file".to_string());
        }
        tracing::info!("🎨 Watermarking {} -> {}", input.display(), output_path.display());

        let dimensions = probe_dimensions(input).await?;
        let plan = plan_watermark(dimensions, position, &self.config);
        tracing::debug!(
            "Input {}x{}, output {}x{}, font size {}",
            dimensions.width,
            dimensions.height,
            plan.output.width,
            plan.output.height,
            plan.font_size
        );

        ensure_output_directory(&output_path).await?;

        let mut command = Command::new("ffmpeg");
        command.args(self.ffmpeg_args(input, &output_path, &plan));

        execute_ffmpeg_command(command).await?;

        if !tokio::fs::try_exists(&output_path).await.unwrap_or(false) {
            return Err(format!("FFmpeg produced no output at {}", output_path.display()));
        }

        Ok(output_path)
    }
}

#[async_trait]
impl Transform for FfmpegWatermarker {
    async fn transform(&self, input: &Path, position: WatermarkPosition) -> StageResult<PathBuf> {
        self.render(input, position).await.map_err(|e| {
            tracing::error!("Watermarking failed for {}: {}", input.display(), e);
            StageError::transform(e)
        })
    }
}
