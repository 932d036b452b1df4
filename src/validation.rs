// src/validation.rs
//! Input checks applied before a pipeline record is ever created.

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const MAX_DESCRIPTION_CHARS: usize = 100;

lazy_static! {
    static ref SOURCE_URL_PATTERN: Regex =
        Regex::new(r"^https?://(?:www\.)?tiktok\.com/.+").expect("source URL pattern is valid");
}

/// True when `url` points at a video on the source platform.
pub fn validate_source_url(url: &str) -> bool {
    SOURCE_URL_PATTERN.is_match(url)
}

/// Description length is counted in characters, not bytes.
pub fn validate_description(description: &str) -> bool {
    description.chars().count() <= MAX_DESCRIPTION_CHARS
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WatermarkPosition {
    Top,
    Bottom,
}

impl WatermarkPosition {
    pub fn as_str(&self) -> &'static str {
        match self {
            WatermarkPosition::Top => "top",
            WatermarkPosition::Bottom => "bottom",
        }
    }
}

impl fmt::Display for WatermarkPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WatermarkPosition {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "top" => Ok(WatermarkPosition::Top),
            "bottom" => Ok(WatermarkPosition::Bottom),
            other => Err(format!("Invalid watermark position '{}': expected 'top' or 'bottom'", other)),
        }
    }
}
