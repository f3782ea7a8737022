use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

use crate::StoryboardError;

/// Language used for placeholder text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Locale {
    #[default]
    English,
    Vietnamese,
}

impl Locale {
    /// Summary used when a segment carries no narrative text.
    pub fn missing_summary(&self) -> &'static str {
        match self {
            Locale::English => "No description",
            Locale::Vietnamese => "Không có mô tả",
        }
    }

    /// Visual prompt used when a segment carries no text at all.
    pub fn missing_prompt(&self) -> &'static str {
        match self {
            Locale::English => "Describe the image...",
            Locale::Vietnamese => "Mô tả hình ảnh...",
        }
    }

    pub fn new_shot_summary(&self) -> &'static str {
        match self {
            Locale::English => "New shot description...",
            Locale::Vietnamese => "Mô tả kịch bản mới...",
        }
    }

    pub fn new_shot_prompt(&self) -> &'static str {
        match self {
            Locale::English => "Describe the sketch...",
            Locale::Vietnamese => "Mô tả hình ảnh phác thảo...",
        }
    }

    /// Message stored on a shot when the credential was rejected.
    pub fn credential_reset_message(&self) -> &'static str {
        match self {
            Locale::English => "API key needs to be reset",
            Locale::Vietnamese => "Cần reset API Key",
        }
    }

    /// Message stored on a shot for any other generation failure.
    pub fn generation_failed_message(&self) -> &'static str {
        match self {
            Locale::English => "Image generation failed",
            Locale::Vietnamese => "Lỗi tạo ảnh",
        }
    }
}

impl fmt::Display for Locale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Locale::English => f.write_str("en"),
            Locale::Vietnamese => f.write_str("vi"),
        }
    }
}

impl FromStr for Locale {
    type Err = StoryboardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "en" | "english" => Ok(Locale::English),
            "vi" | "vietnamese" => Ok(Locale::Vietnamese),
            other => Err(StoryboardError::UnknownLocale(other.to_string())),
        }
    }
}
