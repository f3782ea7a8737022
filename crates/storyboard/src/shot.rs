use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use uuid::Uuid;

use crate::{Locale, StoryboardError};

pub const DEFAULT_DURATION_SECS: u32 = 5;
pub const DEFAULT_SHOT_TYPE: &str = "Medium Shot";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct ShotId(pub Uuid);

impl ShotId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ShotId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ShotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Rendering style requested from the image generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum StyleTag {
    #[default]
    #[serde(rename = "sketch")]
    Sketch,
    #[serde(rename = "colored-pencil")]
    ColoredPencil,
    #[serde(rename = "2d-animation")]
    Animation2d,
    #[serde(rename = "3d-render")]
    Render3d,
    #[serde(rename = "realistic")]
    Realistic,
    #[serde(rename = "noir")]
    Noir,
}

impl StyleTag {
    pub const ALL: [StyleTag; 6] = [
        StyleTag::Sketch,
        StyleTag::ColoredPencil,
        StyleTag::Animation2d,
        StyleTag::Render3d,
        StyleTag::Realistic,
        StyleTag::Noir,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StyleTag::Sketch => "sketch",
            StyleTag::ColoredPencil => "colored-pencil",
            StyleTag::Animation2d => "2d-animation",
            StyleTag::Render3d => "3d-render",
            StyleTag::Realistic => "realistic",
            StyleTag::Noir => "noir",
        }
    }
}

impl fmt::Display for StyleTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StyleTag {
    type Err = StoryboardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_ascii_lowercase();
        StyleTag::ALL
            .into_iter()
            .find(|style| style.as_str() == needle)
            .ok_or_else(|| StoryboardError::UnknownStyle(s.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum AspectRatio {
    #[default]
    #[serde(rename = "16:9")]
    Widescreen,
    #[serde(rename = "1:1")]
    Square,
    #[serde(rename = "9:16")]
    Portrait,
    #[serde(rename = "4:3")]
    Standard,
}

impl AspectRatio {
    /// Width over height.
    pub fn ratio(&self) -> f64 {
        match self {
            AspectRatio::Widescreen => 16.0 / 9.0,
            AspectRatio::Square => 1.0,
            AspectRatio::Portrait => 9.0 / 16.0,
            AspectRatio::Standard => 4.0 / 3.0,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AspectRatio::Widescreen => "16:9",
            AspectRatio::Square => "1:1",
            AspectRatio::Portrait => "9:16",
            AspectRatio::Standard => "4:3",
        }
    }
}

impl fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AspectRatio {
    type Err = StoryboardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "16:9" => Ok(AspectRatio::Widescreen),
            "1:1" => Ok(AspectRatio::Square),
            "9:16" => Ok(AspectRatio::Portrait),
            "4:3" => Ok(AspectRatio::Standard),
            other => Err(StoryboardError::UnknownAspectRatio(other.to_string())),
        }
    }
}

/// Image bytes returned by a successful generation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedImage {
    pub mime_type: String,
    #[serde(with = "base64_bytes")]
    pub data: Vec<u8>,
}

impl GeneratedImage {
    pub fn new(mime_type: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            mime_type: mime_type.into(),
            data,
        }
    }

    pub fn png(data: Vec<u8>) -> Self {
        Self::new("image/png", data)
    }

    pub fn to_data_uri(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, STANDARD.encode(&self.data))
    }

    pub fn from_data_uri(uri: &str) -> Option<Self> {
        let rest = uri.strip_prefix("data:")?;
        let (mime_type, payload) = rest.split_once(";base64,")?;
        let data = STANDARD.decode(payload.trim()).ok()?;
        Some(Self::new(mime_type, data))
    }

    /// File extension matching the mime type.
    pub fn extension(&self) -> &'static str {
        match self.mime_type.as_str() {
            "image/jpeg" | "image/jpg" => "jpg",
            "image/webp" => "webp",
            _ => "png",
        }
    }
}

mod base64_bytes {
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(data: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(data))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shot {
    pub id: ShotId,
    /// 1-based position in the storyboard; rewritten on every reorder.
    pub sequence_number: u32,
    pub summary: String,
    pub visual_prompt: String,
    #[serde(default)]
    pub style: StyleTag,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generated_image: Option<GeneratedImage>,
    #[serde(default)]
    pub generation_in_flight: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    #[serde(default = "default_duration")]
    pub duration_secs: u32,
    #[serde(default = "default_shot_type")]
    pub shot_type: String,
    #[serde(default)]
    pub aspect_ratio: AspectRatio,
}

fn default_duration() -> u32 {
    DEFAULT_DURATION_SECS
}

fn default_shot_type() -> String {
    DEFAULT_SHOT_TYPE.to_string()
}

impl Shot {
    pub fn new(
        sequence_number: u32,
        summary: impl Into<String>,
        visual_prompt: impl Into<String>,
        style: StyleTag,
    ) -> Self {
        Self {
            id: ShotId::new(),
            sequence_number,
            summary: summary.into(),
            visual_prompt: visual_prompt.into(),
            style,
            generated_image: None,
            generation_in_flight: false,
            last_error: None,
            duration_secs: DEFAULT_DURATION_SECS,
            shot_type: DEFAULT_SHOT_TYPE.to_string(),
            aspect_ratio: AspectRatio::default(),
        }
    }

    /// A blank shot created by an explicit "add" action. Numbered by the
    /// storyboard on insertion.
    pub fn placeholder(locale: Locale, style: StyleTag) -> Self {
        Self::new(
            0,
            locale.new_shot_summary(),
            locale.new_shot_prompt(),
            style,
        )
    }

    pub fn has_image(&self) -> bool {
        self.generated_image.is_some()
    }

    /// Text sent to the generator: the visual prompt, or the summary when the
    /// prompt was cleared.
    pub fn effective_prompt(&self) -> &str {
        let prompt = self.visual_prompt.trim();
        if prompt.is_empty() {
            self.summary.trim()
        } else {
            prompt
        }
    }
}

/// Field edits applied to an existing shot. `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ShotUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visual_prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<StyleTag>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_secs: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shot_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aspect_ratio: Option<AspectRatio>,
}

impl ShotUpdate {
    pub fn summary(text: impl Into<String>) -> Self {
        Self {
            summary: Some(text.into()),
            ..Self::default()
        }
    }

    pub fn visual_prompt(text: impl Into<String>) -> Self {
        Self {
            visual_prompt: Some(text.into()),
            ..Self::default()
        }
    }

    pub fn style(style: StyleTag) -> Self {
        Self {
            style: Some(style),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Applies the edits and returns an update that restores the previous
    /// values.
    pub fn apply(self, shot: &mut Shot) -> ShotUpdate {
        let mut previous = ShotUpdate::default();
        if let Some(summary) = self.summary {
            previous.summary = Some(std::mem::replace(&mut shot.summary, summary));
        }
        if let Some(prompt) = self.visual_prompt {
            previous.visual_prompt = Some(std::mem::replace(&mut shot.visual_prompt, prompt));
        }
        if let Some(style) = self.style {
            previous.style = Some(std::mem::replace(&mut shot.style, style));
        }
        if let Some(duration) = self.duration_secs {
            previous.duration_secs = Some(std::mem::replace(&mut shot.duration_secs, duration));
        }
        if let Some(shot_type) = self.shot_type {
            previous.shot_type = Some(std::mem::replace(&mut shot.shot_type, shot_type));
        }
        if let Some(aspect) = self.aspect_ratio {
            previous.aspect_ratio = Some(std::mem::replace(&mut shot.aspect_ratio, aspect));
        }
        previous
    }
}
