/// Image generation backends
///
/// Every backend takes a visual prompt, a style tag, the frame's aspect ratio
/// and the caller's credential and returns image bytes:
/// - Gemini image models over HTTP
/// - A scripted mock for tests and offline runs
pub mod gemini;
pub mod mock;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use storyboard::{AspectRatio, GeneratedImage, StyleTag};

pub use gemini::GeminiBackend;
pub use mock::{MockBackend, MockResponse};

use crate::{Credential, GenerationError};

/// Backend type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BackendType {
    #[default]
    Gemini,
    Mock,
}

impl std::fmt::Display for BackendType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Gemini => write!(f, "gemini"),
            Self::Mock => write!(f, "mock"),
        }
    }
}

/// Image generation backend trait
#[async_trait::async_trait]
pub trait ImageBackend: Send + Sync {
    /// Backend name
    fn name(&self) -> &str;

    /// Backend type
    fn backend_type(&self) -> BackendType;

    /// Render one storyboard frame
    async fn generate(
        &self,
        prompt: &str,
        style: StyleTag,
        aspect_ratio: AspectRatio,
        credential: &Credential,
    ) -> Result<GeneratedImage, GenerationError>;
}

pub const DEFAULT_GEMINI_MODEL: &str = "gemini-3-pro-image-preview";

/// Backend configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendConfig {
    #[serde(default)]
    pub backend_type: BackendType,

    /// API base URL; the backend default when absent
    #[serde(default)]
    pub api_url: Option<String>,

    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_image_size")]
    pub image_size: String,

    /// Timeout in seconds
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

fn default_model() -> String {
    DEFAULT_GEMINI_MODEL.to_string()
}

fn default_image_size() -> String {
    "1K".to_string()
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self::new(BackendType::Gemini)
    }
}

impl BackendConfig {
    pub fn new(backend_type: BackendType) -> Self {
        Self {
            backend_type,
            api_url: None,
            model: default_model(),
            image_size: default_image_size(),
            timeout_secs: Some(120),
        }
    }

    pub fn with_api_url(mut self, url: String) -> Self {
        self.api_url = Some(url);
        self
    }

    pub fn with_model(mut self, model: String) -> Self {
        self.model = model;
        self
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }

    /// Save configuration to JSON
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Load configuration from JSON
    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        let config = serde_json::from_str(&json)?;
        Ok(config)
    }
}

/// Backend factory for creating backend instances
pub struct BackendFactory;

impl BackendFactory {
    pub fn create(config: BackendConfig) -> Result<Arc<dyn ImageBackend>, GenerationError> {
        match config.backend_type {
            BackendType::Gemini => Ok(Arc::new(GeminiBackend::new(config)?)),
            BackendType::Mock => Ok(Arc::new(MockBackend::new())),
        }
    }
}
