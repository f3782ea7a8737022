/// Gemini image generation backend
///
/// Calls `models/{model}:generateContent` and returns the first inline image
/// of the first candidate.
use super::{BackendConfig, BackendType, ImageBackend};
use crate::style::compose_prompt;
use crate::{Credential, GenerationError};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::json;
use std::time::{Duration, Instant};
use storyboard::{AspectRatio, GeneratedImage, StyleTag};
use tracing::{debug, warn};

pub const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com";

/// Message the service returns when a selected key no longer exists.
const ENTITY_NOT_FOUND: &str = "Requested entity was not found";

pub struct GeminiBackend {
    config: BackendConfig,
    client: reqwest::Client,
}

impl GeminiBackend {
    pub fn new(config: BackendConfig) -> Result<Self, GenerationError> {
        if config.model.trim().is_empty() {
            return Err(GenerationError::Configuration(
                "Gemini model name is required.".to_string(),
            ));
        }
        let mut builder = reqwest::Client::builder().connect_timeout(Duration::from_secs(20));
        if let Some(secs) = config.timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let client = builder
            .build()
            .map_err(|err| GenerationError::Configuration(err.to_string()))?;
        Ok(Self { config, client })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.config
                .api_url
                .as_deref()
                .unwrap_or(GEMINI_API_BASE)
                .trim_end_matches('/'),
            self.config.model.trim()
        )
    }

    fn payload(
        &self,
        prompt: &str,
        style: StyleTag,
        aspect_ratio: AspectRatio,
    ) -> serde_json::Value {
        json!({
            "contents": [{
                "parts": [{ "text": compose_prompt(prompt, style) }]
            }],
            "generationConfig": {
                "responseModalities": ["IMAGE"],
                "imageConfig": {
                    "aspectRatio": aspect_ratio.as_str(),
                    "imageSize": self.config.image_size,
                }
            }
        })
    }
}

/// Maps an error response onto the generation error taxonomy.
pub(crate) fn classify_failure(status: StatusCode, body: &str) -> GenerationError {
    let message = serde_json::from_str::<GeminiErrorEnvelope>(body)
        .map(|e| e.error.message)
        .unwrap_or_else(|_| body.to_string());

    if status == StatusCode::UNAUTHORIZED
        || status == StatusCode::FORBIDDEN
        || message.contains(ENTITY_NOT_FOUND)
    {
        GenerationError::CredentialInvalid(message)
    } else {
        GenerationError::Failed(format!("Gemini API error: {status} - {message}"))
    }
}

/// Pulls the first inline image out of a successful response body.
pub(crate) fn extract_image(body: &str) -> Result<GeneratedImage, GenerationError> {
    let parsed: GeminiResponse = serde_json::from_str(body)
        .map_err(|err| GenerationError::failed(format!("Invalid Gemini response JSON: {err}")))?;

    let inline = parsed
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .into_iter()
        .flat_map(|content| content.parts)
        .find_map(|part| part.inline_data)
        .ok_or(GenerationError::NoImage)?;

    let data = STANDARD
        .decode(inline.data.as_bytes())
        .map_err(|err| GenerationError::failed(format!("Invalid image payload: {err}")))?;
    let mime_type = inline.mime_type.unwrap_or_else(|| "image/png".to_string());
    Ok(GeneratedImage::new(mime_type, data))
}

#[async_trait::async_trait]
impl ImageBackend for GeminiBackend {
    fn name(&self) -> &str {
        "Gemini"
    }

    fn backend_type(&self) -> BackendType {
        BackendType::Gemini
    }

    async fn generate(
        &self,
        prompt: &str,
        style: StyleTag,
        aspect_ratio: AspectRatio,
        credential: &Credential,
    ) -> Result<GeneratedImage, GenerationError> {
        let start = Instant::now();
        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", credential.expose())
            .json(&self.payload(prompt, style, aspect_ratio))
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        debug!(%status, elapsed_ms = start.elapsed().as_millis() as u64, "Gemini responded");

        if !status.is_success() {
            let err = classify_failure(status, &body);
            warn!(%status, error = %err, "Gemini request failed");
            return Err(err);
        }

        extract_image(&body)
    }
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiContent>,
}

#[derive(Debug, Deserialize)]
struct GeminiContent {
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiPart {
    inline_data: Option<GeminiInlineData>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiInlineData {
    mime_type: Option<String>,
    data: String,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorEnvelope {
    error: GeminiErrorBody,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorBody {
    message: String,
}
