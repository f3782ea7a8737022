use super::{BackendType, ImageBackend};
use crate::{CancelToken, Credential, GenerationError};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use storyboard::{AspectRatio, GeneratedImage, StyleTag};

/// One scripted reply.
#[derive(Debug, Clone)]
pub enum MockResponse {
    Image(GeneratedImage),
    Fail(String),
    RejectCredential,
}

/// A request the mock received.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockCall {
    pub prompt: String,
    pub style: StyleTag,
    pub aspect_ratio: AspectRatio,
}

/// Replays scripted responses in order, then answers with a placeholder PNG.
#[derive(Default)]
pub struct MockBackend {
    responses: Mutex<VecDeque<MockResponse>>,
    calls: Arc<Mutex<Vec<MockCall>>>,
    cancel_after: Option<(usize, CancelToken)>,
}

const PLACEHOLDER_PNG: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_responses(responses: impl IntoIterator<Item = MockResponse>) -> Self {
        Self {
            responses: Mutex::new(responses.into_iter().collect()),
            ..Self::default()
        }
    }

    /// Cancels `token` once `calls` requests have been served, like a user
    /// pressing stop mid-run.
    pub fn cancel_after(mut self, calls: usize, token: CancelToken) -> Self {
        self.cancel_after = Some((calls, token));
        self
    }

    pub fn calls(&self) -> Vec<MockCall> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }
}

#[async_trait::async_trait]
impl ImageBackend for MockBackend {
    fn name(&self) -> &str {
        "storyboard-mock"
    }

    fn backend_type(&self) -> BackendType {
        BackendType::Mock
    }

    async fn generate(
        &self,
        prompt: &str,
        style: StyleTag,
        aspect_ratio: AspectRatio,
        _credential: &Credential,
    ) -> Result<GeneratedImage, GenerationError> {
        let served = {
            let mut calls = self.calls.lock();
            calls.push(MockCall {
                prompt: prompt.to_string(),
                style,
                aspect_ratio,
            });
            calls.len()
        };
        if let Some((limit, token)) = &self.cancel_after {
            if served >= *limit {
                token.cancel();
            }
        }

        let next = self.responses.lock().pop_front();
        match next {
            Some(MockResponse::Image(image)) => Ok(image),
            Some(MockResponse::Fail(msg)) => Err(GenerationError::Failed(msg)),
            Some(MockResponse::RejectCredential) => Err(GenerationError::CredentialInvalid(
                "Requested entity was not found.".to_string(),
            )),
            None => Ok(GeneratedImage::png(PLACEHOLDER_PNG.to_vec())),
        }
    }
}
