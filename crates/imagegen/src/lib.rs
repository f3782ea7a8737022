/// Storyboard image generation
///
/// Sends each shot's visual prompt and style to an image model and writes
/// the result back onto the storyboard.
use std::fmt;

pub mod backends;
mod error;
pub mod runner;
pub mod style;

pub use backends::{
    BackendConfig, BackendFactory, BackendType, GeminiBackend, ImageBackend, MockBackend,
    MockResponse,
};
pub use error::GenerationError;
pub use runner::{BulkReport, CancelToken, Generator};

/// API key passed explicitly into every generation call. Never printed.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    /// `None` for a blank key.
    pub fn new(key: impl Into<String>) -> Option<Self> {
        let key = key.into().trim().to_string();
        if key.is_empty() {
            None
        } else {
            Some(Self(key))
        }
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(****)")
    }
}
