use thiserror::Error;

#[derive(Debug, Error)]
pub enum GenerationError {
    /// The service rejected the credential; a new key has to be entered.
    #[error("credential rejected: {0}")]
    CredentialInvalid(String),
    #[error("no API key configured")]
    MissingCredential,
    #[error("response contained no image data")]
    NoImage,
    #[error("generation failed: {0}")]
    Failed(String),
    #[error("backend misconfigured: {0}")]
    Configuration(String),
}

impl GenerationError {
    pub fn failed(msg: impl Into<String>) -> Self {
        GenerationError::Failed(msg.into())
    }

    pub fn is_credential_invalid(&self) -> bool {
        matches!(self, GenerationError::CredentialInvalid(_))
    }
}

impl From<reqwest::Error> for GenerationError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            GenerationError::Failed(format!("request timed out: {err}"))
        } else {
            GenerationError::Failed(format!("transport error: {err}"))
        }
    }
}
