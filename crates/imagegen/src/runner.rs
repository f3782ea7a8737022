//! Drives generation for one shot or for the whole storyboard.
//!
//! Bulk runs are strictly sequential: a shot's result is written back before
//! the next request goes out. Cancellation is checked between shots and never
//! interrupts the request already in flight.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use storyboard::{Locale, ShotId, Storyboard};
use tracing::{info, warn};

use crate::{Credential, GenerationError, ImageBackend};

/// Shared stop flag for a bulk run.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkReport {
    pub generated: usize,
    pub failed: usize,
    pub skipped: usize,
    /// Stopped by the cancel token before every pending shot was tried.
    pub cancelled: bool,
    /// At least one shot failed because the service rejected the credential.
    pub credential_invalid: bool,
}

pub struct Generator {
    backend: Arc<dyn ImageBackend>,
}

impl Generator {
    pub fn new(backend: Arc<dyn ImageBackend>) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &dyn ImageBackend {
        self.backend.as_ref()
    }

    /// Generates one shot's image and writes the outcome back to the board.
    ///
    /// `Ok(false)` means nothing was sent: the shot is gone or already
    /// generating. On failure the shot keeps any earlier image and gets a
    /// localized `last_error`; the error is also returned.
    pub async fn generate_shot(
        &self,
        board: &mut Storyboard,
        id: ShotId,
        credential: Option<&Credential>,
    ) -> Result<bool, GenerationError> {
        let credential = credential.ok_or(GenerationError::MissingCredential)?;
        let Some(request) = board.begin_generation(id) else {
            return Ok(false);
        };

        let result = self
            .backend
            .generate(
                &request.prompt,
                request.style,
                request.aspect_ratio,
                credential,
            )
            .await;

        match result {
            Ok(image) => {
                info!(shot = %id, bytes = image.data.len(), "shot generated");
                board.complete_generation(id, image);
                Ok(true)
            }
            Err(err) => {
                warn!(shot = %id, error = %err, "shot generation failed");
                let message = failure_message(board.locale(), &err);
                board.fail_generation(id, message);
                Err(err)
            }
        }
    }

    /// Generates every shot that has no image yet, in storyboard order.
    ///
    /// A failed shot is counted and the run moves on to the next one; only
    /// the cancel token stops it early. A rejected credential is flagged in
    /// the report so the caller can ask for a new key.
    pub async fn generate_all(
        &self,
        board: &mut Storyboard,
        credential: Option<&Credential>,
        cancel: &CancelToken,
    ) -> Result<BulkReport, GenerationError> {
        let credential = credential.ok_or(GenerationError::MissingCredential)?;
        let pending = board.pending_generation();
        info!(pending = pending.len(), backend = self.backend.name(), "bulk generation started");

        let mut report = BulkReport::default();
        for id in pending {
            if cancel.is_cancelled() {
                report.cancelled = true;
                break;
            }
            match self.generate_shot(board, id, Some(credential)).await {
                Ok(true) => report.generated += 1,
                Ok(false) => report.skipped += 1,
                Err(err) => {
                    report.failed += 1;
                    report.credential_invalid |= err.is_credential_invalid();
                }
            }
        }

        info!(
            generated = report.generated,
            failed = report.failed,
            cancelled = report.cancelled,
            credential_invalid = report.credential_invalid,
            "bulk generation finished"
        );
        Ok(report)
    }
}

fn failure_message(locale: Locale, err: &GenerationError) -> &'static str {
    if err.is_credential_invalid() {
        locale.credential_reset_message()
    } else {
        locale.generation_failed_message()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancel_token_is_shared() {
        let token = CancelToken::new();
        let clone = token.clone();
        assert!(!token.is_cancelled());
        clone.cancel();
        assert!(token.is_cancelled());
    }

    #[test]
    fn test_failure_messages() {
        assert_eq!(
            failure_message(
                Locale::English,
                &GenerationError::CredentialInvalid(String::new())
            ),
            "API key needs to be reset"
        );
        assert_eq!(
            failure_message(Locale::Vietnamese, &GenerationError::NoImage),
            "Lỗi tạo ảnh"
        );
    }
}
