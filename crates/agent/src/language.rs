use async_trait::async_trait;
use haggle_core::{NegotiationSession, Role, Turn};
use thiserror::Error;

/// How a message functions in the negotiation, as judged by the external
/// classifier. `Unknown` is a valid non-terminal outcome; the engine treats
/// it identically to `Negotiation`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Intent {
    Acceptance,
    Rejection,
    Negotiation,
    Unknown,
}

impl Intent {
    /// Maps a classifier label to an intent, tolerating drift: anything that
    /// does not resolve to a known label is `Unknown`, never an error.
    pub fn from_label(label: &str) -> Self {
        let normalized = label.trim().to_ascii_lowercase();
        if normalized.contains("accept") {
            Self::Acceptance
        } else if normalized.contains("reject") {
            Self::Rejection
        } else if normalized.contains("negoti") {
            Self::Negotiation
        } else {
            Self::Unknown
        }
    }
}

#[derive(Debug, Error)]
pub enum LanguageServiceError {
    #[error("language service timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },
    #[error("language service transport failure: {0}")]
    Transport(String),
    #[error("language service returned status {status}")]
    Status { status: u16 },
    #[error("language service returned a malformed response: {0}")]
    MalformedResponse(String),
    #[error("language service returned an empty reply")]
    EmptyReply,
}

impl LanguageServiceError {
    /// Transient failures worth one more attempt; malformed payloads and
    /// empty replies are not.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout { .. } | Self::Transport(_))
    }
}

/// The external text capability the engine consumes but does not implement.
/// Both operations surface distinguishable failures instead of silently
/// returning empty text.
#[async_trait]
pub trait LanguageService: Send + Sync {
    async fn classify_intent(
        &self,
        message: &str,
        role: Role,
        session: &NegotiationSession,
    ) -> Result<Intent, LanguageServiceError>;

    async fn generate_reply(&self, history: &[Turn]) -> Result<String, LanguageServiceError>;
}
