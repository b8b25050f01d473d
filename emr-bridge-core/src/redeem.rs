use async_trait::async_trait;

use crate::types::ContinuationToken;

/// Error type for redemption calls.
#[derive(Debug, thiserror::Error)]
pub enum RedemptionError {
    /// The workflow engine refused the call (unknown, expired or already
    /// closed token).
    #[error("Rejected by workflow engine: {0}")]
    Rejected(String),

    /// The call never got a definitive answer.
    #[error("Transport error: {0}")]
    Transport(String),
}

/// Signals sent to the workflow engine for a suspended task.
///
/// Each call is sent once; retry policy belongs to the transport's own
/// configuration, not to implementations of this trait.
#[async_trait]
pub trait RedemptionClient: Send + Sync {
    async fn heartbeat(&self, token: &ContinuationToken) -> Result<(), RedemptionError>;

    async fn succeed(&self, token: &ContinuationToken, output: &str)
        -> Result<(), RedemptionError>;

    async fn fail(
        &self,
        token: &ContinuationToken,
        error: &str,
        cause: &str,
    ) -> Result<(), RedemptionError>;
}

/// Step Functions limit for the `error` field of a task failure.
pub const MAX_ERROR_CHARS: usize = 256;

/// Step Functions limit for the `cause` field of a task failure.
pub const MAX_CAUSE_CHARS: usize = 32_768;

/// Cut `s` to at most `max` characters without splitting a code point.
pub fn truncate_chars(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_short_string_untouched() {
        assert_eq!(truncate_chars("abc", 10), "abc");
        assert_eq!(truncate_chars("abc", 3), "abc");
    }

    #[test]
    fn test_truncate_on_char_boundary() {
        assert_eq!(truncate_chars("ééé", 2), "éé");
        assert_eq!(truncate_chars("abcdef", 0), "");
    }
}
