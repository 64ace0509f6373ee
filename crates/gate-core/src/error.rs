//! ============================================================================
//! Gate Errors - Failure taxonomy for the access proof pipeline
//! ============================================================================
//! Transport and format failures are absorbed by tier fallback; mismatches
//! surface as a Denied decision; configuration errors abort startup.
//! ============================================================================

use thiserror::Error;

/// Error types for the credential gate
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GateError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Unexpected upstream response: {0}")]
    UpstreamFormat(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Commitment does not reconcile: {0}")]
    VerificationMismatch(String),

    #[error("Malformed commitment: {0}")]
    MalformedCommitment(String),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

pub type GateResult<T> = std::result::Result<T, GateError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages_name_the_category() {
        let err = GateError::Transport("connection reset".into());
        assert_eq!(err.to_string(), "Transport error: connection reset");

        let err = GateError::NotFound("asset X1".into());
        assert_eq!(err.to_string(), "Not found: asset X1");
    }
}
