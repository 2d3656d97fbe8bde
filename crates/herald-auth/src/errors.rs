//! Admission error types.

use std::time::Duration;

/// Why a connection attempt was refused.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AdmissionError {
    /// Neither the auth field nor the query string carried a token.
    #[error("authentication required: no bearer credential provided")]
    MissingCredential,

    /// The verifier did not answer in time.
    #[error("identity verification timed out after {0:?}")]
    VerificationTimeout(Duration),

    /// The verifier answered, but not with a usable identity.
    #[error("identity verification rejected ({status}): {reason}")]
    VerificationRejected {
        /// HTTP status returned by the verifier.
        status: u16,
        /// Short description.
        reason: String,
    },

    /// The verifier could not be reached at all.
    #[error("identity verifier unreachable: {0}")]
    UnreachableVerifier(String),
}

impl AdmissionError {
    /// Stable label for logs and metrics.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::MissingCredential => "missing_credential",
            Self::VerificationTimeout(_) => "verification_timeout",
            Self::VerificationRejected { .. } => "verification_rejected",
            Self::UnreachableVerifier(_) => "unreachable_verifier",
        }
    }

    /// Whether the client's credential is at fault (as opposed to the verifier).
    pub fn is_credential_error(&self) -> bool {
        matches!(
            self,
            Self::MissingCredential | Self::VerificationRejected { .. }
        )
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejected_display() {
        let err = AdmissionError::VerificationRejected {
            status: 401,
            reason: "Unauthorized".into(),
        };
        assert_eq!(
            err.to_string(),
            "identity verification rejected (401): Unauthorized"
        );
    }

    #[test]
    fn timeout_display() {
        let err = AdmissionError::VerificationTimeout(Duration::from_secs(5));
        assert!(err.to_string().contains("5s"));
    }

    #[test]
    fn reasons_are_distinct() {
        let errs = [
            AdmissionError::MissingCredential,
            AdmissionError::VerificationTimeout(Duration::ZERO),
            AdmissionError::VerificationRejected {
                status: 403,
                reason: String::new(),
            },
            AdmissionError::UnreachableVerifier(String::new()),
        ];
        let labels: std::collections::BTreeSet<_> =
            errs.iter().map(AdmissionError::reason).collect();
        assert_eq!(labels.len(), errs.len());
    }

    #[test]
    fn credential_errors_vs_verifier_errors() {
        assert!(AdmissionError::MissingCredential.is_credential_error());
        assert!(
            AdmissionError::VerificationRejected {
                status: 401,
                reason: String::new()
            }
            .is_credential_error()
        );
        assert!(!AdmissionError::VerificationTimeout(Duration::ZERO).is_credential_error());
        assert!(!AdmissionError::UnreachableVerifier("refused".into()).is_credential_error());
    }
}
