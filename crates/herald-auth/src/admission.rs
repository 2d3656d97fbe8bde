//! Credential extraction and the admission gate.

use std::sync::Arc;
use std::time::Duration;

use herald_core::Identity;
use tracing::{debug, info, warn};

use crate::errors::AdmissionError;
use crate::verifier::IdentityVerifier;

/// Upper bound on a single verification call.
pub const DEFAULT_VERIFY_TIMEOUT: Duration = Duration::from_secs(5);

/// Credentials offered by a connecting client.
///
/// The handshake's auth field wins over the query-string token; empty
/// strings count as absent.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ConnectionAttempt {
    /// Token from the auth field (`Authorization: Bearer ...`).
    pub auth_token: Option<String>,
    /// Token from the `token` query parameter.
    pub query_token: Option<String>,
}

impl ConnectionAttempt {
    /// Attempt carrying the given tokens.
    pub fn new(auth_token: Option<String>, query_token: Option<String>) -> Self {
        Self {
            auth_token,
            query_token,
        }
    }

    /// Attempt built from a raw `Authorization` header value and query token.
    ///
    /// The `Bearer ` scheme prefix is stripped case-insensitively; a header
    /// without it is taken as the bare token.
    pub fn from_authorization_header(header: Option<&str>, query_token: Option<String>) -> Self {
        let auth_token = header.map(|value| {
            let value = value.trim();
            match value.split_once(char::is_whitespace) {
                Some((scheme, rest)) if scheme.eq_ignore_ascii_case("bearer") => {
                    rest.trim().to_string()
                }
                None if value.eq_ignore_ascii_case("bearer") => String::new(),
                _ => value.to_string(),
            }
        });
        Self::new(auth_token, query_token)
    }

    /// The credential to verify, if any.
    pub fn credential(&self) -> Option<&str> {
        self.auth_token
            .as_deref()
            .filter(|t| !t.is_empty())
            .or_else(|| self.query_token.as_deref().filter(|t| !t.is_empty()))
    }
}

/// Admits or refuses connection attempts.
#[derive(Clone)]
pub struct AdmissionGate {
    verifier: Arc<dyn IdentityVerifier>,
    timeout: Duration,
}

impl AdmissionGate {
    /// Gate backed by `verifier` with the default timeout.
    pub fn new(verifier: Arc<dyn IdentityVerifier>) -> Self {
        Self::with_timeout(verifier, DEFAULT_VERIFY_TIMEOUT)
    }

    /// Gate backed by `verifier` giving up after `timeout`.
    pub fn with_timeout(verifier: Arc<dyn IdentityVerifier>, timeout: Duration) -> Self {
        Self { verifier, timeout }
    }

    /// Verification timeout in effect.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Decide one connection attempt.
    ///
    /// Exactly one verification call is made per attempt. The verifier is
    /// not consulted when no credential is present.
    pub async fn admit(&self, attempt: &ConnectionAttempt) -> Result<Identity, AdmissionError> {
        let Some(token) = attempt.credential() else {
            debug!("connection attempt without credential");
            return Err(AdmissionError::MissingCredential);
        };

        let result = match tokio::time::timeout(self.timeout, self.verifier.verify(token)).await {
            Ok(result) => result,
            Err(_) => Err(AdmissionError::VerificationTimeout(self.timeout)),
        };

        match &result {
            Ok(identity) => info!(
                user_id = %identity.id,
                user = identity.display_name(),
                roles = identity.roles.len(),
                "connection admitted"
            ),
            Err(e) => warn!(reason = e.reason(), error = %e, "connection refused"),
        }
        result
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
