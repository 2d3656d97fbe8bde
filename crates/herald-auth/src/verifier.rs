//! Identity verification against an external HTTP endpoint.

use std::time::Duration;

use async_trait::async_trait;
use herald_core::{Identity, scalar_id};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::errors::AdmissionError;

/// Resolves a bearer credential to an identity.
///
/// Implementations map their failures onto [`AdmissionError`]; the
/// [`AdmissionGate`](crate::AdmissionGate) adds the overall timeout.
#[async_trait]
pub trait IdentityVerifier: Send + Sync {
    /// Verify `token` and return who it belongs to.
    async fn verify(&self, token: &str) -> Result<Identity, AdmissionError>;
}

/// Verifier that calls `GET <endpoint>` with `Authorization: Bearer <token>`.
pub struct HttpIdentityVerifier {
    client: reqwest::Client,
    endpoint: String,
    timeout: Duration,
}

/// Success body of the verification endpoint.
#[derive(Deserialize)]
struct IdentityResponse {
    #[serde(default)]
    id: Option<Value>,
    #[serde(default)]
    sub: Option<Value>,
    #[serde(default)]
    employee_id: Option<Value>,
    #[serde(default)]
    preferred_username: Option<String>,
    #[serde(default)]
    roles: Option<Vec<Value>>,
}

impl IdentityResponse {
    fn into_identity(self) -> Option<Identity> {
        let id = self
            .id
            .as_ref()
            .and_then(scalar_id)
            .or_else(|| self.sub.as_ref().and_then(scalar_id))?;
        let mut identity = Identity::new(id).with_roles(
            self.roles
                .unwrap_or_default()
                .iter()
                .filter_map(Value::as_str)
                .filter(|r| !r.is_empty())
                .map(str::to_owned)
                .collect::<Vec<_>>(),
        );
        identity.employee_id = self.employee_id.as_ref().and_then(scalar_id);
        identity.username = self.preferred_username;
        Some(identity)
    }
}

impl HttpIdentityVerifier {
    /// Create a verifier for `endpoint` whose HTTP requests give up after `timeout`.
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
            timeout,
        })
    }

    /// The verification URL.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl IdentityVerifier for HttpIdentityVerifier {
    async fn verify(&self, token: &str) -> Result<Identity, AdmissionError> {
        let response = self
            .client
            .get(&self.endpoint)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AdmissionError::VerificationTimeout(self.timeout)
                } else {
                    warn!(endpoint = %self.endpoint, error = %e, "identity verifier request failed");
                    AdmissionError::UnreachableVerifier(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            debug!(status = status.as_u16(), "identity verifier refused token");
            return Err(AdmissionError::VerificationRejected {
                status: status.as_u16(),
                reason: status.canonical_reason().unwrap_or("unknown").to_string(),
            });
        }

        let body: IdentityResponse = response.json().await.map_err(|e| {
            if e.is_timeout() {
                AdmissionError::VerificationTimeout(self.timeout)
            } else {
                warn!(error = %e, "identity verifier returned an unreadable body");
                AdmissionError::VerificationRejected {
                    status: status.as_u16(),
                    reason: "malformed identity response".into(),
                }
            }
        })?;

        body.into_identity()
            .ok_or_else(|| AdmissionError::VerificationRejected {
                status: status.as_u16(),
                reason: "identity response has no subject".into(),
            })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
