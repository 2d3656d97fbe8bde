//! # herald-auth
//!
//! Connection admission for the Herald gateway.
//!
//! Every connection attempt passes through [`AdmissionGate::admit`] exactly
//! once. The gate pulls a bearer credential out of the handshake, asks an
//! [`IdentityVerifier`] who it belongs to, and either returns the verified
//! [`Identity`](herald_core::Identity) or an [`AdmissionError`]. Both
//! outcomes are terminal: a rejected attempt is never retried here and never
//! reaches the connection registry.
//!
//! - [`verifier`]: the verifier trait and its HTTP implementation
//! - [`admission`]: credential extraction and the timeout-bounded gate

#![deny(unsafe_code)]

pub mod admission;
pub mod errors;
pub mod verifier;

pub use admission::{AdmissionGate, ConnectionAttempt, DEFAULT_VERIFY_TIMEOUT};
pub use errors::AdmissionError;
pub use verifier::{HttpIdentityVerifier, IdentityVerifier};
