//! Queue message decode errors.

use thiserror::Error;

/// A queue message body that cannot be turned into an [`EventEnvelope`].
///
/// [`EventEnvelope`]: crate::EventEnvelope
#[derive(Debug, Error)]
pub enum DecodeError {
    /// Body is not valid JSON or does not match the envelope shape.
    #[error("malformed envelope JSON: {0}")]
    Json(#[from] serde_json::Error),
    /// The `event` field is present but empty.
    #[error("envelope has an empty event name")]
    EmptyEventName,
    /// `teamId` is present but is not a string or number.
    #[error("envelope teamId is not a string or number")]
    InvalidTeamId,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_error_display() {
        let json_err = serde_json::from_str::<serde_json::Value>("{bad").unwrap_err();
        let err = DecodeError::from(json_err);
        assert!(err.to_string().starts_with("malformed envelope JSON"));
    }

    #[test]
    fn empty_event_display() {
        assert_eq!(
            DecodeError::EmptyEventName.to_string(),
            "envelope has an empty event name"
        );
    }
}
