//! Broker error types.

/// Errors raised while talking to the broker.
#[derive(Debug, thiserror::Error)]
pub enum BrokerError {
    /// Opening the connection or channel failed.
    #[error("broker connection failed: {0}")]
    Connect(String),

    /// A channel operation (declare, qos, consume, receive) failed.
    #[error("broker channel error: {0}")]
    Channel(String),

    /// Acknowledging a delivery failed.
    #[error("ack failed for delivery {tag}: {reason}")]
    Ack {
        /// Delivery tag that was being acknowledged.
        tag: u64,
        /// What went wrong.
        reason: String,
    },

    /// The connection was closed underneath an operation.
    #[error("broker connection closed")]
    Closed,
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, BrokerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_messages() {
        assert_eq!(
            BrokerError::Connect("refused".into()).to_string(),
            "broker connection failed: refused"
        );
        assert_eq!(
            BrokerError::Ack {
                tag: 7,
                reason: "unknown tag".into()
            }
            .to_string(),
            "ack failed for delivery 7: unknown tag"
        );
        assert_eq!(BrokerError::Closed.to_string(), "broker connection closed");
    }
}
