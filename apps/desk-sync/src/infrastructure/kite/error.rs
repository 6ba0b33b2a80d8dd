//! Kite-specific error types.

use thiserror::Error;

use crate::application::ports::BrokerageError;

/// Errors from the Kite adapter.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum KiteError {
    /// Transport failure.
    #[error("Network error: {0}")]
    Network(String),

    /// Request timed out.
    #[error("Request timed out")]
    Timeout,

    /// Session token rejected (`TokenException`).
    #[error("{0}")]
    Token(String),

    /// Bad request parameters (`InputException`).
    #[error("{0}")]
    Input(String),

    /// Order rejected (`OrderException`).
    #[error("{0}")]
    Order(String),

    /// Rate limited.
    #[error("Rate limited")]
    RateLimited,

    /// Any other API error.
    #[error("{error_type}: {message}")]
    Api {
        /// HTTP status.
        status: u16,
        /// `error_type` from the envelope.
        error_type: String,
        /// `message` from the envelope.
        message: String,
    },

    /// Response body could not be decoded.
    #[error("Decode error: {0}")]
    Decode(String),

    /// Retries exhausted.
    #[error("Max retries exceeded after {attempts} attempts")]
    MaxRetriesExceeded {
        /// Attempts made.
        attempts: u32,
    },
}

impl KiteError {
    /// Map an error envelope to a typed error.
    #[must_use]
    pub fn from_envelope(status: u16, error_type: Option<&str>, message: String) -> Self {
        match error_type.unwrap_or_default() {
            "TokenException" => Self::Token(message),
            "InputException" => Self::Input(message),
            "OrderException" => Self::Order(message),
            "NetworkException" => Self::Network(message),
            _ if status == 403 => Self::Token(message),
            _ if status == 429 => Self::RateLimited,
            other => Self::Api {
                status,
                error_type: if other.is_empty() {
                    "GeneralException".to_string()
                } else {
                    other.to_string()
                },
                message,
            },
        }
    }
}

impl From<KiteError> for BrokerageError {
    fn from(err: KiteError) -> Self {
        match err {
            KiteError::Network(message) => Self::Connection { message },
            KiteError::MaxRetriesExceeded { .. } => Self::Connection {
                message: err.to_string(),
            },
            KiteError::Timeout => Self::Timeout,
            KiteError::Token(message) => Self::Session { message },
            KiteError::Input(message) | KiteError::Order(message) => Self::Rejected { message },
            KiteError::RateLimited => Self::RateLimited,
            KiteError::Api { .. } | KiteError::Decode(_) => Self::Unknown {
                message: err.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;

    #[test_case(403, Some("TokenException"), "Token"; "token exception")]
    #[test_case(400, Some("InputException"), "Input"; "input exception")]
    #[test_case(400, Some("OrderException"), "Order"; "order exception")]
    #[test_case(403, None, "Token"; "bare forbidden")]
    #[test_case(429, None, "RateLimited"; "bare rate limit")]
    #[test_case(500, Some("DataException"), "Api"; "other exception")]
    fn envelope_mapping(status: u16, error_type: Option<&str>, expected: &str) {
        let err = KiteError::from_envelope(status, error_type, "msg".to_string());
        let kind = format!("{err:?}");
        assert!(kind.starts_with(expected), "{kind} should be {expected}");
    }

    #[test]
    fn order_rejection_keeps_bare_message() {
        let err: BrokerageError = KiteError::Order("Insufficient funds".to_string()).into();
        assert!(matches!(err, BrokerageError::Rejected { .. }));
        assert_eq!(err.to_string(), "Insufficient funds");
    }

    #[test]
    fn transport_errors_are_transient() {
        let timeout: BrokerageError = KiteError::Timeout.into();
        assert!(timeout.is_timeout());
        let exhausted: BrokerageError = KiteError::MaxRetriesExceeded { attempts: 3 }.into();
        assert!(exhausted.is_transient());
        let session: BrokerageError = KiteError::Token("expired".to_string()).into();
        assert!(!session.is_transient());
    }
}
