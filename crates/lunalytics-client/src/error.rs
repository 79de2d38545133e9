//! Lunalytics client errors

use thiserror::Error;

/// Errors that can occur when interacting with the Lunalytics API
#[derive(Debug, Error)]
pub enum LunalyticsError {
    /// HTTP request/response error raised by reqwest
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Authentication failed (401/403, invalid or expired token)
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Monitor does not exist in Lunalytics (404)
    #[error("Not found: {0}")]
    NotFound(String),

    /// Lunalytics rejected the payload (422)
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Too many requests (429)
    #[error("Rate limit exceeded: {0}")]
    RateLimited(String),

    /// Lunalytics returned a 5xx status
    #[error("Server error ({status}): {message}")]
    Server {
        /// HTTP status code
        status: u16,
        /// Message extracted from the response body
        message: String,
    },

    /// Any other unexpected response
    #[error("Lunalytics API error ({status}): {message}")]
    Api {
        /// HTTP status code
        status: u16,
        /// Message extracted from the response body
        message: String,
    },

    /// JSON serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Retries ran out; carries the last underlying failure
    #[error("Retry exhausted after {attempts} attempts: {last}")]
    RetryExhausted {
        /// Number of attempts made
        attempts: u32,
        /// The error returned by the final attempt
        last: Box<LunalyticsError>,
    },

    /// Shutdown requested while waiting to retry
    #[error("Operation cancelled")]
    Cancelled,
}

/// Failure classes used by the retry engine and the reconciler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Timeouts, refused connections, truncated responses
    Transport,
    /// Bad or missing credentials
    Authentication,
    /// Record does not exist
    NotFound,
    /// Payload rejected
    Validation,
    /// Backend throttling
    RateLimited,
    /// Backend failure
    Server,
    /// Everything else
    Unclassified,
}

impl LunalyticsError {
    /// Classifies this error.
    pub fn class(&self) -> ErrorClass {
        match self {
            LunalyticsError::Http(e) => {
                if e.is_timeout() || e.is_connect() || e.is_request() || e.is_body() {
                    ErrorClass::Transport
                } else if let Some(status) = e.status() {
                    classify_status(status.as_u16())
                } else {
                    ErrorClass::Unclassified
                }
            }
            LunalyticsError::Authentication(_) => ErrorClass::Authentication,
            LunalyticsError::NotFound(_) => ErrorClass::NotFound,
            LunalyticsError::Validation(_) => ErrorClass::Validation,
            LunalyticsError::RateLimited(_) => ErrorClass::RateLimited,
            LunalyticsError::Server { .. } => ErrorClass::Server,
            LunalyticsError::RetryExhausted { last, .. } => last.class(),
            LunalyticsError::Api { .. }
            | LunalyticsError::Serialization(_)
            | LunalyticsError::Cancelled => ErrorClass::Unclassified,
        }
    }

    /// Whether the retry engine may try the call again.
    ///
    /// Only transport failures, 5xx responses and rate limiting qualify.
    /// A `RetryExhausted` error is terminal and never retried again.
    pub fn is_retryable(&self) -> bool {
        if matches!(self, LunalyticsError::RetryExhausted { .. } | LunalyticsError::Cancelled) {
            return false;
        }
        matches!(
            self.class(),
            ErrorClass::Transport | ErrorClass::Server | ErrorClass::RateLimited
        )
    }

    /// True when the backend reported that the monitor does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self.class(), ErrorClass::NotFound)
    }
}

/// Maps an HTTP status code that is not 200 onto an error class.
pub fn classify_status(status: u16) -> ErrorClass {
    match status {
        401 | 403 => ErrorClass::Authentication,
        404 => ErrorClass::NotFound,
        422 => ErrorClass::Validation,
        429 => ErrorClass::RateLimited,
        500..=599 => ErrorClass::Server,
        _ => ErrorClass::Unclassified,
    }
}

impl LunalyticsError {
    /// Builds the error for a non-success response.
    pub fn from_status(status: u16, message: String) -> Self {
        match classify_status(status) {
            ErrorClass::Authentication => LunalyticsError::Authentication(message),
            ErrorClass::NotFound => LunalyticsError::NotFound(message),
            ErrorClass::Validation => LunalyticsError::Validation(message),
            ErrorClass::RateLimited => LunalyticsError::RateLimited(message),
            ErrorClass::Server => LunalyticsError::Server { status, message },
            ErrorClass::Transport | ErrorClass::Unclassified => {
                LunalyticsError::Api { status, message }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classification() {
        assert_eq!(classify_status(401), ErrorClass::Authentication);
        assert_eq!(classify_status(404), ErrorClass::NotFound);
        assert_eq!(classify_status(422), ErrorClass::Validation);
        assert_eq!(classify_status(429), ErrorClass::RateLimited);
        assert_eq!(classify_status(503), ErrorClass::Server);
        assert_eq!(classify_status(418), ErrorClass::Unclassified);
    }

    #[test]
    fn test_structural_errors_are_not_retryable() {
        assert!(!LunalyticsError::Authentication("bad token".into()).is_retryable());
        assert!(!LunalyticsError::NotFound("gone".into()).is_retryable());
        assert!(!LunalyticsError::Validation("bad url".into()).is_retryable());
        assert!(!LunalyticsError::Api { status: 418, message: "teapot".into() }.is_retryable());
    }

    #[test]
    fn test_transient_errors_are_retryable() {
        assert!(LunalyticsError::from_status(502, "bad gateway".into()).is_retryable());
        assert!(LunalyticsError::from_status(429, "slow down".into()).is_retryable());
    }

    #[test]
    fn test_exhausted_keeps_class_of_last_error() {
        let err = LunalyticsError::RetryExhausted {
            attempts: 3,
            last: Box::new(LunalyticsError::from_status(500, "boom".into())),
        };
        assert_eq!(err.class(), ErrorClass::Server);
        assert!(!err.is_retryable());
    }
}
