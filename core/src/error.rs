//! Error types for the CPAS client.
//!
//! # Design
//! Every failure a call can hit is flattened into a descriptive string before
//! it reaches the completion handler, so `CpasError` stays `Clone` and can be
//! compared in tests. Transport failures and non-2xx statuses both land in
//! `Network`; the service's own `{"error": ...}` payload is not an error here
//! and is passed through as decoded content.

use std::time::Duration;

use thiserror::Error;

use crate::types::Shape;

/// Errors produced by configuration and by dispatched calls.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CpasError {
    /// A connection or dispatcher setting was missing or out of range.
    #[error("invalid configuration: {0}")]
    Configuration(String),

    /// The request could not be sent, or the server answered with a non-2xx
    /// status.
    #[error("network error: {0}")]
    Network(String),

    /// The fetch did not finish within the configured timeout.
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// The response body did not match the expected shape.
    #[error("failed to decode {shape} response: {message}")]
    Decode { shape: Shape, message: String },

    /// The call was cancelled, or the dispatcher was torn down before the
    /// call completed.
    #[error("call cancelled before completion")]
    Cancelled,

    /// The completion handler panicked. The outcome had already been handed
    /// to it.
    #[error("completion handler panicked")]
    HandlerPanicked,

    /// The worker pool or the HTTP client could not be created.
    #[error("failed to start dispatcher: {0}")]
    Runtime(String),
}

impl CpasError {
    /// Wrap a transport error, dropping the request URL since it embeds the
    /// access key.
    pub(crate) fn network(err: reqwest::Error) -> Self {
        CpasError::Network(err.without_url().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_error_names_the_shape() {
        let err = CpasError::Decode {
            shape: Shape::BanInfo,
            message: "missing field `reason`".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "failed to decode ban-info response: missing field `reason`"
        );
    }

    #[test]
    fn timeout_reports_the_limit() {
        let err = CpasError::Timeout(Duration::from_secs(5));
        assert_eq!(err.to_string(), "request timed out after 5s");
    }
}
