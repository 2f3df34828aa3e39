use std::time::Duration;

use thiserror::Error;

use crate::TestState;

/// Everything that can go wrong while talking to the autopkgtest service.
#[derive(Error, Debug)]
pub enum Error {
    /// A link request is missing a required field.
    #[error("{0}")]
    Validation(String),

    /// The HTTP request itself failed (DNS, TLS, timeout, ...).
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The service answered with something other than `200 OK`.
    #[error("unexpected status code: {code}")]
    UpstreamStatus {
        /// HTTP status code of the response.
        code: u16,
    },

    /// The submission page looked successful but carried no UUID.
    #[error("test submission response parsed but UUID not found")]
    MalformedSuccessResponse,

    /// The service rejected the request and told us why.
    #[error("invalid request: {message}")]
    InvalidRequest {
        /// Explanation given by the service.
        message: String,
    },

    /// An equivalent test is already queued or running.
    #[error("test already running for this package/release/arch combination")]
    AlreadyRunning,

    /// The session cookie is missing or expired.
    #[error("authentication required: please authenticate first")]
    AuthenticationRequired,

    /// The response matched none of the known page layouts.
    #[error("unexpected response from server")]
    UnexpectedResponse,

    /// Polling gave up before the test reached a terminal state.
    #[error("timeout reached after {timeout:?} (last status: {last_status})")]
    Timeout {
        /// How long we were willing to wait.
        timeout: Duration,
        /// State seen by the last poll.
        last_status: TestState,
    },

    /// No in-flight test matches the requested combination.
    #[error("no running test found for {package}/{release}/{arch}")]
    #[allow(missing_docs)]
    NotFound {
        package: String,
        release: String,
        arch: String,
    },

    /// A base or request URL could not be parsed or extended.
    #[error("invalid url: {0}")]
    InvalidUrl(String),
}

impl From<url::ParseError> for Error {
    fn from(err: url::ParseError) -> Self {
        Self::InvalidUrl(err.to_string())
    }
}

/// Result type used throughout the service client layer.
pub type Result<T, E = Error> = std::result::Result<T, E>;
