use reqwest::StatusCode;
use thiserror::Error;

/// Problems with the run configuration. Any of these aborts the run before
/// a single request is made.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(
        "No API key configured.\n\
         Hint: set TOMTOM_API_KEY (or API_KEY) in the environment, or run `traffic configure`."
    )]
    MissingApiKey,

    #[error("Unknown timezone '{name}': {reason}")]
    InvalidTimezone { name: String, reason: String },

    #[error("Invalid grid: {0}")]
    InvalidGrid(String),
}

/// Why a single point produced no record. The collector logs these and
/// moves on to the next point.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("API returned status {status}: {body}")]
    Status { status: StatusCode, body: String },

    #[error("could not decode response body: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("response has no flowSegmentData")]
    MissingPayload,

    #[error("currentSpeed or freeFlowSpeed missing")]
    MissingSpeed,

    #[error("freeFlowSpeed is zero")]
    ZeroFreeFlow,
}
