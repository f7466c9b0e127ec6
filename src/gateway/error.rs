//! Error types raised while talking to the LLM gateway.

use reqwest::StatusCode;
use thiserror::Error;

/// Failures that can occur while calling the gateway.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// No API key was configured.
    #[error("LLM_API_KEY is not configured")]
    MissingApiKey,
    /// Building the HTTP client failed.
    #[error("failed to build gateway client")]
    ClientBuilder {
        #[source]
        source: reqwest::Error,
    },
    /// The request could not be sent.
    #[error("failed to reach the AI gateway")]
    Send {
        #[source]
        source: reqwest::Error,
    },
    /// Gateway answered 429.
    #[error("AI gateway rate limit exceeded")]
    RateLimited,
    /// Gateway answered 402.
    #[error("AI gateway credits exhausted")]
    QuotaExhausted,
    /// Gateway answered another non-success status.
    #[error("AI gateway error: {status}")]
    Status { status: StatusCode, body: String },
    /// Response payload could not be decoded.
    #[error("failed to decode AI gateway response")]
    Decode {
        #[source]
        source: reqwest::Error,
    },
}
