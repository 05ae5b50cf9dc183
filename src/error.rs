use std::time::Duration;

use thiserror::Error;

/// Failure of a single provider call. The resolver treats every variant the
/// same way: the provider is unavailable for the current title variant.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("request to {provider} failed: {source}")]
    Http {
        provider: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("{provider} returned HTTP {status}: {body}")]
    Status {
        provider: &'static str,
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("{provider} API error: {message}")]
    Api {
        provider: &'static str,
        message: String,
    },

    #[error("failed to parse {what} from {provider}: {source}")]
    Decode {
        provider: &'static str,
        what: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("{provider} did not answer within {timeout:?}")]
    Timeout {
        provider: &'static str,
        timeout: Duration,
    },

    #[error("invalid {provider} base URL {url:?}")]
    BaseUrl { provider: &'static str, url: String },

    #[error("malformed {provider} identifier {id:?}")]
    InvalidId { provider: &'static str, id: String },
}

/// Outcomes of `EpisodeResolver::resolve` that the caller has to handle.
/// Running out of title variants is not one of them.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ResolveError {
    #[error("invalid resolution request: {0}")]
    InvalidRequest(String),

    #[error("resolution cancelled")]
    Cancelled,
}
