use miette::Diagnostic;
use thiserror::Error;

/// Failures surfaced to callers of [`crate::HubClient`].
///
/// Only [`HubError::AllHubsFailed`] is meant to be fatal to a caller -- every
/// other variant is produced internally while the client is still retrying
/// or failing over, and a caller that sees one of those without
/// `AllHubsFailed` wrapping it has found a bug in the client.
#[derive(Debug, Error, Diagnostic)]
pub enum HubError {
    #[error("all {attempted} configured hub(s) failed after {attempts} attempt(s); last error: {source}")]
    AllHubsFailed {
        attempted: usize,
        attempts: u32,
        #[source]
        source: Box<HubError>,
    },

    #[error("hub request timed out")]
    Timeout,

    #[error("error building hub request")]
    RequestBuild(#[source] reqwest::Error),

    #[error("error executing hub request")]
    RequestExecute(#[source] reqwest::Error),

    #[error("hub responded with a non-2xx status: {status}")]
    Status { status: reqwest::StatusCode },

    #[error("error reading hub response body")]
    RequestBody(#[source] reqwest::Error),

    #[error("error decoding hub response")]
    Decode(#[source] serde_json::Error),

    #[error("hub is rate-limiting this client")]
    RateLimited,
}
