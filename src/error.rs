//! Error types for the dispatch, resolve, status and cancel paths.
//!
//! Platform response bodies are carried verbatim so operators can match them
//! against GitHub's own diagnostics.

use thiserror::Error;

/// A required setting is absent or malformed. Raised before any remote call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("GitHub token not configured")]
    MissingToken,
    #[error("GitHub repository not configured")]
    MissingRepository,
    #[error("GitHub workflow not configured")]
    MissingWorkflow,
    #[error("ref must not be empty")]
    EmptyRef,
    #[error("repository must be in owner/name form, got {0:?}")]
    InvalidRepository(String),
    #[error("API base URL cannot carry a path")]
    InvalidApiUrl,
}

/// A run id that cannot stand as a single URL path segment.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid run id {0:?}")]
pub struct InvalidRunId(pub String);

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("dispatch request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("dispatch rejected with HTTP {status}: {body}")]
    Rejected { status: u16, body: String },
}

#[derive(Debug, Error)]
pub enum QueryError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    InvalidRunId(#[from] InvalidRunId),
    #[error("request to GitHub failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("GitHub returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("unexpected response from GitHub: {0}")]
    Decode(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum ResolveError {
    /// The listing never showed a matching run within the retry budget.
    #[error("no workflow_dispatch run for ref {ref_name:?} appeared after {attempts} listing attempt(s)")]
    NotFound { ref_name: String, attempts: u32 },
    #[error("listing workflow runs failed: {0}")]
    QueryFailed(#[from] QueryError),
}

#[derive(Debug, Error)]
pub enum CancelError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    InvalidRunId(#[from] InvalidRunId),
    #[error("cancel request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("cancel rejected with HTTP {status}: {body}")]
    Rejected { status: u16, body: String },
}

/// Failure of the combined dispatch + resolve chain behind `/run_scraper`.
#[derive(Debug, Error)]
pub enum TriggerError {
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
    #[error(transparent)]
    Resolve(#[from] ResolveError),
}

impl From<ConfigError> for TriggerError {
    fn from(err: ConfigError) -> Self {
        TriggerError::Dispatch(DispatchError::Config(err))
    }
}
