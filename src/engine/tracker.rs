use crate::engine::github::GitHubClient;
use crate::error::{CancelError, ConfigError, QueryError};
use crate::model::{Conclusion, RunId, RunState, RunStatus};
use reqwest::{Method, StatusCode};
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Single-slot pointer to the most recently resolved run.
///
/// Writes replace the value outright; the last resolve to finish wins.
#[derive(Debug, Default)]
pub struct TrackedRun {
    slot: RwLock<Option<RunId>>,
}

impl TrackedRun {
    pub async fn latest(&self) -> Option<RunId> {
        self.slot.read().await.clone()
    }

    pub(crate) async fn record(&self, run_id: RunId) {
        *self.slot.write().await = Some(run_id);
    }
}

/// Cancellation request accepted by the platform. The run may still be winding down.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cancelled {
    pub run_id: RunId,
}

#[derive(Debug, Deserialize)]
struct RunPayload {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    conclusion: Option<String>,
}

pub struct Tracker {
    client: Arc<GitHubClient>,
    repository: Option<String>,
    tracked: Arc<TrackedRun>,
}

impl Tracker {
    pub(crate) fn new(
        client: Arc<GitHubClient>,
        repository: Option<String>,
        tracked: Arc<TrackedRun>,
    ) -> Self {
        Self {
            client,
            repository,
            tracked,
        }
    }

    pub async fn last_tracked(&self) -> Option<RunId> {
        self.tracked.latest().await
    }

    fn repository(&self) -> Result<&str, ConfigError> {
        self.repository
            .as_deref()
            .filter(|r| !r.trim().is_empty())
            .ok_or(ConfigError::MissingRepository)
    }

    /// Current state of `run_id`.
    ///
    /// Status is usually polled, so platform and transport failures come back as
    /// `status: "unknown"` with the failure text in `details`. Only missing
    /// configuration and unusable run ids are returned as errors.
    pub async fn get_status(&self, run_id: &RunId) -> Result<RunState, QueryError> {
        match self.fetch_status(run_id).await {
            Ok(state) => Ok(state),
            Err(err @ (QueryError::Config(_) | QueryError::InvalidRunId(_))) => Err(err),
            Err(err) => {
                tracing::warn!(run_id = %run_id, error = %err, "run status lookup failed");
                Ok(RunState::unknown(err.to_string()))
            }
        }
    }

    async fn fetch_status(&self, run_id: &RunId) -> Result<RunState, QueryError> {
        let segment = run_id.as_path_segment()?;
        let token = self.client.credential()?;
        let url = self
            .client
            .endpoint(self.repository()?, &["actions", "runs", segment])?;

        let exchange = self.client.send(token, Method::GET, url, None).await?;
        if exchange.status != StatusCode::OK {
            return Err(QueryError::Status {
                status: exchange.status.as_u16(),
                body: exchange.body,
            });
        }

        let payload: RunPayload = serde_json::from_str(&exchange.body)?;
        Ok(RunState::new(
            payload
                .status
                .map(RunStatus::from)
                .unwrap_or(RunStatus::Unknown),
            payload.conclusion.map(Conclusion::from),
        ))
    }

    /// Request cancellation of `run_id`. Only `202 Accepted` counts as success.
    pub async fn cancel(&self, run_id: &RunId) -> Result<Cancelled, CancelError> {
        let segment = run_id.as_path_segment()?;
        let token = self.client.credential()?;
        let url = self.client.endpoint(
            self.repository()?,
            &["actions", "runs", segment, "cancel"],
        )?;

        let exchange = self.client.send(token, Method::POST, url, None).await?;
        if exchange.status != StatusCode::ACCEPTED {
            tracing::warn!(
                run_id = %run_id,
                status = exchange.status.as_u16(),
                "cancel request rejected"
            );
            return Err(CancelError::Rejected {
                status: exchange.status.as_u16(),
                body: exchange.body,
            });
        }

        tracing::info!(run_id = %run_id, "cancel request accepted");
        Ok(Cancelled {
            run_id: run_id.clone(),
        })
    }
}
