mod dispatch;
mod github;
mod resolve;
mod tracker;

pub use dispatch::{Acknowledged, Dispatcher};
pub use resolve::{select_run, Resolver};
pub use tracker::{Cancelled, TrackedRun, Tracker};

use crate::error::{CancelError, QueryError, TriggerError};
use crate::model::{RelayConfig, RunId, RunRecord, RunState};
use anyhow::Result;
use std::sync::Arc;

/// Dispatches workflows, works out which run each dispatch produced, and tracks runs.
///
/// One instance is shared by every request; the only mutable state is the
/// [`TrackedRun`] slot.
pub struct RunCorrelator {
    cfg: RelayConfig,
    dispatcher: Dispatcher,
    resolver: Resolver,
    tracker: Tracker,
}

impl RunCorrelator {
    pub fn new(cfg: RelayConfig) -> Result<Self> {
        let client = Arc::new(github::GitHubClient::new(&cfg)?);
        let tracked = Arc::new(TrackedRun::default());

        Ok(Self {
            dispatcher: Dispatcher::new(client.clone()),
            resolver: Resolver::new(client.clone(), cfg.resolve, tracked.clone()),
            tracker: Tracker::new(client, cfg.repository.clone(), tracked),
            cfg,
        })
    }

    pub fn config(&self) -> &RelayConfig {
        &self.cfg
    }

    /// Dispatch the configured workflow and resolve the run it started.
    pub async fn start(&self) -> Result<RunRecord, TriggerError> {
        let job = self.cfg.job_definition()?;
        let ack = self.dispatcher.dispatch(&job).await?;
        let run = self.resolver.resolve(&job, ack.request.issued_at).await?;
        Ok(run)
    }

    pub async fn status(&self, run_id: &RunId) -> Result<RunState, QueryError> {
        self.tracker.get_status(run_id).await
    }

    pub async fn cancel(&self, run_id: &RunId) -> Result<Cancelled, CancelError> {
        self.tracker.cancel(run_id).await
    }

    pub async fn last_tracked(&self) -> Option<RunId> {
        self.tracker.last_tracked().await
    }
}
