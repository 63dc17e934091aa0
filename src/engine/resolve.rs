//! Finding the run a dispatch produced.
//!
//! GitHub's dispatch endpoint returns no run id and there is no correlation token,
//! so the match is a heuristic: the newest `workflow_dispatch` run on the requested
//! ref. Two dispatches of the same workflow and ref racing each other can both land
//! on the same run, or on each other's. That is a platform limitation and is not
//! papered over here.

use crate::engine::github::GitHubClient;
use crate::engine::tracker::TrackedRun;
use crate::error::{QueryError, ResolveError};
use crate::model::{
    Conclusion, JobDefinition, ResolvePolicy, RunId, RunRecord, RunStatus, TriggerEvent,
};
use reqwest::{Method, StatusCode};
use serde::Deserialize;
use std::sync::Arc;
use time::OffsetDateTime;

const RUNS_PER_PAGE: &str = "30";
/// Matches older than the dispatch by more than this are reported as possibly stale.
const STALE_MATCH_TOLERANCE: time::Duration = time::Duration::seconds(60);

#[derive(Debug, Deserialize)]
struct RunList {
    #[serde(default)]
    workflow_runs: Vec<ListedRun>,
}

#[derive(Debug, Deserialize)]
struct ListedRun {
    id: RunId,
    event: String,
    #[serde(default)]
    head_branch: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    created_at: OffsetDateTime,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    conclusion: Option<String>,
}

impl From<ListedRun> for RunRecord {
    fn from(run: ListedRun) -> Self {
        RunRecord {
            run_id: run.id,
            trigger_event: TriggerEvent::from(run.event),
            ref_name: run.head_branch.unwrap_or_default(),
            created_at: run.created_at,
            status: run
                .status
                .map(RunStatus::from)
                .unwrap_or(RunStatus::Unknown),
            conclusion: run.conclusion.map(Conclusion::from),
        }
    }
}

/// Pick the run most likely produced by a dispatch against `ref_name`.
///
/// Keeps only manual-dispatch runs on that ref, then takes the newest by
/// `created_at`, breaking ties with [`RunId::tie_break_key`].
pub fn select_run<'a>(runs: &'a [RunRecord], ref_name: &str) -> Option<&'a RunRecord> {
    runs.iter()
        .filter(|r| r.trigger_event == TriggerEvent::ManualDispatch && r.ref_name == ref_name)
        .max_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.run_id.tie_break_key().cmp(&b.run_id.tie_break_key()))
        })
}

pub struct Resolver {
    client: Arc<GitHubClient>,
    policy: ResolvePolicy,
    tracked: Arc<TrackedRun>,
}

impl Resolver {
    pub(crate) fn new(
        client: Arc<GitHubClient>,
        policy: ResolvePolicy,
        tracked: Arc<TrackedRun>,
    ) -> Self {
        Self {
            client,
            policy,
            tracked,
        }
    }

    pub fn policy(&self) -> ResolvePolicy {
        self.policy
    }

    /// Poll the run listing until a run matching `job` shows up or the budget runs out.
    ///
    /// On success the run becomes the tracked "latest" run. Listing failures end the
    /// search immediately; only an empty match is retried.
    pub async fn resolve(
        &self,
        job: &JobDefinition,
        dispatched_at: OffsetDateTime,
    ) -> Result<RunRecord, ResolveError> {
        let attempts = self.policy.attempts.max(1);

        for attempt in 1..=attempts {
            let wait = if attempt == 1 {
                self.policy.initial_delay
            } else {
                self.policy.interval
            };
            if !wait.is_zero() {
                tokio::time::sleep(wait).await;
            }

            let runs = self.list_runs(job).await?;
            let Some(run) = select_run(&runs, &job.ref_name) else {
                tracing::debug!(
                    attempt,
                    attempts,
                    listed = runs.len(),
                    ref_name = %job.ref_name,
                    "no matching run yet"
                );
                continue;
            };

            if run.created_at < dispatched_at - STALE_MATCH_TOLERANCE {
                tracing::warn!(
                    run_id = %run.run_id,
                    created_at = %run.created_at,
                    dispatched_at = %dispatched_at,
                    "matched run predates the dispatch; it may belong to an earlier trigger"
                );
            }

            let run = run.clone();
            self.tracked.record(run.run_id.clone()).await;
            tracing::info!(run_id = %run.run_id, attempt, "resolved dispatched run");
            return Ok(run);
        }

        Err(ResolveError::NotFound {
            ref_name: job.ref_name.clone(),
            attempts,
        })
    }

    async fn list_runs(&self, job: &JobDefinition) -> Result<Vec<RunRecord>, QueryError> {
        let token = self.client.credential()?;
        let mut url = self
            .client
            .endpoint(&job.repository, &["actions", "runs"])?;
        url.query_pairs_mut()
            .append_pair("event", "workflow_dispatch")
            .append_pair("branch", &job.ref_name)
            .append_pair("per_page", RUNS_PER_PAGE);

        let exchange = self.client.send(token, Method::GET, url, None).await?;
        if exchange.status != StatusCode::OK {
            return Err(QueryError::Status {
                status: exchange.status.as_u16(),
                body: exchange.body,
            });
        }

        let list: RunList = serde_json::from_str(&exchange.body)?;
        Ok(list.workflow_runs.into_iter().map(RunRecord::from).collect())
    }
}
