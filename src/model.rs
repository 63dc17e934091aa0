use crate::error::{ConfigError, InvalidRunId};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;
use time::OffsetDateTime;

pub const DEFAULT_API_BASE_URL: &str = "https://api.github.com";
pub const DEFAULT_REF: &str = "master";

/// Settings shared by every relay operation.
///
/// Missing identifiers are kept as `None` rather than rejected at startup; each
/// operation that needs one fails with a [`ConfigError`] before touching the network.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub api_base_url: String,
    pub token: Option<String>,
    pub repository: Option<String>,
    pub workflow: Option<String>,
    pub ref_name: String,
    pub inputs: BTreeMap<String, String>,
    pub request_timeout: Duration,
    pub user_agent: String,
    pub resolve: ResolvePolicy,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            token: None,
            repository: None,
            workflow: None,
            ref_name: DEFAULT_REF.to_string(),
            inputs: BTreeMap::new(),
            request_timeout: Duration::from_secs(15),
            user_agent: format!("workflow-relay/{}", env!("CARGO_PKG_VERSION")),
            resolve: ResolvePolicy::default(),
        }
    }
}

impl RelayConfig {
    pub fn repository(&self) -> Result<&str, ConfigError> {
        non_empty(self.repository.as_deref()).ok_or(ConfigError::MissingRepository)
    }

    /// Build the job definition for `/run_scraper` and `trigger`.
    pub fn job_definition(&self) -> Result<JobDefinition, ConfigError> {
        let repository = self.repository()?.to_string();
        let workflow = non_empty(self.workflow.as_deref())
            .ok_or(ConfigError::MissingWorkflow)?
            .to_string();
        let ref_name = self.ref_name.trim();
        if ref_name.is_empty() {
            return Err(ConfigError::EmptyRef);
        }
        Ok(JobDefinition {
            repository,
            workflow,
            ref_name: ref_name.to_string(),
            inputs: self.inputs.clone(),
        })
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

/// Bounded retry budget for finding the run a dispatch produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvePolicy {
    /// Wait before the first listing query.
    pub initial_delay: Duration,
    /// Wait between subsequent listing queries.
    pub interval: Duration,
    /// Listing queries made before giving up. Values below 1 are treated as 1.
    pub attempts: u32,
}

impl Default for ResolvePolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(3),
            interval: Duration::from_secs(2),
            attempts: 5,
        }
    }
}

/// Which workflow to run, where, and against which ref.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobDefinition {
    /// `owner/name`
    pub repository: String,
    /// Workflow file name or numeric id.
    pub workflow: String,
    #[serde(rename = "ref")]
    pub ref_name: String,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub inputs: BTreeMap<String, String>,
}

/// One start attempt; lives only for a single dispatch + resolve chain.
#[derive(Debug, Clone)]
pub struct DispatchRequest {
    pub job: JobDefinition,
    pub issued_at: OffsetDateTime,
}

/// Opaque run identifier. The platform sends numbers, but nothing here relies on that.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct RunId(String);

impl RunId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The id as one URL path segment. Empty, `.` and `..` would be dropped or
    /// resolved away when joined into a path, so they are refused.
    pub fn as_path_segment(&self) -> Result<&str, InvalidRunId> {
        match self.0.as_str() {
            "" | "." | ".." => Err(InvalidRunId(self.0.clone())),
            id => Ok(id),
        }
    }

    /// Ordering key used to break `created_at` ties: shorter ids sort first so that
    /// numeric ids compare numerically, equal lengths compare lexicographically.
    pub(crate) fn tie_break_key(&self) -> (usize, &str) {
        (self.0.len(), self.0.as_str())
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for RunId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for RunId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl<'de> Deserialize<'de> for RunId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Number(u64),
            Text(String),
        }

        Ok(match Raw::deserialize(deserializer)? {
            Raw::Number(n) => RunId(n.to_string()),
            Raw::Text(s) => RunId(s),
        })
    }
}

/// What started a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TriggerEvent {
    ManualDispatch,
    Other(String),
}

impl From<String> for TriggerEvent {
    fn from(value: String) -> Self {
        match value.as_str() {
            "workflow_dispatch" => TriggerEvent::ManualDispatch,
            _ => TriggerEvent::Other(value),
        }
    }
}

impl From<TriggerEvent> for String {
    fn from(value: TriggerEvent) -> Self {
        match value {
            TriggerEvent::ManualDispatch => "workflow_dispatch".to_string(),
            TriggerEvent::Other(s) => s,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum RunStatus {
    Queued,
    InProgress,
    Completed,
    /// The relay could not fetch the run; never sent by the platform itself.
    Unknown,
    Other(String),
}

impl RunStatus {
    pub fn as_str(&self) -> &str {
        match self {
            RunStatus::Queued => "queued",
            RunStatus::InProgress => "in_progress",
            RunStatus::Completed => "completed",
            RunStatus::Unknown => "unknown",
            RunStatus::Other(s) => s,
        }
    }
}

impl From<String> for RunStatus {
    fn from(value: String) -> Self {
        match value.as_str() {
            "queued" => RunStatus::Queued,
            "in_progress" => RunStatus::InProgress,
            "completed" => RunStatus::Completed,
            "unknown" => RunStatus::Unknown,
            _ => RunStatus::Other(value),
        }
    }
}

impl From<RunStatus> for String {
    fn from(value: RunStatus) -> Self {
        match value {
            RunStatus::Other(s) => s,
            other => other.as_str().to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Conclusion {
    Success,
    Failure,
    Cancelled,
    Other(String),
}

impl Conclusion {
    pub fn as_str(&self) -> &str {
        match self {
            Conclusion::Success => "success",
            Conclusion::Failure => "failure",
            Conclusion::Cancelled => "cancelled",
            Conclusion::Other(s) => s,
        }
    }
}

impl From<String> for Conclusion {
    fn from(value: String) -> Self {
        match value.as_str() {
            "success" => Conclusion::Success,
            "failure" => Conclusion::Failure,
            "cancelled" => Conclusion::Cancelled,
            _ => Conclusion::Other(value),
        }
    }
}

impl From<Conclusion> for String {
    fn from(value: Conclusion) -> Self {
        match value {
            Conclusion::Other(s) => s,
            other => other.as_str().to_string(),
        }
    }
}

/// A snapshot of one run as returned by the listing endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunRecord {
    pub run_id: RunId,
    pub trigger_event: TriggerEvent,
    #[serde(rename = "ref")]
    pub ref_name: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    pub status: RunStatus,
    pub conclusion: Option<Conclusion>,
}

/// Lifecycle state reported by `/status/{run_id}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunState {
    pub status: RunStatus,
    /// Only set once `status` is `completed`.
    pub conclusion: Option<Conclusion>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl RunState {
    pub fn new(status: RunStatus, conclusion: Option<Conclusion>) -> Self {
        let conclusion = if status == RunStatus::Completed {
            conclusion
        } else {
            None
        };
        Self {
            status,
            conclusion,
            details: None,
        }
    }

    /// Soft-failure result for a lookup that could not reach a verdict.
    pub fn unknown(details: impl Into<String>) -> Self {
        Self {
            status: RunStatus::Unknown,
            conclusion: None,
            details: Some(details.into()),
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status == RunStatus::Completed
    }
}
