use crate::engine::github::GitHubClient;
use crate::error::{ConfigError, DispatchError};
use crate::model::{DispatchRequest, JobDefinition};
use reqwest::{Method, StatusCode};
use std::sync::Arc;
use time::OffsetDateTime;

/// The platform acknowledged the dispatch. It carries no run id.
#[derive(Debug, Clone)]
pub struct Acknowledged {
    pub request: DispatchRequest,
}

pub struct Dispatcher {
    client: Arc<GitHubClient>,
}

impl Dispatcher {
    pub(crate) fn new(client: Arc<GitHubClient>) -> Self {
        Self { client }
    }

    /// Ask the platform to start `job`. Exactly one remote call; only `204 No Content`
    /// counts as accepted.
    pub async fn dispatch(&self, job: &JobDefinition) -> Result<Acknowledged, DispatchError> {
        let token = self.client.credential()?;
        if job.ref_name.trim().is_empty() {
            return Err(ConfigError::EmptyRef.into());
        }
        let url = self.client.endpoint(
            &job.repository,
            &["actions", "workflows", &job.workflow, "dispatches"],
        )?;

        let mut body = serde_json::json!({ "ref": job.ref_name });
        if !job.inputs.is_empty() {
            body["inputs"] = serde_json::json!(job.inputs);
        }

        let issued_at = OffsetDateTime::now_utc();
        let exchange = self
            .client
            .send(token, Method::POST, url, Some(&body))
            .await?;

        if exchange.status != StatusCode::NO_CONTENT {
            tracing::warn!(
                repository = %job.repository,
                workflow = %job.workflow,
                status = exchange.status.as_u16(),
                "workflow dispatch rejected"
            );
            return Err(DispatchError::Rejected {
                status: exchange.status.as_u16(),
                body: exchange.body,
            });
        }

        tracing::info!(
            repository = %job.repository,
            workflow = %job.workflow,
            ref_name = %job.ref_name,
            "workflow dispatch accepted"
        );
        Ok(Acknowledged {
            request: DispatchRequest {
                job: job.clone(),
                issued_at,
            },
        })
    }
}
