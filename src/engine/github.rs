use crate::error::ConfigError;
use crate::model::RelayConfig;
use anyhow::{Context, Result};
use reqwest::header::ACCEPT;
use reqwest::{Method, StatusCode, Url};
use std::time::Duration;

const GITHUB_JSON: &str = "application/vnd.github+json";
const API_VERSION: &str = "2022-11-28";

/// Raw outcome of one platform call; interpretation is left to the caller.
#[derive(Debug)]
pub(crate) struct Exchange {
    pub status: StatusCode,
    pub body: String,
}

/// Thin GitHub REST transport shared by the dispatcher, resolver and tracker.
pub(crate) struct GitHubClient {
    pub http: reqwest::Client,
    base_url: Url,
    token: Option<String>,
}

impl GitHubClient {
    pub fn new(cfg: &RelayConfig) -> Result<Self> {
        let base_url = Url::parse(&cfg.api_base_url)
            .with_context(|| format!("invalid API base URL {:?}", cfg.api_base_url))?;
        if base_url.cannot_be_a_base() {
            anyhow::bail!("API base URL {:?} cannot carry a path", cfg.api_base_url);
        }

        let http = reqwest::Client::builder()
            .user_agent(cfg.user_agent.clone())
            .timeout(cfg.request_timeout)
            .connect_timeout(cfg.request_timeout.min(Duration::from_secs(10)))
            .build()
            .context("failed to build HTTP client")?;

        Ok(Self {
            http,
            base_url,
            token: cfg.token.clone().filter(|t| !t.trim().is_empty()),
        })
    }

    /// The bearer credential, or a config error so callers can fail before any I/O.
    pub fn credential(&self) -> Result<&str, ConfigError> {
        self.token.as_deref().ok_or(ConfigError::MissingToken)
    }

    /// `{base}/repos/{owner}/{name}/{tail...}` with each segment percent-encoded.
    pub fn endpoint(&self, repository: &str, tail: &[&str]) -> Result<Url, ConfigError> {
        let (owner, name) = split_repository(repository)?;
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ConfigError::InvalidApiUrl)?
            .pop_if_empty()
            .extend(["repos", owner, name])
            .extend(tail.iter().copied());
        Ok(url)
    }

    pub async fn send(
        &self,
        token: &str,
        method: Method,
        url: Url,
        body: Option<&serde_json::Value>,
    ) -> Result<Exchange, reqwest::Error> {
        let mut req = self
            .http
            .request(method, url)
            .bearer_auth(token)
            .header(ACCEPT, GITHUB_JSON)
            .header("X-GitHub-Api-Version", API_VERSION);
        if let Some(body) = body {
            req = req.json(body);
        }

        let resp = req.send().await?;
        let status = resp.status();
        let body = resp.text().await?;
        Ok(Exchange { status, body })
    }
}

fn split_repository(repository: &str) -> Result<(&str, &str), ConfigError> {
    match repository.split_once('/') {
        Some((owner, name)) if !owner.is_empty() && !name.is_empty() && !name.contains('/') => {
            Ok((owner, name))
        }
        _ => Err(ConfigError::InvalidRepository(repository.to_string())),
    }
}
