use crate::engine::RunCorrelator;
use crate::model::{RelayConfig, ResolvePolicy, RunId, DEFAULT_API_BASE_URL, DEFAULT_REF};
use crate::text_summary::{self, TextSummary};
use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Parser, Clone)]
#[command(
    name = "workflow-relay",
    version,
    about = "Trigger GitHub Actions workflows over HTTP and track the runs they start"
)]
pub struct Cli {
    /// Repository that owns the workflow, in owner/name form
    #[arg(long, env = "GITHUB_REPO", global = true)]
    pub repo: Option<String>,

    /// Workflow file name or numeric id
    #[arg(long, env = "GITHUB_WORKFLOW", global = true)]
    pub workflow: Option<String>,

    /// Branch or tag the workflow runs against
    #[arg(long = "ref", env = "GITHUB_BRANCH", default_value = DEFAULT_REF, global = true)]
    pub ref_name: String,

    /// Bearer token for the GitHub API
    #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true, global = true)]
    pub token: Option<String>,

    /// GitHub REST API base URL
    #[arg(long, env = "GITHUB_API_URL", default_value = DEFAULT_API_BASE_URL, global = true)]
    pub api_base_url: String,

    /// Timeout for each call to the GitHub API
    #[arg(long, env = "RELAY_REQUEST_TIMEOUT", default_value = "15s", global = true)]
    pub request_timeout: humantime::Duration,

    /// Wait after a dispatch before the first run listing
    #[arg(long, env = "RELAY_RESOLVE_DELAY", default_value = "3s", global = true)]
    pub resolve_delay: humantime::Duration,

    /// Wait between run listings while no match is visible
    #[arg(long, env = "RELAY_RESOLVE_INTERVAL", default_value = "2s", global = true)]
    pub resolve_interval: humantime::Duration,

    /// Run listings to try before giving up on a dispatch
    #[arg(long, env = "RELAY_RESOLVE_ATTEMPTS", default_value_t = 5, global = true)]
    pub resolve_attempts: u32,

    /// Workflow input sent with each dispatch (repeatable)
    #[arg(long = "input", value_name = "KEY=VALUE", value_parser = parse_input, global = true)]
    pub inputs: Vec<(String, String)>,

    /// Address the relay listens on
    #[arg(long, env = "RELAY_HOST", default_value = "0.0.0.0", global = true)]
    pub host: IpAddr,

    /// Port the relay listens on
    #[arg(long, env = "PORT", default_value_t = 10000, global = true)]
    pub port: u16,

    /// Print command results as JSON
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Serve the HTTP relay (default)
    Serve,
    /// Dispatch the workflow once and print the run it started
    Trigger,
    /// Print the status of a run
    Status(StatusArgs),
    /// Request cancellation of a run
    Cancel(CancelArgs),
}

#[derive(Debug, Args, Clone)]
pub struct StatusArgs {
    pub run_id: String,

    /// Keep polling until the run completes
    #[arg(long)]
    pub follow: bool,

    /// Poll interval used with --follow
    #[arg(long, default_value = "5s")]
    pub poll_interval: humantime::Duration,
}

#[derive(Debug, Args, Clone)]
pub struct CancelArgs {
    pub run_id: String,
}

fn parse_input(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("expected KEY=VALUE, got {raw:?}")),
    }
}

/// Build a `RelayConfig` from CLI arguments.
pub fn build_config(args: &Cli) -> RelayConfig {
    RelayConfig {
        api_base_url: args.api_base_url.clone(),
        token: args.token.clone(),
        repository: args.repo.clone(),
        workflow: args.workflow.clone(),
        ref_name: args.ref_name.trim().to_string(),
        inputs: args.inputs.iter().cloned().collect(),
        request_timeout: Duration::from(args.request_timeout),
        resolve: ResolvePolicy {
            initial_delay: Duration::from(args.resolve_delay),
            interval: Duration::from(args.resolve_interval),
            attempts: args.resolve_attempts.max(1),
        },
        ..RelayConfig::default()
    }
}

pub async fn run(args: Cli) -> Result<()> {
    let correlator = Arc::new(RunCorrelator::new(build_config(&args))?);

    match args.command.clone().unwrap_or(Command::Serve) {
        Command::Serve => {
            let addr = SocketAddr::new(args.host, args.port);
            crate::server::serve(correlator, addr).await
        }
        Command::Trigger => {
            let run = correlator
                .start()
                .await
                .context("failed to trigger workflow")?;
            print_result(&args, &run, || text_summary::build_run_summary(&run))
        }
        Command::Status(status) => run_status(&args, &correlator, status).await,
        Command::Cancel(cancel) => {
            let cancelled = correlator
                .cancel(&RunId::from(cancel.run_id))
                .await
                .context("failed to cancel run")?;
            let body = serde_json::json!({ "status": "cancelled", "run_id": cancelled.run_id });
            print_result(&args, &body, || {
                Ok(text_summary::build_cancel_summary(&cancelled))
            })
        }
    }
}

async fn run_status(args: &Cli, correlator: &RunCorrelator, status: StatusArgs) -> Result<()> {
    let run_id = RunId::from(status.run_id);
    let poll_interval = Duration::from(status.poll_interval);
    let mut last = None;

    loop {
        let state = correlator
            .status(&run_id)
            .await
            .context("failed to look up run status")?;

        if last.as_ref() != Some(&state) {
            print_result(args, &state, || {
                Ok(text_summary::build_state_summary(&run_id, &state))
            })?;
        }
        if !status.follow || state.is_terminal() {
            return Ok(());
        }
        last = Some(state);
        tokio::time::sleep(poll_interval).await;
    }
}

/// Print `value` as JSON under `--json`, otherwise the text summary lines.
fn print_result<T, F>(args: &Cli, value: &T, text: F) -> Result<()>
where
    T: Serialize,
    F: FnOnce() -> Result<TextSummary>,
{
    if args.json {
        println!("{}", serde_json::to_string_pretty(value)?);
    } else {
        for line in text()?.lines {
            println!("{line}");
        }
    }
    Ok(())
}
