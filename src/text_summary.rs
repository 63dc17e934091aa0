//! Text summary builder for CLI output.
//!
//! Formats human-readable lines for the `trigger`, `status` and `cancel` commands.

use crate::engine::Cancelled;
use crate::model::{RunId, RunRecord, RunState};
use anyhow::Result;
use time::format_description::well_known::Rfc3339;

/// Pre-formatted lines for text output.
pub(crate) struct TextSummary {
    pub lines: Vec<String>,
}

pub(crate) fn build_run_summary(run: &RunRecord) -> Result<TextSummary> {
    let lines = vec![
        format!("Run ID: {}", run.run_id),
        format!("Ref: {}", run.ref_name),
        format!("Created: {}", run.created_at.format(&Rfc3339)?),
        format!("Status: {}", run.status.as_str()),
    ];
    Ok(TextSummary { lines })
}

pub(crate) fn build_state_summary(run_id: &RunId, state: &RunState) -> TextSummary {
    let mut line = format!("Run {run_id}: {}", state.status.as_str());
    if let Some(conclusion) = state.conclusion.as_ref() {
        line.push_str(&format!(" ({})", conclusion.as_str()));
    }
    let mut lines = vec![line];
    if let Some(details) = state.details.as_deref() {
        lines.push(format!("Details: {details}"));
    }
    TextSummary { lines }
}

pub(crate) fn build_cancel_summary(cancelled: &Cancelled) -> TextSummary {
    TextSummary {
        lines: vec![format!(
            "Cancellation requested for run {} (the run may take a moment to stop)",
            cancelled.run_id
        )],
    }
}
