//! Relay that starts GitHub Actions workflows on request and tracks the runs they produce.
//!
//! The dispatch endpoint returns no run id, so [`engine::Resolver`] infers the run by
//! polling the run listing. See [`engine::select_run`] for the matching heuristic.

pub mod cli;
pub mod engine;
pub mod error;
pub mod model;
pub mod server;
mod text_summary;
