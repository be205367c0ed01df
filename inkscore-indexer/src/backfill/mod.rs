//! Historical backfill orchestration.
//!
//! The [`Orchestrator`] runs a bounded worker pool over the ingestor,
//! feeding it from the periodic contract scan and the operator job queue.

mod orchestrator;

pub use orchestrator::Orchestrator;
