//! Taskstorm — a concurrent load generator for command-line applications that
//! speak line-oriented JSON.
//!
//! Taskstorm fires fixed bursts of subject invocations through a bounded worker
//! pool, enforces a per-call timeout, parses each call's JSON output and reduces
//! every batch to success and latency figures. Stages can depend on each other:
//! the identifiers returned by the create stage size and drive the delete stage.
//!
//! # Architecture
//!
//! - [`workload`]: generators that build the arguments of one call (`add`,
//!   `delete`, `list`, `search`).
//! - [`Invoker`]: performs one call. [`ProcessRunner`] spawns the subject as a
//!   child process and kills it when the timeout elapses.
//! - [`Scenario`]: a workload and the number of calls to make.
//! - [`Executor`]: runs a scenario. [`PoolExecutor`] bounds the calls in flight
//!   and returns a [`BatchResult`](executor::BatchResult) holding every outcome.
//! - [`Metric`] / [`Aggregate`]: one [`InvocationOutcome`] per call, folded into
//!   mergeable counters.
//! - [`correlate`]: pulls created identifiers out of a create batch.
//! - [`report`]: per-stage [`StageSummary`](report::StageSummary) and the
//!   [`Reporter`]s that print a finished run.
//! - [`Orchestrator`]: create → delete → list → search, then one report.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use taskstorm::{
//!     Orchestrator, PoolExecutor, ProcessRunner, Reporter, StressPlan,
//!     report::StdoutReporter,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), taskstorm::Error> {
//!     let runner = ProcessRunner::builder().program("./Task").build();
//!     let plan = StressPlan::builder().create_count(20).build();
//!     let report = Orchestrator::new(plan, PoolExecutor::new(10), Arc::new(runner), "./Task")
//!         .run()
//!         .await?;
//!     StdoutReporter.report(&report).await
//! }
//! ```
//!
//! # Feature flags
//! - `internals`: expose the pool executor's execution context and worker
//!   spawning.

extern crate self as taskstorm;

/// Outcome aggregation
pub mod aggregate;
/// Command line surface of the `taskstorm` binary
pub mod cli;
/// Identifier extraction between stages
pub mod correlate;
pub mod error;
/// Batch scheduling
pub mod executor;
/// Per-invocation metrics
pub mod metric;
/// Stage sequencing
pub mod orchestrator;
/// Summaries and Reporters
pub mod report;
/// Subject invocation
pub mod runner;
pub mod scenario;
/// Argument generators
pub mod workload;

pub use aggregate::Aggregate;
pub use error::{Error, Result};
pub use executor::{Executor, PoolExecutor};
pub use metric::{InvocationOutcome, Metric};
pub use orchestrator::{Orchestrator, StressPlan};
pub use report::{Report, Reporter};
pub use runner::{Invoker, ProcessRunner};
pub use scenario::Scenario;

/// Attribute macros for metrics and aggregates
pub mod macros {
    pub use taskstorm_macros::*;
}
