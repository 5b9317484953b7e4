//! Executor — scheduling of a [`Scenario`]'s invocations.
//!
//! The `Executor` trait is the runtime hook that turns a scenario into a
//! [`BatchResult`]. The built-in [`PoolExecutor`] runs a fixed burst of
//! `count` invocations over a bounded pool of worker tasks.
//!
//! A batch always runs to completion: every scheduled invocation yields exactly
//! one [`InvocationOutcome`], whether the subject succeeded, failed, timed out,
//! or the worker carrying it died.
pub mod pool;
pub use pool::PoolExecutor;

use std::{future::Future, sync::Arc, time::Duration};

use serde::{Deserialize, Serialize};

use crate::{
    metric::InvocationOutcome, runner::Invoker, scenario::Scenario, workload::WorkloadKind,
};

/// Every outcome of one scenario run and the wall-clock time it took.
///
/// Outcomes are in completion order, which is unrelated to slot order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchResult {
    pub kind: WorkloadKind,
    pub outcomes: Vec<InvocationOutcome>,
    /// From first dispatch to last completion, queuing included.
    pub duration: Duration,
}

/// The runtime hook that executes a `Scenario` against an [`Invoker`].
pub trait Executor
where
    Self: Send + Sync + Sized,
{
    type Error;

    /// Execute every invocation of `scenario` and return once all have an
    /// outcome. Individual failures never abort the batch.
    fn exec<I>(
        &self,
        scenario: &Scenario,
        invoker: Arc<I>,
    ) -> impl Future<Output = Result<BatchResult, Self::Error>> + Send
    where
        I: Invoker + 'static;
}
