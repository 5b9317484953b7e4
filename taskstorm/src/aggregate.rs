use crate::{Metric, macros::aggregate, metric::InvocationOutcome};
use serde::{Serialize, de::DeserializeOwned};
use std::{fmt::Debug, time::Duration};

/// The `Aggregate` trait defines how [`Metric`] values are folded into a compact,
/// mergeable representation.
///
/// Aggregates hold raw counters and sums only. Derived figures such as success
/// percentages or mean latency belong in [`crate::report::StageSummary`].
///
/// # Implementor notes
/// - `merge` must be **associative** and **commutative**: worker-local
///   aggregates, or partial batches, may be combined in any order.
/// - `consume` is called once per outcome and must not depend on the order in
///   which outcomes arrive.
///
/// # Example
/// ```rust
/// use taskstorm::{Aggregate, macros::*};
///
/// #[metric]
/// struct Exit(i32);
///
/// #[aggregate]
/// struct NonZero {
///     count: u64,
/// }
///
/// impl Aggregate for NonZero {
///     type Metric = Exit;
///
///     fn new() -> Self {
///         Self::default()
///     }
///
///     fn consume(&mut self, metric: &Self::Metric) {
///         if metric.0 != 0 {
///             self.count += 1;
///         }
///     }
///
///     fn merge(&mut self, other: Self) {
///         self.count += other.count;
///     }
/// }
/// ```
pub trait Aggregate
where
    Self: Serialize + DeserializeOwned + PartialEq + Send + Sync + Debug + Clone,
{
    /// The metric type this aggregate summarizes.
    type Metric: Metric;

    /// Create a new, empty instance of the aggregate.
    fn new() -> Self;

    /// Aggregate multiple metrics into the current instance.
    fn aggregate(&mut self, metrics: &[Self::Metric]) {
        metrics.iter().for_each(|m| self.consume(m));
    }

    /// Incorporate a single metric into the aggregate.
    fn consume(&mut self, metric: &Self::Metric);

    /// Combine two different aggregates into one.
    fn merge(&mut self, other: Self);
}

/// Counters over a batch of [`InvocationOutcome`]s.
///
/// Tracks how many invocations were attempted, how many succeeded, how many hit
/// the timeout, plus the sum and maximum of per-invocation latency.
#[aggregate]
pub struct OutcomeAggregate {
    pub attempted: usize,
    pub succeeded: usize,
    pub timed_out: usize,
    pub total_latency: Duration,
    pub max_latency: Duration,
}

impl Aggregate for OutcomeAggregate {
    type Metric = InvocationOutcome;

    fn new() -> Self {
        OutcomeAggregate::default()
    }

    fn consume(&mut self, metric: &Self::Metric) {
        self.attempted += 1;
        self.succeeded += usize::from(metric.success);
        self.timed_out += usize::from(metric.is_timeout());
        self.total_latency += metric.elapsed;
        self.max_latency = self.max_latency.max(metric.elapsed);
    }

    fn merge(&mut self, other: Self) {
        self.attempted += other.attempted;
        self.succeeded += other.succeeded;
        self.timed_out += other.timed_out;
        self.total_latency += other.total_latency;
        self.max_latency = self.max_latency.max(other.max_latency);
    }
}
