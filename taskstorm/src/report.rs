use serde::{Deserialize, Serialize, de::DeserializeOwned};
use std::fmt::{self, Debug};
use std::future::Future;
use std::time::Duration;

use crate::{
    Aggregate, aggregate::OutcomeAggregate, error::Result, executor::BatchResult,
    workload::WorkloadKind,
};

/// A [`Report`] is the processed form of an [`Aggregate`]: ratios, means and
/// the other derived figures. Reports are pure data; printing them is the job
/// of a [`Reporter`].
pub trait Report<A>
where
    Self: Send + Sync + Debug + From<A> + Serialize + DeserializeOwned,
    A: Aggregate,
{
}

/// Per-stage figures. Derived once from a [`BatchResult`], never mutated.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StageSummary {
    pub attempted: usize,
    pub succeeded: usize,
    pub timed_out: usize,
    /// Wall-clock time of the whole batch.
    #[serde(with = "seconds")]
    pub duration: Duration,
    #[serde(with = "seconds")]
    pub mean_latency: Duration,
    #[serde(with = "seconds")]
    pub max_latency: Duration,
}

impl From<OutcomeAggregate> for StageSummary {
    fn from(agg: OutcomeAggregate) -> Self {
        let mean_latency = match u32::try_from(agg.attempted) {
            Ok(0) => Duration::ZERO,
            Ok(n) => agg.total_latency / n,
            Err(_) => agg.total_latency.div_f64(agg.attempted as f64),
        };
        Self {
            attempted: agg.attempted,
            succeeded: agg.succeeded,
            timed_out: agg.timed_out,
            duration: Duration::ZERO,
            mean_latency,
            max_latency: agg.max_latency,
        }
    }
}

impl Report<OutcomeAggregate> for StageSummary {}

impl StageSummary {
    /// Percentage of attempted invocations that succeeded; 0 for an empty stage.
    pub fn success_rate(&self) -> f64 {
        if self.attempted == 0 {
            0.0
        } else {
            self.succeeded as f64 / self.attempted as f64 * 100.0
        }
    }
}

/// Reduces a batch to its [`StageSummary`]. Outcome order is irrelevant.
pub fn summarize(batch: &BatchResult) -> StageSummary {
    let mut agg = OutcomeAggregate::new();
    agg.aggregate(&batch.outcomes);
    StageSummary {
        duration: batch.duration,
        ..StageSummary::from(agg)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageReport {
    pub stage: WorkloadKind,
    #[serde(flatten)]
    pub summary: StageSummary,
}

/// Everything printed at the end of a run, in stage order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub subject: String,
    pub stages: Vec<StageReport>,
}

impl RunReport {
    pub fn stage(&self, stage: WorkloadKind) -> Option<&StageSummary> {
        self.stages
            .iter()
            .find(|s| s.stage == stage)
            .map(|s| &s.summary)
    }
}

/// Human-readable rendering used by [`StdoutReporter`].
impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Stress Test Summary ===")?;
        writeln!(f, "Subject: {}", self.subject)?;
        for StageReport { stage, summary } in &self.stages {
            writeln!(
                f,
                "{:<7} {}/{} successful ({:.1}%) in {:.2}s [mean {:.1} ms, max {:.1} ms, {} timed out]",
                stage.to_string(),
                summary.succeeded,
                summary.attempted,
                summary.success_rate(),
                summary.duration.as_secs_f64(),
                summary.mean_latency.as_secs_f64() * 1000.0,
                summary.max_latency.as_secs_f64() * 1000.0,
                summary.timed_out,
            )?;
        }
        Ok(())
    }
}

/// A [`Reporter`] sends a finished [`RunReport`] somewhere.
pub trait Reporter {
    fn report(&self, report: &RunReport) -> impl Future<Output = Result<()>>;
}

/// Prints the text summary to stdout.
pub struct StdoutReporter;

impl Reporter for StdoutReporter {
    async fn report(&self, report: &RunReport) -> Result<()> {
        print!("{report}");
        Ok(())
    }
}

/// Prints the report as a single pretty JSON document to stdout.
pub struct JsonReporter;

impl Reporter for JsonReporter {
    async fn report(&self, report: &RunReport) -> Result<()> {
        let value = serde_json::to_string_pretty(report)?;
        println!("{value}");
        Ok(())
    }
}

/// Durations as fractional seconds.
mod seconds {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_f64(d.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(d)?;
        Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
    }
}
