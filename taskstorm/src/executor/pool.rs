use std::{
    panic::AssertUnwindSafe,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use futures::{FutureExt, future::join_all};
use rand::{SeedableRng, rngs::StdRng};
use tokio::{sync::watch, task::JoinHandle, time::Instant};
use typed_builder::TypedBuilder;

use super::{BatchResult, Executor};
use crate::{
    error::Error,
    metric::InvocationOutcome,
    runner::Invoker,
    scenario::Scenario,
    workload::{InvocationSpec, Workload},
};
use internals::*;

/// Error text for slots whose invocation panicked, or whose worker task died
/// before reporting them.
pub const WORKER_ABORTED: &str = "worker aborted";

/// Bounded worker pool for a fixed burst of invocations.
///
/// - `min(concurrency, count)` worker tasks are spawned and held at a start
///   gate so the batch clock starts with every worker ready.
/// - Each worker claims the next slot index from a shared atomic counter,
///   builds that slot's arguments and awaits the invocation. It claims again
///   only after the invocation finished, so at most `concurrency` calls are in
///   flight.
/// - Workers keep their outcomes locally and hand them back when they run out
///   of slots; the executor concatenates them after joining every worker.
/// - A panicking invocation fails only its own slot. With a seed, each slot's
///   arguments are drawn from an RNG seeded by `seed + slot`.
#[derive(Debug, Clone, TypedBuilder)]
pub struct PoolExecutor {
    /// Maximum number of invocations in flight. 0 is treated as 1.
    #[builder(default = num_cpus::get())]
    pub concurrency: usize,
}

impl PoolExecutor {
    pub fn new(concurrency: usize) -> Self {
        Self { concurrency }
    }

    fn workers_for(&self, count: usize) -> usize {
        self.concurrency.max(1).min(count.max(1))
    }
}

impl Executor for PoolExecutor {
    type Error = Error;

    async fn exec<I: Invoker + 'static>(
        &self,
        scenario: &Scenario,
        invoker: Arc<I>,
    ) -> Result<BatchResult, Self::Error> {
        let count = scenario.count;
        let workers = self.workers_for(count);
        let (ctx, start_tx) = ExecutionContext::new(count);

        tracing::info!(
            "Running scenario {}: {count} {} invocations across {workers} workers",
            scenario.name,
            scenario.kind()
        );
        let handles = spawn_workers(
            ctx,
            workers,
            Arc::new(scenario.workload.clone()),
            invoker,
            scenario.seed,
        );

        let started = Instant::now();
        start_tx.send_replace(true);
        let results = join_all(handles).await;
        let duration = started.elapsed();

        let mut outcomes = Vec::with_capacity(count);
        for res in results {
            match res {
                Ok(mut local) => outcomes.append(&mut local),
                Err(e) => {
                    // its slots are back-filled below
                    tracing::error!("Worker panicked with error: {e}");
                }
            }
        }
        if outcomes.len() < count {
            let missing = count - outcomes.len();
            tracing::warn!("{missing} outcomes lost with aborted workers, recording as failures");
            outcomes.extend(
                std::iter::repeat_with(|| InvocationOutcome::failed(WORKER_ABORTED, Duration::ZERO))
                    .take(missing),
            );
        }

        tracing::info!(
            "Done running scenario {}: {} outcomes in {:.2}s",
            scenario.name,
            outcomes.len(),
            duration.as_secs_f64()
        );
        Ok(BatchResult {
            kind: scenario.kind(),
            outcomes,
            duration,
        })
    }
}

#[cfg(feature = "internals")]
pub use internals::*;

/// Internal components for the `PoolExecutor`.
mod internals {
    use super::*;

    /// Shared state for all workers of one batch.
    #[derive(Clone)]
    pub struct ExecutionContext {
        /// Flips to `true` once every worker has been spawned.
        pub start: watch::Receiver<bool>,
        /// Next unclaimed slot index.
        pub next_slot: Arc<AtomicUsize>,
        /// Number of slots in the batch.
        pub count: usize,
    }

    impl ExecutionContext {
        pub fn new(count: usize) -> (Self, watch::Sender<bool>) {
            let (tx, rx) = watch::channel(false);
            (
                Self {
                    start: rx,
                    next_slot: Arc::new(AtomicUsize::new(0)),
                    count,
                },
                tx,
            )
        }

        /// Claims the next slot, or `None` once all `count` are taken.
        pub fn claim(&self) -> Option<usize> {
            let slot = self.next_slot.fetch_add(1, Ordering::Relaxed);
            (slot < self.count).then_some(slot)
        }
    }

    /// Spawns `workers` Tokio tasks. Each waits for the start signal, then
    /// claims slots until none are left, returning its local outcomes.
    pub fn spawn_workers<I>(
        ctx: ExecutionContext,
        workers: usize,
        workload: Arc<Workload>,
        invoker: Arc<I>,
        seed: Option<u64>,
    ) -> Vec<JoinHandle<Vec<InvocationOutcome>>>
    where
        I: Invoker + 'static,
    {
        (0..workers)
            .map(|i| {
                let mut ctx = ctx.clone();
                let workload = workload.clone();
                let invoker = invoker.clone();
                tokio::spawn(async move {
                    let mut entropy = StdRng::from_entropy();
                    let mut outcomes = Vec::new();
                    tracing::debug!("Worker {i} spawned.");

                    if ctx.start.wait_for(|started| *started).await.is_err() {
                        tracing::debug!("Worker {i} lost the start signal.");
                        return outcomes;
                    }
                    tracing::debug!("Worker {i} started.");

                    while let Some(slot) = ctx.claim() {
                        let mut seeded;
                        let rng = match seed {
                            Some(seed) => {
                                seeded = StdRng::seed_from_u64(seed.wrapping_add(slot as u64));
                                &mut seeded
                            }
                            None => &mut entropy,
                        };
                        let outcome = match workload.invocation(slot, rng) {
                            Ok(spec) => invoke_guarded(invoker.as_ref(), spec, i).await,
                            Err(e) => {
                                tracing::warn!("Worker {i}: {e}");
                                InvocationOutcome::failed(e.to_string(), Duration::ZERO)
                            }
                        };
                        outcomes.push(outcome);
                    }

                    tracing::debug!("Worker {i} shutting down after {} calls.", outcomes.len());
                    outcomes
                })
            })
            .collect()
    }

    /// Runs one invocation, turning a panic into a failed outcome for that slot.
    pub async fn invoke_guarded<I: Invoker>(
        invoker: &I,
        spec: InvocationSpec,
        worker: usize,
    ) -> InvocationOutcome {
        let started = Instant::now();
        match AssertUnwindSafe(invoker.invoke(spec)).catch_unwind().await {
            Ok(outcome) => outcome,
            Err(_) => {
                tracing::error!("Worker {worker}: invocation panicked");
                InvocationOutcome::failed(WORKER_ABORTED, started.elapsed())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        Aggregate,
        aggregate::OutcomeAggregate,
        metric::Payload,
        workload::FieldMode,
    };
    use chrono::NaiveDate;
    use serde_json::json;
    use std::sync::Mutex;

    /// Succeeds after a short sleep and tracks how many calls overlap.
    #[derive(Default)]
    struct CountingInvoker {
        calls: AtomicUsize,
        in_flight: AtomicUsize,
        peak: AtomicUsize,
        seen: Mutex<Vec<InvocationSpec>>,
    }

    impl Invoker for CountingInvoker {
        async fn invoke(&self, spec: InvocationSpec) -> InvocationOutcome {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            self.seen.lock().unwrap().push(spec);

            tokio::time::sleep(Duration::from_millis(20)).await;

            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            InvocationOutcome::succeeded(
                Payload::Json(json!({ "uid": n.to_string() })),
                Duration::from_millis(20),
            )
        }
    }

    /// Fails every third call.
    #[derive(Default)]
    struct FlakyInvoker {
        calls: AtomicUsize,
    }

    impl Invoker for FlakyInvoker {
        async fn invoke(&self, _: InvocationSpec) -> InvocationOutcome {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n % 3 == 2 {
                InvocationOutcome::failed("exited with exit status: 1", Duration::from_millis(1))
            } else {
                InvocationOutcome::succeeded(Payload::Raw(String::new()), Duration::from_millis(1))
            }
        }
    }

    /// Panics on call number `panic_at` (0-based), succeeds otherwise.
    #[derive(Default)]
    struct PanickyInvoker {
        calls: AtomicUsize,
        panic_at: usize,
    }

    impl Invoker for PanickyInvoker {
        async fn invoke(&self, _: InvocationSpec) -> InvocationOutcome {
            if self.calls.fetch_add(1, Ordering::SeqCst) == self.panic_at {
                panic!("invoker blew up");
            }
            InvocationOutcome::succeeded(Payload::Raw(String::new()), Duration::ZERO)
        }
    }

    /// Records the arguments it was called with, sleeping a varying few
    /// milliseconds so workers claim slots in a different order each run.
    #[derive(Default)]
    struct JitteryInvoker {
        calls: AtomicUsize,
        seen: Mutex<Vec<Vec<String>>>,
    }

    impl Invoker for JitteryInvoker {
        async fn invoke(&self, spec: InvocationSpec) -> InvocationOutcome {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis((n * 7 % 11) as u64)).await;
            self.seen.lock().unwrap().push(spec.args().to_vec());
            InvocationOutcome::succeeded(Payload::Raw(String::new()), Duration::ZERO)
        }
    }

    fn scenario(workload: Workload, count: usize) -> Scenario {
        Scenario::builder()
            .name("test")
            .workload(workload)
            .count(count)
            .seed(Some(42))
            .build()
    }

    #[tokio::test]
    async fn spawn_expected_number_of_workers() {
        let n = 10;
        let (ctx, _) = ExecutionContext::new(0);
        let workers = spawn_workers(
            ctx,
            n,
            Arc::new(Workload::List),
            Arc::new(CountingInvoker::default()),
            None,
        );

        assert_eq!(workers.len(), n);
    }

    #[test]
    fn claims_stop_at_count() {
        let (ctx, _) = ExecutionContext::new(3);
        let claimed: Vec<_> = std::iter::from_fn(|| ctx.claim()).collect();
        assert_eq!(claimed, vec![0, 1, 2]);
        assert_eq!(ctx.claim(), None);
    }

    #[test]
    fn worker_count_is_bounded_by_count_and_at_least_one() {
        assert_eq!(PoolExecutor::new(10).workers_for(3), 3);
        assert_eq!(PoolExecutor::new(4).workers_for(100), 4);
        assert_eq!(PoolExecutor::new(0).workers_for(100), 1);
        assert_eq!(PoolExecutor::new(8).workers_for(0), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn every_slot_yields_one_outcome_within_the_bound() {
        let invoker = Arc::new(CountingInvoker::default());
        let batch = PoolExecutor::new(5)
            .exec(&scenario(Workload::List, 23), invoker.clone())
            .await
            .unwrap();

        assert_eq!(batch.outcomes.len(), 23);
        assert_eq!(invoker.calls.load(Ordering::SeqCst), 23);
        let peak = invoker.peak.load(Ordering::SeqCst);
        assert!(peak <= 5, "peak in-flight {peak} exceeds concurrency");
        assert!(peak >= 2, "pool never ran calls in parallel");
        assert_eq!(invoker.in_flight.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn failures_are_recorded_not_fatal() {
        let batch = PoolExecutor::new(5)
            .exec(&scenario(Workload::List, 10), Arc::new(FlakyInvoker::default()))
            .await
            .unwrap();

        let mut agg = OutcomeAggregate::new();
        agg.aggregate(&batch.outcomes);
        assert_eq!(agg.attempted, 10);
        assert_eq!(agg.succeeded, 7);
    }

    #[tokio::test]
    async fn empty_batch_runs_nothing() {
        let invoker = Arc::new(CountingInvoker::default());
        let batch = PoolExecutor::new(4)
            .exec(&scenario(Workload::Search, 0), invoker.clone())
            .await
            .unwrap();

        assert!(batch.outcomes.is_empty());
        assert_eq!(invoker.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn panicking_invocation_fails_only_its_slot() {
        let batch = PoolExecutor::new(2)
            .exec(&scenario(Workload::List, 6), Arc::new(PanickyInvoker::default()))
            .await
            .unwrap();

        assert_eq!(batch.outcomes.len(), 6);
        let aborted = batch
            .outcomes
            .iter()
            .filter(|o| !o.success && o.error_text == WORKER_ABORTED)
            .count();
        assert_eq!(aborted, 1);
        assert_eq!(batch.outcomes.iter().filter(|o| o.success).count(), 5);
    }

    #[tokio::test]
    async fn outcomes_before_a_panic_are_kept() {
        let invoker = Arc::new(PanickyInvoker {
            panic_at: 2,
            ..Default::default()
        });
        let batch = PoolExecutor::new(1)
            .exec(&scenario(Workload::List, 5), invoker.clone())
            .await
            .unwrap();

        let mut agg = OutcomeAggregate::new();
        agg.aggregate(&batch.outcomes);
        assert_eq!(agg.attempted, 5);
        assert_eq!(agg.succeeded, 4);
        assert_eq!(invoker.calls.load(Ordering::SeqCst), 5);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn same_seed_generates_same_invocations() {
        let workload = Workload::Create {
            fields: FieldMode::Random,
            today: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
        };
        let mut runs = Vec::new();
        for _ in 0..2 {
            let invoker = Arc::new(JitteryInvoker::default());
            PoolExecutor::new(5)
                .exec(&scenario(workload.clone(), 40), invoker.clone())
                .await
                .unwrap();
            let mut seen = invoker.seen.lock().unwrap().clone();
            seen.sort();
            runs.push(seen);
        }

        assert_eq!(runs[0].len(), 40);
        assert_eq!(runs[0], runs[1]);
    }

    #[tokio::test]
    async fn delete_slots_map_to_targets() {
        let invoker = Arc::new(CountingInvoker::default());
        let targets: Vec<String> = (0..4).map(|i| format!("uid{i}")).collect();
        let batch = PoolExecutor::new(3)
            .exec(&Scenario::delete("delete", targets.clone()), invoker.clone())
            .await
            .unwrap();

        assert_eq!(batch.outcomes.len(), 4);
        let mut deleted: Vec<String> = invoker
            .seen
            .lock()
            .unwrap()
            .iter()
            .map(|spec| spec.args()[1].clone())
            .collect();
        deleted.sort();
        assert_eq!(deleted, targets);
    }

    #[tokio::test]
    async fn oversized_delete_batch_fails_extra_slots() {
        let scenario = Scenario::builder()
            .name("delete")
            .workload(Workload::Delete {
                targets: vec!["only".to_string()].into(),
            })
            .count(3)
            .build();
        let batch = PoolExecutor::new(2)
            .exec(&scenario, Arc::new(CountingInvoker::default()))
            .await
            .unwrap();

        assert_eq!(batch.outcomes.len(), 3);
        assert_eq!(batch.outcomes.iter().filter(|o| o.success).count(), 1);
    }
}
