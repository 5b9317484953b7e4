//! Stage sequencing: create → delete → list → search.

use std::{io, path::PathBuf, sync::Arc};

use chrono::{Local, NaiveDate};
use typed_builder::TypedBuilder;

use crate::{
    correlate::{DEFAULT_ID_FIELD, extract_identifiers},
    error::{Error, Result},
    executor::{BatchResult, Executor, PoolExecutor},
    report::{RunReport, StageReport, summarize},
    runner::Invoker,
    scenario::Scenario,
    workload::{FieldMode, Workload},
};

/// Sizes and knobs for one full run.
#[derive(Debug, Clone, TypedBuilder)]
pub struct StressPlan {
    #[builder(default = 100)]
    pub create_count: usize,
    #[builder(default = 50)]
    pub list_count: usize,
    #[builder(default = 50)]
    pub search_count: usize,
    /// JSON field of an `add` response holding the new entity's identifier.
    #[builder(default = DEFAULT_ID_FIELD.to_string(), setter(into))]
    pub id_field: String,
    #[builder(default)]
    pub fields: FieldMode,
    #[builder(default)]
    pub seed: Option<u64>,
    /// Files removed before and after the run, e.g. the subject's database.
    #[builder(default)]
    pub cleanup: Vec<PathBuf>,
    /// Anchor for generated due dates.
    #[builder(default = Local::now().date_naive())]
    pub today: NaiveDate,
}

/// Runs a [`StressPlan`] against one subject and collects the stage summaries.
pub struct Orchestrator<I, E = PoolExecutor> {
    plan: StressPlan,
    executor: E,
    invoker: Arc<I>,
    subject: String,
}

impl<I, E> Orchestrator<I, E>
where
    I: Invoker + 'static,
    E: Executor<Error = Error>,
{
    pub fn new(plan: StressPlan, executor: E, invoker: Arc<I>, subject: impl Into<String>) -> Self {
        Self {
            plan,
            executor,
            invoker,
            subject: subject.into(),
        }
    }

    /// Runs every stage in order. Only the subject preflight can fail the run;
    /// invocation failures show up in the returned report.
    pub async fn run(&self) -> Result<RunReport> {
        self.invoker.preflight()?;
        self.cleanup();

        let create = Workload::Create {
            fields: self.plan.fields,
            today: self.plan.today,
        };
        let created = self.stage(create, self.plan.create_count).await?;

        // The delete stage is sized by what the create stage actually produced.
        let identifiers = extract_identifiers(&created, &self.plan.id_field);
        tracing::info!(
            "Correlated {} identifiers from {} create outcomes",
            identifiers.len(),
            created.outcomes.len()
        );
        let delete = Scenario {
            seed: self.plan.seed,
            ..Scenario::delete("delete", identifiers)
        };
        let deleted = self.execute(&delete).await?;

        let listed = self.stage(Workload::List, self.plan.list_count).await?;
        let searched = self.stage(Workload::Search, self.plan.search_count).await?;

        self.cleanup();

        let stages = [created, deleted, listed, searched]
            .iter()
            .map(|batch| StageReport {
                stage: batch.kind,
                summary: summarize(batch),
            })
            .collect();
        Ok(RunReport {
            subject: self.subject.clone(),
            stages,
        })
    }

    async fn stage(&self, workload: Workload, count: usize) -> Result<BatchResult> {
        let scenario = Scenario::builder()
            .name(workload.kind().to_string())
            .workload(workload)
            .count(count)
            .seed(self.plan.seed)
            .build();
        self.execute(&scenario).await
    }

    async fn execute(&self, scenario: &Scenario) -> Result<BatchResult> {
        let batch = scenario.run(&self.executor, self.invoker.clone()).await?;
        let summary = summarize(&batch);
        tracing::info!(
            stage = %batch.kind,
            attempted = summary.attempted,
            succeeded = summary.succeeded,
            "stage finished in {:.2}s",
            summary.duration.as_secs_f64()
        );
        Ok(batch)
    }

    fn cleanup(&self) {
        for path in &self.plan.cleanup {
            match std::fs::remove_file(path) {
                Ok(()) => tracing::info!("Cleaned up {}", path.display()),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => tracing::warn!("Could not remove {}: {e}", path.display()),
            }
        }
    }
}
