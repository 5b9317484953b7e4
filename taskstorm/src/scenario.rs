use std::sync::Arc;

use typed_builder::TypedBuilder;

use crate::{
    executor::{BatchResult, Executor},
    runner::Invoker,
    workload::{Workload, WorkloadKind},
};

/// One batch of work: `count` invocations, each built by `workload`.
#[derive(Debug, Clone, TypedBuilder)]
pub struct Scenario {
    #[builder(setter(into))]
    pub name: String,
    pub workload: Workload,
    pub count: usize,
    /// Seeds one RNG per slot (`seed + slot`). `None` draws from OS entropy.
    #[builder(default)]
    pub seed: Option<u64>,
}

impl Scenario {
    /// A delete batch sized by its targets: one call per identifier.
    pub fn delete(name: impl Into<String>, targets: Vec<String>) -> Self {
        let count = targets.len();
        Self {
            name: name.into(),
            workload: Workload::Delete {
                targets: targets.into(),
            },
            count,
            seed: None,
        }
    }

    pub fn kind(&self) -> WorkloadKind {
        self.workload.kind()
    }

    pub async fn run<E, I>(&self, executor: &E, invoker: Arc<I>) -> Result<BatchResult, E::Error>
    where
        E: Executor,
        I: Invoker + 'static,
    {
        executor.exec(self, invoker).await
    }
}
