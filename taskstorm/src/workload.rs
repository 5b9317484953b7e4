//! Argument synthesis for the four workload kinds.
//!
//! Generators are plain functions of their inputs and a caller-provided RNG.
//! They never touch the subject; the [`crate::runner`] does that.

use std::{fmt, sync::Arc};

use chrono::{Days, NaiveDate};
use clap::ValueEnum;
use rand::{Rng, seq::SliceRandom};
use serde::{Deserialize, Serialize};

/// Words used to build task titles (drawn with replacement).
pub const TITLE_WORDS: &[&str] = &[
    "task", "item", "work", "project", "fix", "implement", "test", "review", "update", "create",
];
pub const SEARCH_TERMS: &[&str] = &["task", "work", "project", "test", "stress"];
pub const PRIORITIES: &[&str] = &["low", "medium", "high"];
pub const TAGS: &[&str] = &[
    "backend", "frontend", "urgent", "weekly", "bug", "docs", "ops", "research",
];
pub const PROJECTS: &[&str] = &["auth-system", "billing", "website", "mobile", "infra"];
pub const ASSIGNEES: &[&str] = &["john.doe", "jane.roe", "alex.kim", "sam.lee"];

/// Due dates are drawn from `today + 1 ..= today + DUE_WINDOW_DAYS`.
pub const DUE_WINDOW_DAYS: u64 = 30;
const MAX_TAGS: usize = 3;

/// Ordered arguments for one subject call, excluding the executable and the
/// structured-output flag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvocationSpec(Vec<String>);

impl InvocationSpec {
    pub fn new<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(args.into_iter().map(Into::into).collect())
    }

    pub fn args(&self) -> &[String] {
        &self.0
    }
}

impl fmt::Display for InvocationSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join(" "))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkloadKind {
    Create,
    Delete,
    List,
    Search,
}

impl fmt::Display for WorkloadKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WorkloadKind::Create => "create",
            WorkloadKind::Delete => "delete",
            WorkloadKind::List => "list",
            WorkloadKind::Search => "search",
        };
        f.write_str(name)
    }
}

/// Which optional `add` fields the create generator fills in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum FieldMode {
    /// Title only, every other field left to the subject's defaults.
    TitleOnly,
    /// Each optional field is included with probability 1/2.
    #[default]
    Random,
    /// Every optional field is provided.
    Full,
}

impl FieldMode {
    fn include(self, rng: &mut impl Rng) -> bool {
        match self {
            FieldMode::TitleOnly => false,
            FieldMode::Random => rng.gen_bool(0.5),
            FieldMode::Full => true,
        }
    }
}

/// Fields for one `add` call. `None` means the flag is not passed at all.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateFields {
    pub title: String,
    pub description: Option<String>,
    pub priority: Option<&'static str>,
    pub due_date: Option<NaiveDate>,
    pub tags: Option<Vec<&'static str>>,
    pub project: Option<&'static str>,
    pub assignee: Option<&'static str>,
}

impl CreateFields {
    pub fn generate(index: usize, mode: FieldMode, today: NaiveDate, rng: &mut impl Rng) -> Self {
        let title = format!("Stress test task {index}: {}", random_words(rng, 3..=8));
        let description = mode
            .include(rng)
            .then(|| format!("Generated for load run: {}", random_words(rng, 5..=12)));
        let priority = mode.include(rng).then(|| pick(PRIORITIES, rng));
        let due_date = mode.include(rng).then(|| {
            let ahead = rng.gen_range(1..=DUE_WINDOW_DAYS);
            today.checked_add_days(Days::new(ahead)).unwrap_or(today)
        });
        let tags = mode.include(rng).then(|| {
            let k = rng.gen_range(1..=MAX_TAGS);
            TAGS.choose_multiple(rng, k).copied().collect()
        });
        let project = mode.include(rng).then(|| pick(PROJECTS, rng));
        let assignee = mode.include(rng).then(|| pick(ASSIGNEES, rng));

        Self {
            title,
            description,
            priority,
            due_date,
            tags,
            project,
            assignee,
        }
    }

    pub fn into_spec(self) -> InvocationSpec {
        let mut args = vec!["add".to_string(), "-t".to_string(), self.title];
        if let Some(description) = self.description {
            args.extend(["-d".to_string(), description]);
        }
        if let Some(priority) = self.priority {
            args.extend(["-p".to_string(), priority.to_string()]);
        }
        if let Some(due) = self.due_date {
            args.extend(["--due-date".to_string(), due.format("%Y-%m-%d").to_string()]);
        }
        if let Some(tags) = self.tags {
            args.extend(["--tags".to_string(), tags.join(",")]);
        }
        if let Some(project) = self.project {
            args.extend(["--project".to_string(), project.to_string()]);
        }
        if let Some(assignee) = self.assignee {
            args.extend(["--assignee".to_string(), assignee.to_string()]);
        }
        InvocationSpec(args)
    }
}

/// Raised when a delete slot has no identifier to target.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("no identifier available for delete slot {index} ({available} targets)")]
pub struct MissingTarget {
    pub index: usize,
    pub available: usize,
}

/// A generator for one workload kind, plus whatever input it needs.
#[derive(Debug, Clone)]
pub enum Workload {
    Create { fields: FieldMode, today: NaiveDate },
    Delete { targets: Arc<[String]> },
    List,
    Search,
}

impl Workload {
    pub fn kind(&self) -> WorkloadKind {
        match self {
            Workload::Create { .. } => WorkloadKind::Create,
            Workload::Delete { .. } => WorkloadKind::Delete,
            Workload::List => WorkloadKind::List,
            Workload::Search => WorkloadKind::Search,
        }
    }

    /// Builds the arguments for call number `index` of a batch.
    pub fn invocation(&self, index: usize, rng: &mut impl Rng) -> Result<InvocationSpec, MissingTarget> {
        match self {
            Workload::Create { fields, today } => {
                Ok(CreateFields::generate(index, *fields, *today, rng).into_spec())
            }
            Workload::Delete { targets } => targets
                .get(index)
                .map(|uid| InvocationSpec::new(["delete", uid.as_str()]))
                .ok_or(MissingTarget {
                    index,
                    available: targets.len(),
                }),
            Workload::List => Ok(InvocationSpec::new(["list"])),
            Workload::Search => Ok(InvocationSpec::new(["search", pick(SEARCH_TERMS, rng)])),
        }
    }
}

fn pick(vocabulary: &'static [&'static str], rng: &mut impl Rng) -> &'static str {
    // vocabularies are non-empty constants
    vocabulary.choose(rng).copied().unwrap_or_default()
}

fn random_words(rng: &mut impl Rng, count: std::ops::RangeInclusive<usize>) -> String {
    let n = rng.gen_range(count);
    (0..n).map(|_| pick(TITLE_WORDS, rng)).collect::<Vec<_>>().join(" ")
}
