use std::{path::PathBuf, time::Duration};

use clap::{ArgAction, Parser, ValueEnum};
use tracing_subscriber::EnvFilter;

use crate::{
    correlate::DEFAULT_ID_FIELD,
    orchestrator::StressPlan,
    runner::{DEFAULT_STRUCTURED_FLAG, ProcessRunner},
    workload::FieldMode,
};

/// How the final report is printed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum ReportFormat {
    #[default]
    Text,
    Json,
}

/// Fire concurrent bursts of create, delete, list and search calls at a task
/// CLI and report per-stage success rates.
#[derive(Debug, Parser)]
#[command(name = "taskstorm", version, about)]
pub struct Cli {
    /// Subject executable (path, or name looked up on PATH)
    #[arg(short, long, env = "TASKSTORM_SUBJECT", default_value = "../binaries/task-linux-x64/Task")]
    pub subject: PathBuf,

    /// Database file handed to the subject as `--db <file>`
    #[arg(long)]
    pub db: Option<PathBuf>,

    /// Extra argument placed before the subcommand (repeatable)
    #[arg(long = "prefix-arg", value_name = "ARG", allow_hyphen_values = true)]
    pub prefix_args: Vec<String>,

    /// Flag asking the subject for JSON output
    #[arg(long, default_value = DEFAULT_STRUCTURED_FLAG, allow_hyphen_values = true)]
    pub json_flag: String,

    /// Per-invocation timeout in seconds
    #[arg(long, default_value_t = 30)]
    pub timeout_secs: u64,

    /// Maximum invocations in flight
    #[arg(short = 'j', long, default_value_t = 10)]
    pub concurrency: usize,

    /// Number of create calls
    #[arg(long, default_value_t = 100)]
    pub creates: usize,

    /// Number of list calls
    #[arg(long, default_value_t = 50)]
    pub lists: usize,

    /// Number of search calls
    #[arg(long, default_value_t = 50)]
    pub searches: usize,

    /// JSON field holding the identifier in `add` output
    #[arg(long, default_value = DEFAULT_ID_FIELD)]
    pub id_field: String,

    /// Which optional `add` fields to generate
    #[arg(long, value_enum, default_value_t = FieldMode::Random)]
    pub fields: FieldMode,

    /// Seed for reproducible generated arguments
    #[arg(long)]
    pub seed: Option<u64>,

    /// File removed before and after the run (repeatable)
    #[arg(long, default_value = "tasks.db")]
    pub cleanup: Vec<PathBuf>,

    /// Report format
    #[arg(long, value_enum, default_value_t = ReportFormat::Text)]
    pub format: ReportFormat,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,

    /// Only log errors
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,
}

impl Cli {
    pub fn runner(&self) -> ProcessRunner {
        let mut prefix_args = Vec::new();
        if let Some(db) = &self.db {
            prefix_args.push("--db".to_string());
            prefix_args.push(db.display().to_string());
        }
        prefix_args.extend(self.prefix_args.iter().cloned());

        ProcessRunner::builder()
            .program(self.subject.clone())
            .prefix_args(prefix_args)
            .structured_flag(self.json_flag.clone())
            .timeout(Duration::from_secs(self.timeout_secs))
            .build()
    }

    pub fn plan(&self) -> StressPlan {
        let mut cleanup = self.cleanup.clone();
        if let Some(db) = &self.db {
            if !cleanup.contains(db) {
                cleanup.push(db.clone());
            }
        }

        StressPlan::builder()
            .create_count(self.creates)
            .list_count(self.lists)
            .search_count(self.searches)
            .id_field(self.id_field.clone())
            .fields(self.fields)
            .seed(self.seed)
            .cleanup(cleanup)
            .build()
    }

    fn log_directive(&self) -> &'static str {
        if self.quiet {
            return "error";
        }
        match self.verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    }

    /// Installs the global subscriber. `RUST_LOG` wins over `-v`/`-q`.
    /// Logs go to stderr; stdout carries only the report.
    pub fn init_logging(&self) {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(self.log_directive()));
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(false)
            .init();
    }
}
