use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use taskstorm::{
    Orchestrator, PoolExecutor, Reporter,
    cli::{Cli, ReportFormat},
    report::{JsonReporter, StdoutReporter},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    cli.init_logging();

    let runner = cli.runner();
    let subject = runner.program.display().to_string();
    tracing::info!(
        "Stressing {subject} with {} workers ({} creates, {} lists, {} searches)",
        cli.concurrency,
        cli.creates,
        cli.lists,
        cli.searches
    );

    let orchestrator = Orchestrator::new(
        cli.plan(),
        PoolExecutor::new(cli.concurrency),
        Arc::new(runner),
        subject,
    );
    let report = orchestrator.run().await.context("stress run aborted")?;

    match cli.format {
        ReportFormat::Text => StdoutReporter.report(&report).await?,
        ReportFormat::Json => JsonReporter.report(&report).await?,
    }
    Ok(())
}
