//! litgraph research CLI
//!
//! Runs one research query and prints the report. Progress goes to stderr
//! so stdout carries only the report.

use anyhow::Context;
use litgraph_common::config::{AppConfig, ObservabilityConfig};
use litgraph_research::{ChannelSink, ResearchWorkflow, RunStatus};
use std::process::ExitCode;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let config = AppConfig::load().context("Failed to load configuration")?;
    init_tracing(&config.observability);

    let query = std::env::args().skip(1).collect::<Vec<_>>().join(" ");
    if query.trim().is_empty() {
        eprintln!("usage: research <query...>");
        return Ok(ExitCode::FAILURE);
    }

    info!("Starting litgraph research v{}", litgraph_common::VERSION);
    let workflow = ResearchWorkflow::from_config(&config)
        .await
        .context("Failed to initialise research workflow")?;

    let (sink, mut progress) = ChannelSink::new();
    let printer = tokio::spawn(async move {
        while let Some(status) = progress.recv().await {
            eprintln!("{}", status);
        }
    });

    let outcome = workflow.execute(query.trim(), Some(&sink)).await;
    drop(sink);
    printer.await.ok();

    println!("{}", outcome.report);

    Ok(match outcome.status {
        RunStatus::Failed => ExitCode::FAILURE,
        RunStatus::Completed | RunStatus::NoSeeds | RunStatus::NoPapers => ExitCode::SUCCESS,
    })
}

/// Logs go to stderr, leaving stdout to the report
fn init_tracing(config: &ObservabilityConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr);

    if config.json_logging {
        builder.json().init();
    } else {
        builder.init();
    }
}
