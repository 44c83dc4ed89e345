mod capture;
mod config;
mod context;
mod docker;
mod engine;
mod evaluator;
mod executor;
mod readiness;
mod runner;

#[cfg(test)]
mod fakes;

use anyhow::{Context, Result};
use clap::Parser;
use config::{usage_exit_code, Cli, RunConfig};
use context::{FileSink, LogSink, RunContext};
use dit_common::plan;
use dit_common::types::RunOutcome;
use docker::DockerEngine;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return ExitCode::from(usage_exit_code(&e));
        }
    };
    let config = RunConfig::from_cli(cli);
    let sink: Arc<dyn LogSink> = Arc::new(FileSink::new(config.run_log()));

    info!(
        execution_id = %config.execution_id,
        results_dir = %config.results_dir.display(),
        "Docker Image Tester starting"
    );

    match run(&config, Arc::clone(&sink)).await {
        Ok(outcome) => ExitCode::from(outcome.exit_code()),
        Err(e) => {
            error!(error = %format!("{:#}", e), "Run aborted");
            sink.append(&format!("Run aborted: {:#}", e));
            eprintln!("{:#}", e);
            println!("[FAILURE]");
            sink.append("[FAILURE]");
            ExitCode::from(1)
        }
    }
}

/// Load the plan, connect to Docker and execute every suite
async fn run(config: &RunConfig, sink: Arc<dyn LogSink>) -> Result<RunOutcome> {
    sink.append(&format!("Loading {}", config.plan_file.display()));
    let plan = plan::load_plan(&config.plan_file)
        .with_context(|| format!("Failed to load test suite file {}", config.plan_file.display()))?;

    sink.append(&format!(
        "Creating docker client with docker api url {}",
        config.docker_api_url
    ));
    let engine = DockerEngine::connect(&config.docker_api_url)?;

    let ctx = RunContext::new(Arc::new(engine), sink, config.results_dir.clone());
    Ok(executor::run_plan(&ctx, &plan).await)
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    // Console lines own stdout; diagnostics go to stderr
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_line_number(true)
        .with_writer(std::io::stderr);

    if std::env::var("DIT_LOG_FORMAT").is_ok_and(|f| f.eq_ignore_ascii_case("json")) {
        builder.json().init();
    } else {
        builder.init();
    }
}
