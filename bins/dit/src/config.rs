// Command line and run configuration for the Docker Image Tester
use chrono::Local;
use clap::error::ErrorKind;
use clap::Parser;
use dit_common::artifacts;
use dit_common::config::{execution_id, DEFAULT_DOCKER_API_URL, DEFAULT_PLAN_FILE, RESULTS_ROOT};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "dit")]
#[command(version, about = "Docker Image Tester - run container test suites against a main container", long_about = None)]
pub struct Cli {
    /// Docker API url (unix://, tcp:// or http://)
    #[arg(long = "docker-api-url", env = "DIT_DOCKER_API_URL", default_value = DEFAULT_DOCKER_API_URL)]
    pub docker_api_url: String,

    /// Test suite file
    #[arg(long = "file", env = "DIT_FILE", default_value = DEFAULT_PLAN_FILE)]
    pub file: PathBuf,

    /// Directory under which each run writes its results directory
    #[arg(long = "results-root", env = "DIT_RESULTS_ROOT", default_value = RESULTS_ROOT)]
    pub results_root: PathBuf,
}

/// Process exit code after clap rejected or short-circuited the command line.
///
/// Help and version output are successful runs; every usage error is a
/// failed run like any other and exits 1 rather than clap's 2.
pub fn usage_exit_code(err: &clap::Error) -> u8 {
    match err.kind() {
        ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => 0,
        _ => 1,
    }
}

/// Fully resolved settings of one run
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub docker_api_url: String,
    pub plan_file: PathBuf,
    pub execution_id: String,
    pub results_dir: PathBuf,
}

impl RunConfig {
    pub fn from_cli(cli: Cli) -> Self {
        let execution_id = execution_id(&Local::now());
        let results_dir = artifacts::results_dir(&cli.results_root, &execution_id);
        Self {
            docker_api_url: cli.docker_api_url,
            plan_file: cli.file,
            execution_id,
            results_dir,
        }
    }

    pub fn run_log(&self) -> PathBuf {
        artifacts::run_log_path(&self.results_dir)
    }
}
