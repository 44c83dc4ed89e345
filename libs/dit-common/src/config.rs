// Run-wide defaults shared by the CLI and the execution engine
use chrono::{DateTime, TimeZone};
use std::time::Duration;

/// Plan file read when `--file` is not given
pub const DEFAULT_PLAN_FILE: &str = "dit.yml";

/// Docker Engine endpoint used when `--docker-api-url` is not given
pub const DEFAULT_DOCKER_API_URL: &str = "unix:///var/run/docker.sock";

/// Root directory under which every run gets its own results directory
pub const RESULTS_ROOT: &str = "dit";

/// Upper bound on a test container's run time when the test sets no `timeout_s`
pub const DEFAULT_TEST_TIMEOUT_SECS: u64 = 60;

/// Hostname under which test containers reach the suite's main container
pub const MAIN_ALIAS: &str = "main";

pub fn default_test_timeout() -> Duration {
    Duration::from_secs(DEFAULT_TEST_TIMEOUT_SECS)
}

/// Execution id for a run, derived from its start time.
///
/// Second resolution, so two runs started within the same second share a
/// results directory.
pub fn execution_id<Tz>(started_at: &DateTime<Tz>) -> String
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    started_at.format("%Y-%m-%d_%H-%M-%S").to_string()
}
