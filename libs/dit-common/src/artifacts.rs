use std::path::{Path, PathBuf};

/// Artifact naming - defines only naming, not persistence.
/// Ensures artifact names are deterministic from the suite index, the test
/// index and the container id, and unique within a run.

pub const RUN_LOG_FILE: &str = "dit.log";
pub const ARTIFACT_EXTENSION: &str = "log";

/// Directory holding every artifact of one run
pub fn results_dir(root: &Path, execution_id: &str) -> PathBuf {
    root.join(execution_id)
}

/// Artifact name for a suite's main container
pub fn suite_artifact(suite_index: usize, container_id: &str) -> String {
    format!("suite_{}_{}", suite_index, container_id)
}

/// Artifact name for a test container
pub fn test_artifact(suite_index: usize, test_index: usize, container_id: &str) -> String {
    format!("suite_{}_test_{}_{}", suite_index, test_index, container_id)
}

/// File an artifact is persisted to inside the results directory
pub fn artifact_path(results_dir: &Path, artifact: &str) -> PathBuf {
    results_dir.join(format!("{}.{}", artifact, ARTIFACT_EXTENSION))
}

/// Append-only log of every internal log line of the run
pub fn run_log_path(results_dir: &Path) -> PathBuf {
    results_dir.join(RUN_LOG_FILE)
}
