// Run context threaded through run, suite and test execution
use crate::engine::ContainerClient;
use dit_common::config::default_test_timeout;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, warn};

/// Destination of the run log: one line per internal log message
pub trait LogSink: Send + Sync {
    fn append(&self, line: &str);
}

/// Appends log lines to a file, creating it and its directory on first write.
///
/// Write failures are reported through `tracing` and otherwise ignored.
pub struct FileSink {
    path: PathBuf,
    file: Mutex<Option<File>>,
}

impl FileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            file: Mutex::new(None),
        }
    }

    fn open(&self) -> std::io::Result<File> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        OpenOptions::new().create(true).append(true).open(&self.path)
    }
}

impl LogSink for FileSink {
    fn append(&self, line: &str) {
        let mut guard = match self.file.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        if guard.is_none() {
            match self.open() {
                Ok(file) => *guard = Some(file),
                Err(e) => {
                    warn!(path = %self.path.display(), error = %e, "Failed to open run log");
                    return;
                }
            }
        }

        if let Some(file) = guard.as_mut() {
            if let Err(e) = writeln!(file, "{}", line) {
                warn!(path = %self.path.display(), error = %e, "Failed to append to run log");
            }
        }
    }
}

/// Everything a run needs besides the plan itself
#[derive(Clone)]
pub struct RunContext {
    client: Arc<dyn ContainerClient>,
    sink: Arc<dyn LogSink>,
    results_dir: PathBuf,
    default_timeout: Duration,
}

impl RunContext {
    pub fn new(
        client: Arc<dyn ContainerClient>,
        sink: Arc<dyn LogSink>,
        results_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            client,
            sink,
            results_dir: results_dir.into(),
            default_timeout: default_test_timeout(),
        }
    }

    pub fn client(&self) -> Arc<dyn ContainerClient> {
        Arc::clone(&self.client)
    }

    pub fn results_dir(&self) -> &Path {
        &self.results_dir
    }

    pub fn default_timeout(&self) -> Duration {
        self.default_timeout
    }

    /// Internal log line: run log only
    pub fn log(&self, msg: &str) {
        debug!("{}", msg);
        self.sink.append(msg);
    }

    /// Failure worth surfacing in the process log as well as the run log
    pub fn warn(&self, msg: &str) {
        warn!("{}", msg);
        self.sink.append(msg);
    }

    /// User-facing line: stdout and run log
    pub fn console(&self, msg: &str) {
        println!("{}", msg);
        self.sink.append(msg);
    }
}
