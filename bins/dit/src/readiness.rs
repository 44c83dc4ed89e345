/// Readiness Gate - holds the suite back until its main container is usable
///
/// **Policy (in this order):**
/// 1. `ready_message` set: follow the container's log output line by line
///    until a line contains the marker (literal, case-sensitive substring).
///    No timeout: a marker that never shows up blocks for good.
/// 2. `wait_s` set: sleep that long. With a `ready_message` also set, the
///    sleep only happens when the log stream ended without the marker.
/// 3. Neither: ready immediately.

use crate::context::RunContext;
use crate::engine::{ContainerClient, ContainerHandle, EngineResult};
use dit_common::plan::SuiteSpec;
use futures_util::stream::StreamExt;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    /// A log line contained the ready message
    MarkerSeen,
    /// Fixed delay elapsed
    Waited(Duration),
    /// Log stream ended without the marker and no fallback delay was set
    StreamEnded,
    /// No gating configured
    Immediate,
}

/// Block until the started main container is deemed ready.
///
/// Only a failure to read the container's logs is an error.
pub async fn await_ready(
    ctx: &RunContext,
    client: &dyn ContainerClient,
    main: &ContainerHandle,
    suite: &SuiteSpec,
) -> EngineResult<Readiness> {
    let wait = suite.wait_duration();

    if let Some(marker) = suite.ready_message.as_deref() {
        ctx.log(&format!("waiting for ready message {}", marker));
        if wait_for_marker(client, main, marker).await? {
            ctx.log(&format!("ready message seen in container {}", main));
            return Ok(Readiness::MarkerSeen);
        }
        ctx.warn(&format!(
            "log stream of container {} ended without ready message '{}'",
            main, marker
        ));
        if wait.is_none() {
            return Ok(Readiness::StreamEnded);
        }
    }

    match wait {
        Some(delay) => {
            ctx.log(&format!("waiting for {} seconds", delay.as_secs_f64()));
            tokio::time::sleep(delay).await;
            Ok(Readiness::Waited(delay))
        }
        None => Ok(Readiness::Immediate),
    }
}

/// Follow the logs until a line contains `marker`.
/// Returns `false` when the stream ends first.
async fn wait_for_marker(
    client: &dyn ContainerClient,
    handle: &ContainerHandle,
    marker: &str,
) -> EngineResult<bool> {
    let mut stream = client.stream_logs(handle);
    let mut lines = LineBuffer::default();

    while let Some(chunk) = stream.next().await {
        if lines.push(&chunk?, marker) {
            return Ok(true);
        }
    }

    Ok(false)
}

/// Reassembles lines from arbitrarily split log chunks
#[derive(Debug, Default)]
struct LineBuffer {
    partial: Vec<u8>,
}

impl LineBuffer {
    /// Feed a chunk; true as soon as a complete or pending line holds `marker`
    fn push(&mut self, chunk: &[u8], marker: &str) -> bool {
        self.partial.extend_from_slice(chunk);

        while let Some(end) = self.partial.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.partial.drain(..=end).collect();
            if line_contains(&line, marker) {
                return true;
            }
        }

        // A line still being written already counts once it holds the marker
        line_contains(&self.partial, marker)
    }
}

fn line_contains(line: &[u8], marker: &str) -> bool {
    String::from_utf8_lossy(line).contains(marker)
}
