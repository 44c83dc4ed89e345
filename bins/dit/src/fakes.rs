//! In-memory fake container runtime (testing only)
//!
//! `FakeClient` records every call in order and lets tests script exit
//! codes, log output and failures per image or per container.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream::{self, BoxStream, StreamExt};

use crate::context::LogSink;
use crate::engine::{ContainerClient, ContainerHandle, ContainerSpec, EngineError, EngineResult};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Op {
    Create(String),
    Start(String),
    StreamLogs(String),
    FetchLogs(String),
    Wait(String),
    Remove(String),
}

#[derive(Debug, Default)]
struct Script {
    exit_codes: HashMap<String, i64>,
    never_exits: HashSet<String>,
    panics_on_wait: HashSet<String>,
    logs: HashMap<String, Vec<Vec<u8>>>,
    logs_never_end: HashSet<String>,
    fail_create: HashSet<String>,
    fail_start: HashSet<String>,
    fail_fetch_logs: HashSet<String>,
    fail_stream_logs: HashSet<String>,
    fail_remove: HashSet<String>,
}

#[derive(Debug, Default)]
pub struct FakeClient {
    ops: Mutex<Vec<Op>>,
    created: Mutex<Vec<(ContainerHandle, ContainerSpec)>>,
    script: Mutex<Script>,
    next_id: AtomicUsize,
}

impl FakeClient {
    pub fn new() -> Self {
        Self::default()
    }

    // --- scripting -------------------------------------------------------

    pub fn exit_code(&self, image: &str, code: i64) {
        self.script.lock().unwrap().exit_codes.insert(image.to_string(), code);
    }

    pub fn never_exits(&self, image: &str) {
        self.script.lock().unwrap().never_exits.insert(image.to_string());
    }

    /// `wait` on containers of `image` panics, as a bug in the engine would
    pub fn panic_on_wait(&self, image: &str) {
        self.script.lock().unwrap().panics_on_wait.insert(image.to_string());
    }

    pub fn logs(&self, image: &str, chunks: &[&str]) {
        self.script.lock().unwrap().logs.insert(
            image.to_string(),
            chunks.iter().map(|c| c.as_bytes().to_vec()).collect(),
        );
    }

    /// Streaming logs of `image` hang after the scripted chunks
    pub fn logs_never_end(&self, image: &str) {
        self.script.lock().unwrap().logs_never_end.insert(image.to_string());
    }

    pub fn fail_create(&self, image: &str) {
        self.script.lock().unwrap().fail_create.insert(image.to_string());
    }

    pub fn fail_start(&self, image: &str) {
        self.script.lock().unwrap().fail_start.insert(image.to_string());
    }

    pub fn fail_fetch_logs(&self, image: &str) {
        self.script.lock().unwrap().fail_fetch_logs.insert(image.to_string());
    }

    pub fn fail_stream_logs(&self, image: &str) {
        self.script.lock().unwrap().fail_stream_logs.insert(image.to_string());
    }

    pub fn fail_remove(&self, handle: &ContainerHandle) {
        self.script.lock().unwrap().fail_remove.insert(handle.id().to_string());
    }

    // --- inspection ------------------------------------------------------

    pub fn ops(&self) -> Vec<Op> {
        self.ops.lock().unwrap().clone()
    }

    pub fn created(&self) -> Vec<(ContainerHandle, ContainerSpec)> {
        self.created.lock().unwrap().clone()
    }

    pub fn created_from(&self, image: &str) -> Vec<ContainerHandle> {
        self.created()
            .into_iter()
            .filter(|(_, spec)| spec.image == image)
            .map(|(handle, _)| handle)
            .collect()
    }

    pub fn removals_of(&self, handle: &ContainerHandle) -> usize {
        self.ops()
            .iter()
            .filter(|op| **op == Op::Remove(handle.id().to_string()))
            .count()
    }

    /// Position of the first occurrence of `op` in the call log
    pub fn position(&self, op: &Op) -> Option<usize> {
        self.ops().iter().position(|o| o == op)
    }

    fn record(&self, op: Op) {
        self.ops.lock().unwrap().push(op);
    }

    fn spec_of(&self, handle: &ContainerHandle) -> ContainerSpec {
        self.created()
            .into_iter()
            .find(|(h, _)| h == handle)
            .map(|(_, spec)| spec)
            .unwrap_or_default()
    }

    /// Exit code from the command when it is one of the classic shell probes,
    /// otherwise from the per-image script (default 0)
    fn exit_code_for(&self, spec: &ContainerSpec) -> i64 {
        match spec.cmd.as_deref() {
            Some([first, ..]) if first == "true" => 0,
            Some([first, ..]) if first == "false" => 1,
            Some([first, code, ..]) if first == "exit" => code.parse().unwrap_or(1),
            _ => self
                .script
                .lock()
                .unwrap()
                .exit_codes
                .get(&spec.image)
                .copied()
                .unwrap_or(0),
        }
    }
}

#[async_trait]
impl ContainerClient for FakeClient {
    async fn create(&self, spec: &ContainerSpec) -> EngineResult<ContainerHandle> {
        self.record(Op::Create(spec.image.clone()));
        if self.script.lock().unwrap().fail_create.contains(&spec.image) {
            return Err(EngineError::Create {
                image: spec.image.clone(),
                reason: "no such image".to_string(),
            });
        }

        let n = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let handle = ContainerHandle::new(format!("c{}", n));
        self.created.lock().unwrap().push((handle.clone(), spec.clone()));
        Ok(handle)
    }

    async fn start(&self, handle: &ContainerHandle) -> EngineResult<()> {
        self.record(Op::Start(handle.id().to_string()));
        let spec = self.spec_of(handle);
        if self.script.lock().unwrap().fail_start.contains(&spec.image) {
            return Err(EngineError::Start {
                id: handle.id().to_string(),
                reason: "port is already allocated".to_string(),
            });
        }
        Ok(())
    }

    fn stream_logs(&self, handle: &ContainerHandle) -> BoxStream<'static, EngineResult<Vec<u8>>> {
        self.record(Op::StreamLogs(handle.id().to_string()));
        let spec = self.spec_of(handle);
        let script = self.script.lock().unwrap();

        if script.fail_stream_logs.contains(&spec.image) {
            let err = EngineError::Logs {
                id: handle.id().to_string(),
                reason: "connection reset".to_string(),
            };
            return stream::iter(vec![Err(err)]).boxed();
        }

        let chunks = script.logs.get(&spec.image).cloned().unwrap_or_default();
        let scripted = stream::iter(chunks.into_iter().map(Ok));
        if script.logs_never_end.contains(&spec.image) {
            scripted.chain(stream::pending()).boxed()
        } else {
            scripted.boxed()
        }
    }

    async fn fetch_logs(&self, handle: &ContainerHandle) -> EngineResult<Vec<u8>> {
        self.record(Op::FetchLogs(handle.id().to_string()));
        let spec = self.spec_of(handle);
        let script = self.script.lock().unwrap();
        if script.fail_fetch_logs.contains(&spec.image) {
            return Err(EngineError::Logs {
                id: handle.id().to_string(),
                reason: "daemon unavailable".to_string(),
            });
        }
        Ok(script
            .logs
            .get(&spec.image)
            .map(|chunks| chunks.concat())
            .unwrap_or_default())
    }

    async fn wait(&self, handle: &ContainerHandle, timeout: Duration) -> EngineResult<i64> {
        self.record(Op::Wait(handle.id().to_string()));
        let spec = self.spec_of(handle);
        let (hangs, panics) = {
            let script = self.script.lock().unwrap();
            (
                script.never_exits.contains(&spec.image),
                script.panics_on_wait.contains(&spec.image),
            )
        };
        if panics {
            panic!("wait on container {} blew up", handle);
        }
        if hangs {
            tokio::time::sleep(timeout).await;
            return Err(EngineError::Timeout {
                id: handle.id().to_string(),
                after: timeout,
            });
        }
        Ok(self.exit_code_for(&spec))
    }

    async fn remove(&self, handle: &ContainerHandle) -> EngineResult<()> {
        self.record(Op::Remove(handle.id().to_string()));
        if self.script.lock().unwrap().fail_remove.contains(handle.id()) {
            return Err(EngineError::Remove {
                id: handle.id().to_string(),
                reason: "removal already in progress".to_string(),
            });
        }
        Ok(())
    }
}

/// Log sink keeping every line in memory
#[derive(Debug, Default)]
pub struct MemorySink {
    lines: Mutex<Vec<String>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().unwrap().clone()
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.lines().iter().any(|l| l.contains(needle))
    }
}

impl LogSink for MemorySink {
    fn append(&self, line: &str) {
        self.lines.lock().unwrap().push(line.to_string());
    }
}
