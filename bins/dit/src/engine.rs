/// Container Engine - Abstraction over the container runtime
///
/// **Core Responsibility:**
/// Create, start, observe and remove containers on behalf of the orchestrator.
///
/// **Critical Architectural Boundary:**
/// - Engine knows HOW to talk to the container runtime (Docker API, fakes)
/// - Engine does NOT know about suites, tests or pass/fail rules
/// - Engine returns raw exit codes and log bytes for the orchestrator to judge
///
/// Production uses `DockerEngine` (docker.rs); tests use an in-memory fake.

use async_trait::async_trait;
use futures_util::stream::BoxStream;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("failed to create container from image '{image}': {reason}")]
    Create { image: String, reason: String },

    #[error("failed to start container {id}: {reason}")]
    Start { id: String, reason: String },

    #[error("container {id} still running after {after:?}")]
    Timeout { id: String, after: Duration },

    #[error("failed waiting for container {id}: {reason}")]
    Wait { id: String, reason: String },

    #[error("failed to read logs of container {id}: {reason}")]
    Logs { id: String, reason: String },

    #[error("failed to remove container {id}: {reason}")]
    Remove { id: String, reason: String },
}

pub type EngineResult<T> = Result<T, EngineError>;

/// Identity of a container created through a `ContainerClient`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContainerHandle {
    id: String,
}

impl ContainerHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }

    pub fn id(&self) -> &str {
        &self.id
    }
}

impl std::fmt::Display for ContainerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.id)
    }
}

/// What to create: image, environment, command and links
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContainerSpec {
    pub image: String,
    /// `KEY=value` pairs
    pub env: Vec<String>,
    /// `None` keeps the image's default command
    pub cmd: Option<Vec<String>>,
    /// `container:alias` pairs
    pub links: Vec<String>,
}

impl ContainerSpec {
    pub fn new(image: impl Into<String>) -> Self {
        Self {
            image: image.into(),
            ..Default::default()
        }
    }

    pub fn with_env(mut self, env: Vec<String>) -> Self {
        self.env = env;
        self
    }

    pub fn with_cmd(mut self, cmd: Option<Vec<String>>) -> Self {
        self.cmd = cmd;
        self
    }

    /// Make `target` reachable from the new container under hostname `alias`
    pub fn linked_to(mut self, target: &ContainerHandle, alias: &str) -> Self {
        self.links.push(format!("{}:{}", target.id(), alias));
        self
    }
}

/// Capability set the orchestrator needs from a container runtime.
///
/// Links are part of `ContainerSpec` rather than `start`, since the Docker
/// Engine API only accepts them at creation time.
#[async_trait]
pub trait ContainerClient: Send + Sync {
    async fn create(&self, spec: &ContainerSpec) -> EngineResult<ContainerHandle>;

    async fn start(&self, handle: &ContainerHandle) -> EngineResult<()>;

    /// Follow the container's combined stdout/stderr as raw chunks.
    /// Ends when the container stops producing output for good.
    fn stream_logs(&self, handle: &ContainerHandle) -> BoxStream<'static, EngineResult<Vec<u8>>>;

    /// Everything the container has written so far
    async fn fetch_logs(&self, handle: &ContainerHandle) -> EngineResult<Vec<u8>>;

    /// Exit code of the container, or `EngineError::Timeout` if it is still
    /// running after `timeout`
    async fn wait(&self, handle: &ContainerHandle, timeout: Duration) -> EngineResult<i64>;

    /// Force-remove the container, killing it if needed
    async fn remove(&self, handle: &ContainerHandle) -> EngineResult<()>;
}

/// Container cleanup guard - owns a created container until it is removed.
///
/// The orchestrator removes the container explicitly through
/// [`ContainerGuard::remove`] once its logs are captured. If the guard is
/// dropped before that (panic or cancelled future), `Drop` schedules a forced
/// removal instead, so the container is removed exactly once either way.
pub struct ContainerGuard {
    client: Arc<dyn ContainerClient>,
    handle: Option<ContainerHandle>,
}

impl ContainerGuard {
    pub fn new(client: Arc<dyn ContainerClient>, handle: ContainerHandle) -> Self {
        Self {
            client,
            handle: Some(handle),
        }
    }

    pub fn handle(&self) -> &ContainerHandle {
        // Only `remove` takes the handle out, and it consumes the guard
        self.handle
            .as_ref()
            .unwrap_or_else(|| unreachable!("container guard used after removal"))
    }

    pub fn client(&self) -> &dyn ContainerClient {
        self.client.as_ref()
    }

    /// Remove the container now, disarming the drop fallback
    pub async fn remove(mut self) -> EngineResult<ContainerHandle> {
        let handle = match self.handle.take() {
            Some(handle) => handle,
            None => unreachable!("container guard removed twice"),
        };
        self.client.remove(&handle).await?;
        Ok(handle)
    }
}

impl Drop for ContainerGuard {
    fn drop(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };

        // Cannot be async in Drop; hand the removal to the runtime if there is one
        let client = Arc::clone(&self.client);
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                warn!(container_id = %handle, "Container abandoned before teardown, force-removing");
                runtime.spawn(async move {
                    if let Err(e) = client.remove(&handle).await {
                        warn!(container_id = %handle, error = %e, "Failed to cleanup container");
                    }
                });
            }
            Err(_) => {
                warn!(container_id = %handle, "Container abandoned outside a runtime, leaking it");
            }
        }
    }
}
