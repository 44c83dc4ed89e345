// Docker container management using Bollard
use crate::engine::{ContainerClient, ContainerHandle, ContainerSpec, EngineError, EngineResult};
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use bollard::container::{
    Config, CreateContainerOptions, LogsOptions, RemoveContainerOptions, StartContainerOptions,
    WaitContainerOptions,
};
use bollard::errors::Error as DockerError;
use bollard::image::CreateImageOptions;
use bollard::{Docker, API_DEFAULT_VERSION};
use futures_util::stream::{BoxStream, StreamExt};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Request timeout handed to bollard. Log follows and waits are bounded by
/// the orchestrator, not by the HTTP client.
const CLIENT_TIMEOUT_SECS: u64 = 24 * 60 * 60;

/// `ContainerClient` backed by a Docker Engine API endpoint
#[derive(Clone)]
pub struct DockerEngine {
    docker: Docker,
}

impl DockerEngine {
    /// Connect to the Docker API at `url`.
    ///
    /// Accepts `unix://<socket path>`, `tcp://host:port` and `http://host:port`.
    pub fn connect(url: &str) -> Result<Self> {
        let docker = if let Some(path) = url.strip_prefix("unix://") {
            // Tolerate the historical "unix://var/run/docker.sock" spelling
            let path = if path.starts_with('/') {
                path.to_string()
            } else {
                format!("/{}", path)
            };
            Docker::connect_with_unix(&path, CLIENT_TIMEOUT_SECS, API_DEFAULT_VERSION)
        } else if let Some(address) = url.strip_prefix("tcp://") {
            Docker::connect_with_http(
                &format!("http://{}", address),
                CLIENT_TIMEOUT_SECS,
                API_DEFAULT_VERSION,
            )
        } else if url.starts_with("http://") {
            Docker::connect_with_http(url, CLIENT_TIMEOUT_SECS, API_DEFAULT_VERSION)
        } else {
            bail!("Unsupported docker api url: {}", url);
        };

        let docker = docker.with_context(|| format!("Failed to connect to Docker at {}", url))?;
        info!(docker_api_url = %url, "Creating docker client");
        Ok(Self { docker })
    }

    /// Ensure Docker image is available (pull if needed)
    async fn ensure_image(&self, image: &str) -> Result<(), DockerError> {
        if self.docker.inspect_image(image).await.is_ok() {
            debug!("Image cache hit: {}", image);
            return Ok(());
        }

        warn!("Image cache miss: {} (pulling now)", image);
        let (from_image, tag) = split_image_reference(image);
        let options = Some(CreateImageOptions {
            from_image,
            tag,
            ..Default::default()
        });

        let mut stream = self.docker.create_image(options, None, None);
        while let Some(result) = stream.next().await {
            result?;
        }

        info!("Image pulled successfully: {}", image);
        Ok(())
    }
}

/// Split `repo[:tag]` so pulls never fetch every tag of a repository.
/// Digest references are passed through untouched.
fn split_image_reference(image: &str) -> (&str, &str) {
    if image.contains('@') {
        return (image, "");
    }
    let name_start = image.rfind('/').map(|i| i + 1).unwrap_or(0);
    match image[name_start..].rfind(':') {
        Some(colon) => {
            let colon = name_start + colon;
            (&image[..colon], &image[colon + 1..])
        }
        None => (image, "latest"),
    }
}

#[async_trait]
impl ContainerClient for DockerEngine {
    async fn create(&self, spec: &ContainerSpec) -> EngineResult<ContainerHandle> {
        let create_err = |e: DockerError| EngineError::Create {
            image: spec.image.clone(),
            reason: e.to_string(),
        };

        self.ensure_image(&spec.image).await.map_err(create_err)?;

        let config = Config {
            image: Some(spec.image.clone()),
            cmd: spec.cmd.clone(),
            env: Some(spec.env.clone()),
            attach_stdout: Some(true),
            attach_stderr: Some(true),
            host_config: Some(bollard::models::HostConfig {
                links: if spec.links.is_empty() {
                    None
                } else {
                    Some(spec.links.clone())
                },
                ..Default::default()
            }),
            ..Default::default()
        };

        let options = CreateContainerOptions {
            name: format!("dit-{}", uuid::Uuid::new_v4()),
            platform: None,
        };

        let container = self
            .docker
            .create_container(Some(options), config)
            .await
            .map_err(create_err)?;

        for warning in &container.warnings {
            warn!(container_id = %container.id, "{}", warning);
        }

        Ok(ContainerHandle::new(container.id))
    }

    async fn start(&self, handle: &ContainerHandle) -> EngineResult<()> {
        self.docker
            .start_container(handle.id(), None::<StartContainerOptions<String>>)
            .await
            .map_err(|e| EngineError::Start {
                id: handle.id().to_string(),
                reason: e.to_string(),
            })
    }

    fn stream_logs(&self, handle: &ContainerHandle) -> BoxStream<'static, EngineResult<Vec<u8>>> {
        let options = Some(LogsOptions::<String> {
            follow: true,
            stdout: true,
            stderr: true,
            ..Default::default()
        });
        let id = handle.id().to_string();

        self.docker
            .logs(handle.id(), options)
            .map(move |chunk| {
                chunk
                    .map(|output| output.into_bytes().to_vec())
                    .map_err(|e| EngineError::Logs {
                        id: id.clone(),
                        reason: e.to_string(),
                    })
            })
            .boxed()
    }

    async fn fetch_logs(&self, handle: &ContainerHandle) -> EngineResult<Vec<u8>> {
        let options = Some(LogsOptions::<String> {
            follow: false,
            stdout: true,
            stderr: true,
            ..Default::default()
        });

        let mut output = Vec::new();
        let mut stream = self.docker.logs(handle.id(), options);
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| EngineError::Logs {
                id: handle.id().to_string(),
                reason: e.to_string(),
            })?;
            output.extend_from_slice(&chunk.into_bytes());
        }

        Ok(output)
    }

    async fn wait(&self, handle: &ContainerHandle, timeout: Duration) -> EngineResult<i64> {
        let options = Some(WaitContainerOptions {
            condition: "not-running",
        });
        let mut stream = self.docker.wait_container(handle.id(), options);

        let next = match tokio::time::timeout(timeout, stream.next()).await {
            Ok(next) => next,
            Err(_) => {
                return Err(EngineError::Timeout {
                    id: handle.id().to_string(),
                    after: timeout,
                })
            }
        };

        match next {
            Some(Ok(response)) => Ok(response.status_code),
            // bollard reports a non-zero exit as an error carrying the code
            Some(Err(DockerError::DockerContainerWaitError { code, .. })) => Ok(code),
            Some(Err(e)) => Err(EngineError::Wait {
                id: handle.id().to_string(),
                reason: e.to_string(),
            }),
            None => Err(EngineError::Wait {
                id: handle.id().to_string(),
                reason: "no wait response from container".to_string(),
            }),
        }
    }

    async fn remove(&self, handle: &ContainerHandle) -> EngineResult<()> {
        let options = Some(RemoveContainerOptions {
            force: true,
            ..Default::default()
        });

        self.docker
            .remove_container(handle.id(), options)
            .await
            .map_err(|e| EngineError::Remove {
                id: handle.id().to_string(),
                reason: e.to_string(),
            })
    }
}
