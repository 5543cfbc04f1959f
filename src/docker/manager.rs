// Docker manager - container status, stats and logs for the game server

use bollard::container::{LogOutput, LogsOptions, StatsOptions};
use bollard::models::ContainerStateStatusEnum;
use bollard::Docker;
use futures_util::stream::StreamExt;
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DockerError {
    #[error("Docker connection error: {0}")]
    Connection(#[from] bollard::errors::Error),
}

/// Observed state of the managed container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerState {
    Running,
    Stopped,
    NotFound,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerStats {
    pub cpu_percent: f64,
    pub memory_usage_mb: f64,
    pub memory_limit_mb: f64,
    pub memory_percent: f64,
}

impl ContainerStats {
    pub fn empty() -> Self {
        Self {
            cpu_percent: 0.0,
            memory_usage_mb: 0.0,
            memory_limit_mb: 0.0,
            memory_percent: 0.0,
        }
    }
}

/// Scoped handle on the container engine, opened per operation.
pub struct DockerManager {
    docker: Docker,
}

impl DockerManager {
    pub async fn new() -> Result<Self, DockerError> {
        let docker = Docker::connect_with_local_defaults()?;
        Ok(Self { docker })
    }

    pub async fn ping(&self) -> Result<(), DockerError> {
        self.docker.ping().await?;
        Ok(())
    }

    /// Inspect the named container. An engine-side 404 is a state, not an
    /// error: the container simply has not been created yet.
    pub async fn status(&self, container: &str) -> Result<ContainerState, DockerError> {
        match self.docker.inspect_container(container, None).await {
            Ok(info) => {
                let status = info.state.and_then(|state| state.status);
                tracing::debug!("container {} status: {:?}", container, status);

                Ok(match status {
                    Some(ContainerStateStatusEnum::RUNNING)
                    | Some(ContainerStateStatusEnum::RESTARTING) => ContainerState::Running,
                    _ => ContainerState::Stopped,
                })
            }
            Err(bollard::errors::Error::DockerResponseServerError {
                status_code: 404, ..
            }) => Ok(ContainerState::NotFound),
            Err(err) => Err(err.into()),
        }
    }

    /// One-shot CPU/memory sample. Only meaningful while the container is
    /// running; without a sample this reports zeros.
    pub async fn stats(&self, container: &str) -> Result<ContainerStats, DockerError> {
        let options = Some(StatsOptions {
            stream: false,
            one_shot: true,
        });

        let mut stream = self.docker.stats(container, options);

        if let Some(Ok(stats)) = stream.next().await {
            let cpu_delta = stats.cpu_stats.cpu_usage.total_usage as f64
                - stats.precpu_stats.cpu_usage.total_usage as f64;
            let system_delta = stats.cpu_stats.system_cpu_usage.unwrap_or(0) as f64
                - stats.precpu_stats.system_cpu_usage.unwrap_or(0) as f64;
            let num_cpus = stats.cpu_stats.online_cpus.unwrap_or(1) as f64;

            let cpu_percent = if system_delta > 0.0 && cpu_delta > 0.0 {
                (cpu_delta / system_delta) * num_cpus * 100.0
            } else {
                0.0
            };

            let memory_usage = stats.memory_stats.usage.unwrap_or(0) as f64 / 1024.0 / 1024.0;
            let memory_limit = stats.memory_stats.limit.unwrap_or(1) as f64 / 1024.0 / 1024.0;
            let memory_percent = if memory_limit > 0.0 {
                (memory_usage / memory_limit) * 100.0
            } else {
                0.0
            };

            return Ok(ContainerStats {
                cpu_percent,
                memory_usage_mb: memory_usage,
                memory_limit_mb: memory_limit,
                memory_percent,
            });
        }

        Ok(ContainerStats::empty())
    }

    /// Tail of the container's combined stdout/stderr. Game servers tend
    /// to log to stderr, so both streams are collected.
    pub async fn logs(&self, container: &str, tail: u32) -> Result<Vec<String>, DockerError> {
        let options = Some(LogsOptions::<String> {
            stdout: true,
            stderr: true,
            tail: tail.to_string(),
            timestamps: false,
            ..Default::default()
        });

        let mut stream = self.docker.logs(container, options);
        let mut logs = Vec::new();

        while let Some(result) = stream.next().await {
            match result {
                Ok(output) => {
                    let chunk = match output {
                        LogOutput::StdOut { message }
                        | LogOutput::StdErr { message }
                        | LogOutput::Console { message }
                        | LogOutput::StdIn { message } => {
                            String::from_utf8_lossy(&message).to_string()
                        }
                    };
                    for line in chunk.lines() {
                        if !line.trim().is_empty() {
                            logs.push(line.to_string());
                        }
                    }
                }
                Err(err) => {
                    tracing::warn!("error reading log: {}", err);
                }
            }
        }

        Ok(logs)
    }
}
