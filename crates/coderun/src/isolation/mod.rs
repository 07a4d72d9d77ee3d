//! Isolation strategy selection
//!
//! Decides per request whether phases run inside containers or as local
//! processes, and provides the process and container primitives both
//! strategies are built on.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, instrument, warn};

pub use crate::isolation::docker::{CONTAINER_WORKDIR, DockerCommand};
pub use crate::isolation::process::{
    ProcessError, ProcessOutcome, ProcessOutput, resolve_program, run_process,
};
use crate::config::Config;
use crate::types::IsolationMode;

pub(crate) mod docker;
mod process;

/// Outcome of a container runtime health check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuntimeHealth {
    Healthy,

    /// The runtime cannot be used; the reason is for operators
    Unavailable(String),
}

impl RuntimeHealth {
    pub fn is_healthy(&self) -> bool {
        matches!(self, RuntimeHealth::Healthy)
    }
}

/// Capability check for a container runtime
#[async_trait]
pub trait HealthProbe: std::fmt::Debug + Send + Sync {
    async fn check(&self) -> RuntimeHealth;
}

/// Probes the Docker CLI: binary present, then `docker info` answers in time
#[derive(Debug, Clone)]
pub struct DockerProbe {
    docker_path: PathBuf,
    timeout: Duration,
}

impl DockerProbe {
    pub fn new(docker_path: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            docker_path: docker_path.into(),
            timeout,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(&config.docker_path, config.probe_timeout())
    }
}

#[async_trait]
impl HealthProbe for DockerProbe {
    #[instrument(skip(self), fields(docker = %self.docker_path.display()))]
    async fn check(&self) -> RuntimeHealth {
        let binary = match which::which(&self.docker_path) {
            Ok(binary) => binary,
            Err(e) => {
                return RuntimeHealth::Unavailable(format!(
                    "{} not found: {e}",
                    self.docker_path.display()
                ));
            }
        };

        let command = vec![binary.to_string_lossy().into_owned(), "info".to_string()];
        let health = match run_process(&command, None, None, self.timeout).await {
            Ok(ProcessOutcome::Exited(output)) if output.success() => RuntimeHealth::Healthy,
            Ok(ProcessOutcome::Exited(output)) => RuntimeHealth::Unavailable(format!(
                "daemon not responding: {}",
                output.stderr_lossy().trim()
            )),
            Ok(ProcessOutcome::TimedOut) => RuntimeHealth::Unavailable(format!(
                "health check timed out after {:?}",
                self.timeout
            )),
            Err(e) => RuntimeHealth::Unavailable(e.to_string()),
        };

        debug!(?health, "container runtime probed");
        health
    }
}

/// Choose the isolation mode for one request
///
/// Called for every request; runtime availability is never cached.
pub async fn select_mode(probe: &dyn HealthProbe) -> IsolationMode {
    match probe.check().await {
        RuntimeHealth::Healthy => IsolationMode::Containerized,
        RuntimeHealth::Unavailable(reason) => {
            warn!(%reason, "container runtime unavailable, using local fallback");
            IsolationMode::LocalFallback
        }
    }
}
