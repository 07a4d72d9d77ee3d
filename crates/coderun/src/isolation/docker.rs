//! Command builder for the container runtime CLI
//!
//! Builds `docker run` invocations that bind a workspace into a throwaway
//! container under fixed resource quotas.

use std::path::{Path, PathBuf};
use std::time::Duration;

use nix::unistd::{getgid, getuid};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::isolation::process::{ProcessOutcome, run_process};
use crate::types::{ContainerLimits, Phase};

/// Mount point of the workspace inside the container
pub const CONTAINER_WORKDIR: &str = "/app";

/// Builder for `docker run` command-line arguments
#[derive(Debug)]
pub struct DockerCommand {
    /// Path to the runtime binary
    docker_path: PathBuf,
    image: String,
    /// --name
    name: Option<String>,
    /// -m, --cpus, --pids-limit, --network
    limits: ContainerLimits,
    /// --user
    user: Option<String>,
    /// -v host:/app
    workspace: Option<PathBuf>,
    /// -i, keep stdin attached
    interactive: bool,
    command: Vec<String>,
}

impl DockerCommand {
    /// Create a new builder for a container of `image`
    pub fn new(docker_path: impl Into<PathBuf>, image: impl Into<String>) -> Self {
        Self {
            docker_path: docker_path.into(),
            image: image.into(),
            name: None,
            limits: ContainerLimits::default(),
            user: None,
            workspace: None,
            interactive: false,
            command: Vec::new(),
        }
    }

    /// Set the container name
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set resource quotas
    pub fn limits(mut self, limits: ContainerLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Run as the given `uid:gid`
    pub fn user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    /// Mount `path` read-write at [`CONTAINER_WORKDIR`] and work from there
    pub fn workspace(mut self, path: impl Into<PathBuf>) -> Self {
        self.workspace = Some(path.into());
        self
    }

    /// Keep stdin attached so input can be piped into the container
    pub fn interactive(mut self, enable: bool) -> Self {
        self.interactive = enable;
        self
    }

    /// Set the command to run inside the container
    pub fn command(mut self, cmd: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.command = cmd.into_iter().map(Into::into).collect();
        self
    }

    /// Build the command-line arguments
    ///
    /// Consumes self to avoid cloning the command vector.
    pub fn build(self) -> Vec<String> {
        let mut args = vec![
            self.docker_path.to_string_lossy().into_owned(),
            "run".to_string(),
            "--rm".to_string(),
        ];

        if self.interactive {
            args.push("--interactive".to_string());
        }
        if let Some(ref name) = self.name {
            args.push(format!("--name={name}"));
        }

        // Quotas
        args.push(format!("--memory={}", self.limits.memory));
        args.push(format!("--cpus={}", self.limits.cpus));
        if let Some(pids) = self.limits.pids_limit {
            args.push(format!("--pids-limit={pids}"));
        }
        if let Some(ref network) = self.limits.network {
            args.push(format!("--network={network}"));
        }

        if let Some(ref user) = self.user {
            args.push(format!("--user={user}"));
        }

        if let Some(ref workspace) = self.workspace {
            args.push(format!(
                "--volume={}:{CONTAINER_WORKDIR}:rw",
                workspace.display()
            ));
            args.push(format!("--workdir={CONTAINER_WORKDIR}"));
        }

        args.push(self.image);
        args.extend(self.command);
        args
    }
}

/// `uid:gid` of this process
pub fn host_user() -> String {
    format!("{}:{}", getuid(), getgid())
}

/// Unique container name for one phase of one request
pub fn container_name(phase: Phase) -> String {
    format!("coderun-{phase}-{}", Uuid::new_v4().simple())
}

/// Force-remove a container that outlived its phase
///
/// Killing the CLI client does not stop the container it started, so a timed
/// out phase must remove its container explicitly.
pub async fn remove_container(docker_path: &Path, name: &str, limit: Duration) {
    let command = vec![
        docker_path.to_string_lossy().into_owned(),
        "rm".to_string(),
        "--force".to_string(),
        name.to_string(),
    ];

    match run_process(&command, None, None, limit).await {
        Ok(ProcessOutcome::Exited(output)) if output.success() => {
            debug!(name, "removed container");
        }
        Ok(ProcessOutcome::Exited(output)) => {
            warn!(name, stderr = %output.stderr_lossy().trim(), "container removal failed");
        }
        Ok(ProcessOutcome::TimedOut) => warn!(name, "container removal timed out"),
        Err(e) => warn!(name, error = %e, "container removal failed"),
    }
}
