//! Code runner for coderun
//!
//! Drives one request through its workspace, isolation decision, optional
//! compile phase and run phase, and folds every outcome into an
//! [`ExecutionResult`].

use std::sync::Arc;
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{error, info, instrument, warn};

pub use crate::runner::normalize::normalize;

mod compile;
mod execute;
mod normalize;

use crate::{
    config::{Config, Language},
    isolation::{
        DockerProbe, HealthProbe, ProcessError, ProcessOutcome, ProcessOutput, RuntimeHealth,
        docker, resolve_program, run_process, select_mode,
    },
    types::{ExecutionRequest, ExecutionResult, IsolationMode, IsolationPolicy, Phase},
    workspace::{Workspace, WorkspaceError},
};

/// Exit status `docker run` uses when the runtime itself failed
const DOCKER_RUN_FAILURE: i32 = 125;

/// Offset the container's init adds to the number of a fatal signal
const SIGNAL_EXIT_BASE: i32 = 128;

/// Everything that can stop a request from producing trusted output
///
/// All variants except the internal faults ([`is_internal`](Self::is_internal))
/// are reported to the caller through [`ExecutionResult::error`].
#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("Unsupported language.")]
    UnsupportedLanguage(String),

    /// Compiler diagnostics
    #[error("{0}")]
    CompileFailure(String),

    #[error("{} timed out.", .0.describe())]
    Timeout(Phase),

    #[error("{}", unavailable_message(.local_languages))]
    RuntimeUnavailable {
        language: String,
        /// Languages the local fallback could have run
        local_languages: Vec<String>,
    },

    #[error("{language} toolchain error: {message}")]
    Toolchain { language: String, message: String },

    #[error("workspace error: {0}")]
    Workspace(#[from] WorkspaceError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ExecutionError {
    /// Faults that must not be shown to the caller in detail
    pub fn is_internal(&self) -> bool {
        matches!(self, ExecutionError::Workspace(_) | ExecutionError::Io(_))
    }
}

fn unavailable_message(local_languages: &[String]) -> String {
    if local_languages.is_empty() {
        "Docker is not available.".to_owned()
    } else {
        format!(
            "Docker is not available and local execution only supports {}.",
            local_languages.join(", ")
        )
    }
}

/// High-level runner for code execution
///
/// Cheap to clone; clones share the configuration and the health probe.
#[derive(Debug, Clone)]
pub struct Runner {
    config: Arc<Config>,
    probe: Arc<dyn HealthProbe>,
}

impl Runner {
    /// Create a new runner that probes the configured container runtime
    pub fn new(config: Config) -> Self {
        let probe = Arc::new(DockerProbe::from_config(&config));
        Self {
            config: Arc::new(config),
            probe,
        }
    }

    /// Create a runner with a custom runtime health check
    pub fn with_probe(config: Config, probe: Arc<dyn HealthProbe>) -> Self {
        Self {
            config: Arc::new(config),
            probe,
        }
    }

    /// Create a new runner with default configuration
    pub fn with_defaults() -> Self {
        Self::new(Config::default())
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Run one request to completion
    ///
    /// Domain failures come back as `Ok` with a populated `error`. `Err` is
    /// reserved for internal faults, whose details must not reach the caller.
    /// The request's workspace is gone by the time this returns, either way.
    #[instrument(skip(self, request), fields(language = %request.language))]
    pub async fn execute(
        &self,
        request: &ExecutionRequest,
    ) -> Result<ExecutionResult, ExecutionError> {
        info!(
            input_length = request.input.len(),
            code_size = request.code.len(),
            "code execution request"
        );
        let start = Instant::now();

        let result = normalize(self.execute_pipeline(request).await);

        match &result {
            Ok(result) => info!(
                output_length = result.output.len(),
                error_length = result.error.len(),
                elapsed = ?start.elapsed(),
                "execution completed"
            ),
            Err(e) => error!(error = %e, elapsed = ?start.elapsed(), "execution failed"),
        }
        result
    }

    /// The isolation mode a request would get right now, or why none is usable
    pub async fn isolation_mode(&self) -> Result<IsolationMode, String> {
        match self.config.isolation {
            IsolationPolicy::Local => Ok(IsolationMode::LocalFallback),
            IsolationPolicy::Auto => Ok(select_mode(self.probe.as_ref()).await),
            IsolationPolicy::Container => match self.probe.check().await {
                RuntimeHealth::Healthy => Ok(IsolationMode::Containerized),
                RuntimeHealth::Unavailable(reason) => Err(reason),
            },
        }
    }

    async fn execute_pipeline(
        &self,
        request: &ExecutionRequest,
    ) -> Result<ProcessOutput, ExecutionError> {
        let (_, language) = self
            .config
            .get_language(&request.language)
            .ok_or_else(|| ExecutionError::UnsupportedLanguage(request.language.clone()))?;

        let workspace = Workspace::acquire(&self.config.workspace_root())?;
        let outcome = self.run_in_workspace(&workspace, language, request).await;

        if let Err(e) = workspace.release().await {
            error!(error = %e, "failed to release workspace");
        }
        outcome
    }

    async fn run_in_workspace(
        &self,
        workspace: &Workspace,
        language: &Language,
        request: &ExecutionRequest,
    ) -> Result<ProcessOutput, ExecutionError> {
        workspace
            .stage(&language.source_name(), request.code.as_bytes())
            .await?;

        let mode = self.mode_for(language).await?;
        let ctx = PhaseContext {
            config: &self.config,
            workspace,
            language,
            mode,
        };

        compile::compile(&ctx).await?;
        execute::execute(&ctx, request.input.as_bytes()).await
    }

    /// Pick the isolation mode and check the language can run under it
    async fn mode_for(&self, language: &Language) -> Result<IsolationMode, ExecutionError> {
        let unavailable = |local_languages: Vec<String>| ExecutionError::RuntimeUnavailable {
            language: language.name.clone(),
            local_languages,
        };

        let mode = self.isolation_mode().await.map_err(|reason| {
            warn!(%reason, "container runtime required but unavailable");
            unavailable(Vec::new())
        })?;

        if mode == IsolationMode::LocalFallback && !language.local {
            let local = self
                .config
                .local_languages()
                .into_iter()
                .map(str::to_owned)
                .collect();
            return Err(unavailable(local));
        }
        Ok(mode)
    }
}

/// Recover the signal behind a `docker run` exit status of 128+N
///
/// The CLI client exits normally with the container's status, so a program
/// killed inside the container would otherwise look like a plain exit.
fn signal_from_exit(mut output: ProcessOutput) -> ProcessOutput {
    if let Some(code) = output.exit_code
        && code > SIGNAL_EXIT_BASE
        && output.signal.is_none()
    {
        output.signal = Some(code - SIGNAL_EXIT_BASE);
        output.exit_code = None;
    }
    output
}

/// What a phase needs to know about its request
pub(crate) struct PhaseContext<'a> {
    pub(crate) config: &'a Config,
    pub(crate) workspace: &'a Workspace,
    pub(crate) language: &'a Language,
    pub(crate) mode: IsolationMode,
}

impl PhaseContext<'_> {
    /// Run one phase command under the request's isolation mode
    pub(crate) async fn invoke(
        &self,
        phase: Phase,
        command: Vec<String>,
        stdin: Option<&[u8]>,
        limit: Duration,
    ) -> Result<ProcessOutcome, ExecutionError> {
        match self.mode {
            IsolationMode::Containerized => self.invoke_container(phase, command, stdin, limit).await,
            IsolationMode::LocalFallback => {
                let mut command = command;
                resolve_program(&mut command, self.workspace.path())
                    .map_err(|e| self.process_error(e))?;
                run_process(&command, Some(self.workspace.path()), stdin, limit)
                    .await
                    .map_err(|e| self.process_error(e))
            }
        }
    }

    async fn invoke_container(
        &self,
        phase: Phase,
        command: Vec<String>,
        stdin: Option<&[u8]>,
        limit: Duration,
    ) -> Result<ProcessOutcome, ExecutionError> {
        let name = docker::container_name(phase);
        let mut builder = docker::DockerCommand::new(&self.config.docker_path, &self.language.image)
            .name(&name)
            .limits(self.config.container.clone())
            .workspace(self.workspace.path())
            .interactive(stdin.is_some())
            .command(command);
        if self.config.container.run_as_host_user {
            builder = builder.user(docker::host_user());
        }

        let outcome = run_process(&builder.build(), None, stdin, limit)
            .await
            .map_err(|e| self.process_error(e))?;

        match outcome {
            ProcessOutcome::TimedOut => {
                docker::remove_container(
                    &self.config.docker_path,
                    &name,
                    self.config.probe_timeout(),
                )
                .await;
                Ok(ProcessOutcome::TimedOut)
            }
            ProcessOutcome::Exited(output) if output.exit_code == Some(DOCKER_RUN_FAILURE) => {
                Err(ExecutionError::Toolchain {
                    language: self.language.name.clone(),
                    message: output.stderr_lossy().trim().to_owned(),
                })
            }
            ProcessOutcome::Exited(output) => Ok(ProcessOutcome::Exited(signal_from_exit(output))),
        }
    }

    fn process_error(&self, error: ProcessError) -> ExecutionError {
        match error {
            ProcessError::Io(e) => ExecutionError::Io(e),
            other => ExecutionError::Toolchain {
                language: self.language.name.clone(),
                message: other.to_string(),
            },
        }
    }
}
