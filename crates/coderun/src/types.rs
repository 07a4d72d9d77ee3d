use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A single "submit code, get output" request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionRequest {
    /// Program source text
    pub code: String,

    /// Language identifier (matched case-insensitively)
    pub language: String,

    /// Text delivered on the program's standard input
    #[serde(default)]
    pub input: String,
}

/// Errors raised while validating a request before execution
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RequestError {
    #[error("Input exceeds maximum size of {max} bytes.")]
    InputTooLarge { len: usize, max: usize },
}

impl ExecutionRequest {
    pub fn new(
        code: impl Into<String>,
        language: impl Into<String>,
        input: impl Into<String>,
    ) -> Self {
        Self {
            code: code.into(),
            language: language.into(),
            input: input.into(),
        }
    }

    /// Reject requests whose input is larger than `max_input_size` bytes
    pub fn validate(&self, max_input_size: usize) -> Result<(), RequestError> {
        if self.input.len() > max_input_size {
            return Err(RequestError::InputTooLarge {
                len: self.input.len(),
                max: max_input_size,
            });
        }
        Ok(())
    }
}

/// The terminal artifact of a request
///
/// `error` is non-empty exactly when the program did not produce trusted
/// output. Both fields are whitespace-trimmed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub output: String,
    pub error: String,
}

impl ExecutionResult {
    /// Result of a program that ran to completion
    pub fn completed(stdout: &str, stderr: &str) -> Self {
        Self {
            output: stdout.trim().to_owned(),
            error: stderr.trim().to_owned(),
        }
    }

    /// Result of a request that failed before producing output
    pub fn failure(message: impl AsRef<str>) -> Self {
        Self {
            output: String::new(),
            error: message.as_ref().trim().to_owned(),
        }
    }

    #[must_use]
    pub fn has_error(&self) -> bool {
        !self.error.is_empty()
    }
}

/// How a request's phases are executed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IsolationMode {
    /// Each phase runs in a throwaway container bound to the workspace
    Containerized,

    /// Each phase runs as a direct child process of this one
    LocalFallback,
}

impl fmt::Display for IsolationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IsolationMode::Containerized => write!(f, "containerized"),
            IsolationMode::LocalFallback => write!(f, "local"),
        }
    }
}

/// Operator policy for choosing an isolation mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IsolationPolicy {
    /// Probe the container runtime per request, fall back to local processes
    #[default]
    Auto,

    /// Containers only; an unhealthy runtime makes every language unavailable
    Container,

    /// Never probe, always run locally
    Local,
}

/// A stage of the execution pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Compile,
    Run,
}

impl Phase {
    /// Subject used in user-facing messages about this phase
    pub fn describe(&self) -> &'static str {
        match self {
            Phase::Compile => "Compilation",
            Phase::Run => "Code execution",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Compile => write!(f, "compile"),
            Phase::Run => write!(f, "run"),
        }
    }
}

/// Resource quotas applied to every container, regardless of language
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContainerLimits {
    /// Memory ceiling in docker notation (e.g. "256m")
    #[serde(default = "default_memory")]
    pub memory: String,

    /// Fractional CPU share
    #[serde(default = "default_cpus")]
    pub cpus: f64,

    /// Maximum number of processes inside the container
    #[serde(default)]
    pub pids_limit: Option<u32>,

    /// Network mode passed to `--network` (e.g. "none")
    #[serde(default)]
    pub network: Option<String>,

    /// Run as the host uid:gid so artifacts in the workspace stay removable
    #[serde(default = "default_run_as_host_user")]
    pub run_as_host_user: bool,
}

impl Default for ContainerLimits {
    fn default() -> Self {
        Self {
            memory: default_memory(),
            cpus: default_cpus(),
            pids_limit: None,
            network: None,
            run_as_host_user: default_run_as_host_user(),
        }
    }
}

fn default_memory() -> String {
    "256m".to_owned()
}

fn default_cpus() -> f64 {
    0.5
}

fn default_run_as_host_user() -> bool {
    true
}
