//! A library for running untrusted code.
//!
//! Coderun takes a source program, a language and optional stdin, runs the
//! program in a throwaway workspace and reports what it printed. Programs run
//! inside Docker containers when the runtime is healthy and fall back to local
//! toolchains when it is not.
//!
//! # Features
//!
//! - **Per-request isolation**: every request gets its own workspace, removed when it finishes.
//! - **Container or local execution**: runtime health is probed for each request.
//! - **Multi-language**: compiled and interpreted languages, configured in TOML.
//! - **Bounded phases**: compile and run wall-clock limits kill the whole process tree.
//! - **Uniform results**: every outcome is an `output`/`error` pair.

pub use config::{Config, ConfigError, EXAMPLE_CONFIG, Language};
pub use isolation::{DockerProbe, HealthProbe, RuntimeHealth};
pub use runner::{ExecutionError, Runner};
pub use types::{
    ContainerLimits, ExecutionRequest, ExecutionResult, IsolationMode, IsolationPolicy, Phase,
    RequestError,
};
pub use workspace::{Workspace, WorkspaceError};

pub mod config;
pub mod isolation;
pub mod runner;
pub mod types;
pub mod workspace;
