use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

pub use crate::config::language::{CompileConfig, FileExtension, Language, RunConfig};
use crate::types::{ContainerLimits, IsolationPolicy};

pub mod language;
mod loader;

/// Example configuration embedded at compile time.
///
/// Library users can access this to generate a starter config file.
pub const EXAMPLE_CONFIG: &str = include_str!("../../coderun.example.toml");

/// Prefix for environment variable overrides (e.g. `CODERUN_EXECUTION_TIMEOUT`)
pub const ENV_PREFIX: &str = "CODERUN";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid characters in file extension")]
    InvalidFileExtChars,

    #[error("failed to read config file at {path}: {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] config::ConfigError),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Config for coderun
///
/// Built once at startup and never mutated afterwards; every request reads
/// the same instance.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Path to the container runtime binary (uses PATH if not absolute).
    #[serde(default = "default_docker_path")]
    pub docker_path: PathBuf,

    /// How the isolation mode is chosen per request.
    #[serde(default)]
    pub isolation: IsolationPolicy,

    /// Run phase wall clock limit in seconds.
    #[serde(default = "default_execution_timeout")]
    pub execution_timeout: f64,

    /// Compile phase wall clock limit in seconds.
    #[serde(default = "default_compile_timeout")]
    pub compile_timeout: f64,

    /// Container runtime health probe limit in seconds.
    #[serde(default = "default_probe_timeout")]
    pub probe_timeout: f64,

    /// Largest accepted program input in bytes.
    ///
    /// Enforced by the surrounding service, not by the pipeline.
    #[serde(default = "default_max_input_size")]
    pub max_input_size: usize,

    /// Origins the transport layer should accept.
    #[serde(default = "default_allowed_origins")]
    pub allowed_origins: Vec<String>,

    /// Parent directory for per-request workspaces (system temp dir if unset).
    #[serde(default)]
    pub workspace_root: Option<PathBuf>,

    /// Quotas applied to every container.
    #[serde(default)]
    pub container: ContainerLimits,

    /// Language profiles keyed by language ID
    #[serde(default)]
    pub languages: HashMap<String, Language>,
}

impl Config {
    /// Create a new config with embedded default languages
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty config with no languages
    pub fn empty() -> Self {
        Self {
            docker_path: default_docker_path(),
            isolation: IsolationPolicy::default(),
            execution_timeout: default_execution_timeout(),
            compile_timeout: default_compile_timeout(),
            probe_timeout: default_probe_timeout(),
            max_input_size: default_max_input_size(),
            allowed_origins: default_allowed_origins(),
            workspace_root: None,
            container: ContainerLimits::default(),
            languages: HashMap::new(),
        }
    }

    /// Resolve a language by ID, ignoring ASCII case and surrounding whitespace
    pub fn get_language(&self, id: &str) -> Option<(&str, &Language)> {
        let id = id.trim();
        self.languages
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(id))
            .map(|(key, lang)| (key.as_str(), lang))
    }

    /// Sorted IDs of languages with a registered local toolchain
    pub fn local_languages(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self
            .languages
            .iter()
            .filter(|(_, lang)| lang.local)
            .map(|(id, _)| id.as_str())
            .collect();
        ids.sort_unstable();
        ids
    }

    pub fn execution_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.execution_timeout)
    }

    pub fn compile_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.compile_timeout)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.probe_timeout)
    }

    /// Directory new workspaces are created in
    pub fn workspace_root(&self) -> PathBuf {
        self.workspace_root
            .clone()
            .unwrap_or_else(std::env::temp_dir)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::parse_toml(EXAMPLE_CONFIG).expect("embedded default config should be valid")
    }
}

fn default_docker_path() -> PathBuf {
    PathBuf::from("docker")
}

fn default_execution_timeout() -> f64 {
    10.0
}

fn default_compile_timeout() -> f64 {
    8.0
}

fn default_probe_timeout() -> f64 {
    3.0
}

fn default_max_input_size() -> usize {
    1000
}

fn default_allowed_origins() -> Vec<String> {
    vec!["*".to_owned()]
}
