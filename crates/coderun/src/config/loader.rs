//! Configuration file loading for coderun
//!
//! Handles loading and parsing configuration files using the config crate,
//! with `CODERUN_*` environment variables layered on top.

use std::path::Path;

use config::{Config as ConfigBuilder, Environment, File, FileFormat, Map};

use crate::config::{Config, ConfigError, ENV_PREFIX, EXAMPLE_CONFIG};
use crate::workspace::is_safe_file_name;

impl Config {
    /// Load configuration from a TOML file, then apply environment overrides
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadFile {
            path: path.to_path_buf(),
            source,
        })?;
        Self::build(&content, None)
    }

    /// Load the file at `path` (or the embedded defaults) plus environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::from_file(path),
            None => Self::build(EXAMPLE_CONFIG, None),
        }
    }

    /// Parse configuration from a TOML string, ignoring the environment
    pub fn parse_toml(content: &str) -> Result<Self, ConfigError> {
        let config = ConfigBuilder::builder()
            .add_source(File::from_str(content, FileFormat::Toml))
            .build()?;

        let config: Config = config.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Build from TOML content with environment overrides.
    ///
    /// `env` replaces the process environment when given.
    fn build(content: &str, env: Option<Map<String, String>>) -> Result<Self, ConfigError> {
        let config = ConfigBuilder::builder()
            .add_source(File::from_str(content, FileFormat::Toml))
            .add_source(environment(env))
            .build()?;

        let config: Config = config.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [
            ("execution_timeout", self.execution_timeout),
            ("compile_timeout", self.compile_timeout),
            ("probe_timeout", self.probe_timeout),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(ConfigError::Invalid(format!(
                    "{name} must be a positive number of seconds"
                )));
            }
        }

        if !self.container.cpus.is_finite() || self.container.cpus <= 0.0 {
            return Err(ConfigError::Invalid(
                "container.cpus must be positive".to_owned(),
            ));
        }

        // Validate all languages have required fields
        for (id, lang) in &self.languages {
            if lang.name.is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "language '{id}' has empty name"
                )));
            }
            if lang.extension.is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "language '{id}' has empty extension"
                )));
            }
            if lang.image.is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "language '{id}' has empty image"
                )));
            }
            if lang.run.command.is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "language '{id}' has empty run command"
                )));
            }
            if let Some(ref source_name) = lang.source_name
                && (!is_safe_file_name(source_name) || source_name.contains('/'))
            {
                return Err(ConfigError::Invalid(format!(
                    "language '{id}' has invalid source name '{source_name}'"
                )));
            }
            if let Some(ref compile) = lang.compile
                && compile.command.is_empty()
            {
                return Err(ConfigError::Invalid(format!(
                    "language '{id}' has empty compile command"
                )));
            }
        }

        Ok(())
    }
}

fn environment(source: Option<Map<String, String>>) -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("_")
        .separator("__")
        .try_parsing(true)
        .list_separator(",")
        .with_list_parse_key("allowed_origins")
        .source(source)
}
