use std::path::PathBuf;

use coderun::config::{Config, ConfigError};
use coderun::types::IsolationPolicy;

use super::FIXTURES_PATH;

fn load(name: &str) -> Result<Config, ConfigError> {
    Config::from_file(format!("{FIXTURES_PATH}/configs/{name}"))
}

#[test]
fn test_load_valid_config() {
    let config = load("valid_full.toml").expect("Failed to load config");

    assert_eq!(config.docker_path, PathBuf::from("/usr/local/bin/docker"));
    assert_eq!(config.isolation, IsolationPolicy::Container);
    assert_eq!(config.execution_timeout, 5.0);
    assert_eq!(config.compile_timeout, 4.0);
    assert_eq!(config.max_input_size, 4096);
    assert_eq!(
        config.allowed_origins,
        vec!["https://a.example", "https://b.example"]
    );
    assert_eq!(config.workspace_root(), PathBuf::from("/var/tmp"));

    assert_eq!(config.container.memory, "128m");
    assert_eq!(config.container.pids_limit, Some(64));
    assert_eq!(config.container.network.as_deref(), Some("none"));
    assert!(!config.container.run_as_host_user);

    let (_, cpp) = config.get_language("cpp").expect("cpp not found");
    assert!(cpp.is_compiled());
    assert!(!cpp.local);
    assert_eq!(
        cpp.compile_command().unwrap(),
        vec!["g++", "-O2", "Main.cpp", "-o", "MainExec"]
    );
    assert_eq!(config.local_languages(), vec!["python"]);
}

#[test]
fn test_load_minimal_config() {
    let config = load("valid_minimal.toml").expect("Failed to load config");

    assert!(config.languages.contains_key("test"));
    assert_eq!(config.isolation, IsolationPolicy::Auto);
    assert_eq!(config.execution_timeout, 10.0);
    assert_eq!(config.max_input_size, 1000);
    assert_eq!(config.allowed_origins, vec!["*"]);
    assert!(config.local_languages().is_empty());
}

#[test]
fn test_load_shell_fixture() {
    let config = load("local_shell.toml").expect("Failed to load config");
    let (_, compiled) = config.get_language("compiled").unwrap();
    let command = compiled.compile_command().unwrap();

    assert_eq!(compiled.source_name(), "program.sh");
    assert!(command[2].contains("cat program.sh"));
    assert!(command[2].contains("> program;"));
    assert_eq!(compiled.run_command(), vec!["./program"]);
}

#[test]
fn test_load_missing_file() {
    let result = load("does_not_exist.toml");
    assert!(matches!(result, Err(ConfigError::ReadFile { .. })));
}

#[test]
fn test_load_invalid_empty_name() {
    assert!(matches!(
        load("invalid_empty_name.toml"),
        Err(ConfigError::Invalid(_))
    ));
}

#[test]
fn test_load_invalid_empty_run_command() {
    assert!(matches!(
        load("invalid_empty_run_command.toml"),
        Err(ConfigError::Invalid(_))
    ));
}

#[test]
fn test_load_invalid_zero_timeout() {
    assert!(matches!(
        load("invalid_zero_timeout.toml"),
        Err(ConfigError::Invalid(_))
    ));
}

#[test]
fn test_load_invalid_source_name() {
    assert!(matches!(
        load("invalid_source_name.toml"),
        Err(ConfigError::Invalid(_))
    ));
}

#[test]
fn test_load_invalid_isolation_policy() {
    assert!(matches!(
        load("invalid_isolation.toml"),
        Err(ConfigError::Parse(_))
    ));
}
