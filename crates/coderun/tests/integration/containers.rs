//! Docker-backed execution; needs a running daemon and the code-runner images

use std::time::{Duration, Instant};

use coderun::isolation::{DockerProbe, HealthProbe};
use coderun::runner::Runner;
use coderun::types::{ExecutionRequest, IsolationMode, IsolationPolicy};

use super::{assert_no_workspaces, fixture_source};

fn container_runner(root: &std::path::Path) -> Runner {
    let mut config = coderun::Config::default();
    config.isolation = IsolationPolicy::Container;
    config.workspace_root = Some(root.to_path_buf());
    Runner::new(config)
}

#[tokio::test]
#[ignore = "requires docker"]
async fn test_probe_reports_healthy() {
    let probe = DockerProbe::from_config(&coderun::Config::default());
    assert!(probe.check().await.is_healthy());
}

#[tokio::test]
#[ignore = "requires docker"]
async fn test_auto_policy_selects_containers() {
    let root = tempfile::tempdir().unwrap();
    let mut config = coderun::Config::default();
    config.workspace_root = Some(root.path().to_path_buf());
    let runner = Runner::new(config);
    assert_eq!(runner.isolation_mode().await, Ok(IsolationMode::Containerized));
}

#[tokio::test]
#[ignore = "requires docker and code-runner images"]
async fn test_python_in_container() {
    let root = tempfile::tempdir().unwrap();
    let result = container_runner(root.path())
        .execute(&ExecutionRequest::new(fixture_source("greet.py"), "python", "Dinesh"))
        .await
        .unwrap();
    assert_eq!(result.output, "Hello, Dinesh!");
    assert_eq!(result.error, "");
    assert_no_workspaces(root.path());
}

#[tokio::test]
#[ignore = "requires docker and code-runner images"]
async fn test_cpp_in_container() {
    let root = tempfile::tempdir().unwrap();
    let result = container_runner(root.path())
        .execute(&ExecutionRequest::new(fixture_source("hello.cpp"), "cpp", ""))
        .await
        .unwrap();
    assert_eq!(result.output, "hello");
    assert_no_workspaces(root.path());
}

#[tokio::test]
#[ignore = "requires docker and code-runner images"]
async fn test_container_timeout() {
    let root = tempfile::tempdir().unwrap();
    let start = Instant::now();
    let result = container_runner(root.path())
        .execute(&ExecutionRequest::new(
            fixture_source("infinite_loop.py"),
            "python",
            "",
        ))
        .await
        .unwrap();
    assert!(start.elapsed() < Duration::from_secs(20));
    assert_eq!(result.error, "Code execution timed out.");
    assert_no_workspaces(root.path());
}
