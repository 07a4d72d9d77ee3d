use std::time::{Duration, Instant};

use coderun::runner::Runner;
use coderun::types::{ExecutionRequest, ExecutionResult, IsolationMode};

use super::{assert_no_workspaces, fixture_config};

fn shell_runner(root: &std::path::Path) -> Runner {
    Runner::new(fixture_config("local_shell.toml", root))
}

async fn run(runner: &Runner, code: &str, language: &str, input: &str) -> ExecutionResult {
    runner
        .execute(&ExecutionRequest::new(code, language, input))
        .await
        .expect("Execution faulted")
}

#[tokio::test]
async fn test_local_policy_reports_local_mode() {
    let root = tempfile::tempdir().unwrap();
    let runner = shell_runner(root.path());
    assert_eq!(
        runner.isolation_mode().await,
        Ok(IsolationMode::LocalFallback)
    );
}

#[tokio::test]
async fn test_hello() {
    let root = tempfile::tempdir().unwrap();
    let runner = shell_runner(root.path());

    let result = run(&runner, "echo hello", "shell", "").await;
    assert_eq!(result.output, "hello");
    assert_eq!(result.error, "");
    assert_no_workspaces(root.path());
}

#[tokio::test]
async fn test_stdin_is_delivered() {
    let root = tempfile::tempdir().unwrap();
    let runner = shell_runner(root.path());

    let result = run(&runner, "read a; read b; echo $((a + b))", "shell", "2\n40\n").await;
    assert_eq!(result.output, "42");
}

#[tokio::test]
async fn test_compiled_hello() {
    let root = tempfile::tempdir().unwrap();
    let runner = shell_runner(root.path());

    let result = run(&runner, "echo hello", "compiled", "").await;
    assert_eq!(result.output, "hello");
    assert_eq!(result.error, "");
    assert_no_workspaces(root.path());
}

#[tokio::test]
async fn test_compile_error_yields_diagnostics() {
    let root = tempfile::tempdir().unwrap();
    let runner = shell_runner(root.path());

    let result = run(&runner, "echo hello # syntax error", "compiled", "").await;
    assert_eq!(result.output, "");
    assert_eq!(result.error, "program.sh:1: error: syntax error");
    assert_no_workspaces(root.path());
}

#[tokio::test]
async fn test_infinite_loop_times_out() {
    let root = tempfile::tempdir().unwrap();
    let runner = shell_runner(root.path());

    let start = Instant::now();
    let result = run(&runner, "while :; do :; done", "shell", "").await;
    assert!(start.elapsed() < Duration::from_secs(6));
    assert_eq!(result.output, "");
    assert_eq!(result.error, "Code execution timed out.");
    assert_no_workspaces(root.path());
}

#[tokio::test]
async fn test_unsupported_language() {
    let root = tempfile::tempdir().unwrap();
    let runner = shell_runner(root.path());

    let result = run(&runner, "print('hi')", "cobol", "").await;
    assert_eq!(result.output, "");
    assert_eq!(result.error, "Unsupported language.");
    assert_no_workspaces(root.path());
}

#[tokio::test]
async fn test_language_without_local_toolchain() {
    let root = tempfile::tempdir().unwrap();
    let runner = shell_runner(root.path());

    let result = run(&runner, "echo hi", "remote", "").await;
    assert_eq!(result.output, "");
    assert_eq!(
        result.error,
        "Docker is not available and local execution only supports compiled, shell."
    );
}

#[tokio::test]
async fn test_crash_after_partial_output() {
    let root = tempfile::tempdir().unwrap();
    let runner = shell_runner(root.path());

    let result = run(&runner, "echo partial; echo 'bad thing' >&2; exit 3", "shell", "").await;
    assert_eq!(result.output, "partial");
    assert_eq!(result.error, "bad thing");
}

#[tokio::test]
async fn test_killed_by_signal() {
    let root = tempfile::tempdir().unwrap();
    let runner = shell_runner(root.path());

    let result = run(&runner, "kill -9 $$", "shell", "").await;
    assert_eq!(result.output, "");
    assert_eq!(result.error, "Process terminated by signal 9.");
}

#[tokio::test]
async fn test_concurrent_requests_are_isolated() {
    let root = tempfile::tempdir().unwrap();
    let runner = shell_runner(root.path());

    let handles: Vec<_> = (0..12)
        .map(|i| {
            let runner = runner.clone();
            let language = if i % 2 == 0 { "shell" } else { "compiled" };
            tokio::spawn(async move {
                // Leave a marker, then check no other request's marker is visible
                let code = format!("echo {i} > marker; sleep 0.2; ls | wc -l; cat marker");
                let result = run(&runner, &code, language, "").await;
                (i, language, result)
            })
        })
        .collect();

    for handle in handles {
        let (i, language, result) = handle.await.unwrap();
        let lines: Vec<&str> = result.output.lines().map(str::trim).collect();
        // Source, marker, plus the artifact for the compiled language
        let expected_files = if language == "compiled" { "3" } else { "2" };
        assert_eq!(lines, [expected_files, i.to_string().as_str()]);
        assert_eq!(result.error, "");
    }
    assert_no_workspaces(root.path());
}

#[test]
fn test_oversized_input_is_rejected() {
    let root = tempfile::tempdir().unwrap();
    let config = fixture_config("local_shell.toml", root.path());

    let request = ExecutionRequest::new("cat", "shell", "x".repeat(config.max_input_size + 1));
    let err = request.validate(config.max_input_size).unwrap_err();
    assert_eq!(err.to_string(), "Input exceeds maximum size of 1000 bytes.");

    let request = ExecutionRequest::new("cat", "shell", "x".repeat(config.max_input_size));
    assert!(request.validate(config.max_input_size).is_ok());
}

#[test]
fn test_request_json_contract() {
    let request: ExecutionRequest =
        serde_json::from_str(r#"{"code": "echo hi", "language": "shell"}"#).unwrap();
    assert_eq!(request.input, "");

    let body = serde_json::to_value(ExecutionResult::failure("Unsupported language.")).unwrap();
    assert_eq!(
        body,
        serde_json::json!({ "output": "", "error": "Unsupported language." })
    );
}
