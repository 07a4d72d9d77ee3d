//! Compilation step for code execution
//!
//! Runs the language's build command over the staged source. Interpreted
//! languages skip this step entirely.

use tracing::{debug, instrument};

use crate::isolation::ProcessOutcome;
use crate::runner::{ExecutionError, PhaseContext};
use crate::types::Phase;

/// Compile the staged source, leaving the artifact in the workspace
///
/// Compilers never see the request's input.
#[instrument(skip(ctx), fields(language = %ctx.language.name, mode = %ctx.mode))]
pub(crate) async fn compile(ctx: &PhaseContext<'_>) -> Result<(), ExecutionError> {
    let Some(command) = ctx.language.compile_command() else {
        return Ok(());
    };

    let outcome = ctx
        .invoke(Phase::Compile, command, None, ctx.config.compile_timeout())
        .await?;

    let output = match outcome {
        ProcessOutcome::Exited(output) => output,
        ProcessOutcome::TimedOut => return Err(ExecutionError::Timeout(Phase::Compile)),
    };

    debug!(exit_code = ?output.exit_code, "compilation complete");

    if output.success() {
        return Ok(());
    }
    Err(ExecutionError::CompileFailure(diagnostics(
        &output.stderr_lossy(),
        &output.stdout_lossy(),
        output.exit_code,
    )))
}

/// Pick the compiler's own explanation of the failure
///
/// Some toolchains report errors on stdout, so fall back to it when stderr is
/// empty.
fn diagnostics(stderr: &str, stdout: &str, exit_code: Option<i32>) -> String {
    let stderr = stderr.trim();
    if !stderr.is_empty() {
        return stderr.to_owned();
    }
    let stdout = stdout.trim();
    if !stdout.is_empty() {
        return stdout.to_owned();
    }
    match exit_code {
        Some(code) => format!("Compilation failed with exit code {code}."),
        None => "Compilation failed.".to_owned(),
    }
}
