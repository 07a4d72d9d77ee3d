//! Folding pipeline outcomes into results

use crate::isolation::ProcessOutput;
use crate::runner::ExecutionError;
use crate::types::ExecutionResult;

/// Turn a pipeline outcome into the result returned to the caller
///
/// A program that ran to completion yields its trimmed streams, whatever its
/// exit code. Domain failures become an empty output plus a message. Internal
/// faults are passed through untouched.
pub fn normalize(
    outcome: Result<ProcessOutput, ExecutionError>,
) -> Result<ExecutionResult, ExecutionError> {
    match outcome {
        Ok(output) => {
            let stdout = output.stdout_lossy();
            let stderr = output.stderr_lossy();
            let mut result = ExecutionResult::completed(&stdout, &stderr);
            if result.error.is_empty()
                && let Some(signal) = output.signal
            {
                result.error = format!("Process terminated by signal {signal}.");
            }
            Ok(result)
        }
        Err(e) if e.is_internal() => Err(e),
        Err(e) => Ok(ExecutionResult::failure(e.to_string())),
    }
}
