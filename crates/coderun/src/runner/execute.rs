//! Execution step for code running
//!
//! Runs the program, or the artifact the compile step left behind, with the
//! request's input on stdin.

use tracing::{debug, instrument};

use crate::isolation::{ProcessOutcome, ProcessOutput};
use crate::runner::{ExecutionError, PhaseContext};
use crate::types::Phase;

/// Execute the program in its workspace
#[instrument(skip(ctx, input), fields(language = %ctx.language.name, mode = %ctx.mode))]
pub(crate) async fn execute(
    ctx: &PhaseContext<'_>,
    input: &[u8],
) -> Result<ProcessOutput, ExecutionError> {
    let command = ctx.language.run_command();
    debug!(?command, "executing program");

    // An empty input still gets a pipe, so programs reading stdin see EOF
    let outcome = ctx
        .invoke(Phase::Run, command, Some(input), ctx.config.execution_timeout())
        .await?;

    match outcome {
        ProcessOutcome::Exited(output) => {
            debug!(
                exit_code = ?output.exit_code,
                signal = ?output.signal,
                "execution complete"
            );
            Ok(output)
        }
        ProcessOutcome::TimedOut => Err(ExecutionError::Timeout(Phase::Run)),
    }
}
