//! Child process invocation shared by the CLI adapters.

use std::process::Stdio;

use tokio::process::Command;
use tracing::debug;

use scalegrid_executor::{ExecError, ExecResult};

/// Run `program` with `args` and return its stdout.
///
/// A non-zero exit status is a backend failure carrying stderr (or stdout
/// when stderr is empty). The child is killed if the returned future is
/// dropped, so an expired timeout does not leave it running.
pub(crate) async fn run(program: &str, args: &[String]) -> ExecResult<String> {
    debug!(%program, ?args, "running command");

    let output = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|e| ExecError::Backend(format!("failed to run {program}: {e}")))?;

    let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        let cause = if stderr.is_empty() { stdout } else { stderr };
        return Err(ExecError::Backend(format!(
            "{program} exited with {}: {cause}",
            output.status
        )));
    }
    Ok(stdout)
}
