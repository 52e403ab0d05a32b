//! CJ-010: Local process execution.

use super::ExecOutput;
use crate::core::error::{Error, Result};
use std::path::Path;
use std::process::{Command, Stdio};
use tracing::debug;

/// Spawn `program` with `args` in `working_dir`, waiting for it to exit.
/// The child's stdin is closed so interactive prompts fail instead of hanging.
pub fn exec_local(program: &str, args: &[String], working_dir: &Path) -> Result<ExecOutput> {
    debug!(program, ?args, cwd = %working_dir.display(), "spawning process");
    let output = Command::new(program)
        .args(args)
        .current_dir(working_dir)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .map_err(|e| Error::io("cannot spawn", program, e))?;

    Ok(ExecOutput {
        exit_code: output.status.code().unwrap_or(-1),
        stdout: String::from_utf8_lossy(&output.stdout).to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).to_string(),
    })
}
