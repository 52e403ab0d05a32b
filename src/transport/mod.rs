//! CJ-010: Process transport — runs generator and packaging executables.

pub mod local;

use crate::core::error::Result;
use std::path::Path;

/// Output from running an external program.
#[derive(Debug, Clone)]
pub struct ExecOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl ExecOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Short failure description: exit code plus the last stderr line.
    pub fn failure_message(&self) -> String {
        let detail = self
            .stderr
            .lines()
            .rev()
            .find(|l| !l.trim().is_empty())
            .or_else(|| self.stdout.lines().rev().find(|l| !l.trim().is_empty()));
        match detail {
            Some(line) => format!("exit code {}: {}", self.exit_code, line.trim()),
            None => format!("exit code {}", self.exit_code),
        }
    }
}

/// Run `program args...` in `working_dir` and capture its output.
pub fn exec_command(program: &str, args: &[String], working_dir: &Path) -> Result<ExecOutput> {
    local::exec_local(program, args, working_dir)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cj010_exec_output_success() {
        let ok = ExecOutput { exit_code: 0, stdout: "ok".into(), stderr: "".into() };
        assert!(ok.success());
        let fail = ExecOutput { exit_code: 1, stdout: "".into(), stderr: "err".into() };
        assert!(!fail.success());
    }

    #[test]
    fn test_cj010_failure_message_uses_last_stderr_line() {
        let out = ExecOutput {
            exit_code: 2,
            stdout: "building\n".into(),
            stderr: "warning: x\nerror: bad input\n\n".into(),
        };
        assert_eq!(out.failure_message(), "exit code 2: error: bad input");
        let quiet = ExecOutput { exit_code: 3, stdout: "".into(), stderr: "".into() };
        assert_eq!(quiet.failure_message(), "exit code 3");
    }

    #[cfg(unix)]
    #[test]
    fn test_cj010_exec_command_delegates() {
        let dir = tempfile::tempdir().unwrap();
        let out = exec_command("pwd", &[], dir.path()).unwrap();
        assert!(out.success());
        let printed = std::fs::canonicalize(out.stdout.trim()).unwrap();
        assert_eq!(printed, std::fs::canonicalize(dir.path()).unwrap());
    }
}
