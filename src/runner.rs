//! Command execution capability.

use std::io;
use std::process::{Command, Stdio};

use tracing::debug;

/// Runs an external program and hands back whatever it printed on stdout.
///
/// Exit status is deliberately not part of the contract: callers treat the
/// output as best-effort text and check for side effects themselves.
pub trait CommandRunner: Send + Sync {
    fn run(&self, program: &str, args: &[&str]) -> io::Result<String>;
}

/// Runs programs on the host via `std::process::Command`
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&self, program: &str, args: &[&str]) -> io::Result<String> {
        debug!(program, ?args, "running command");

        let output = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stderr(Stdio::null())
            .output()?;

        if !output.status.success() {
            debug!(program, status = ?output.status, "command exited unsuccessfully");
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(unix)]
    #[test]
    fn test_captures_stdout() {
        let out = SystemRunner.run("echo", &["user.name=Alice"]).unwrap();
        assert_eq!(out.trim(), "user.name=Alice");
    }

    #[test]
    fn test_missing_program_is_error() {
        assert!(SystemRunner.run("gitswitch-no-such-program", &[]).is_err());
    }
}
