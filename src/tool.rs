//! Running external executables (archive extractor, OS installer).

use std::process::Command;

use tracing::debug;

use crate::error::DriverFetchError;

/// How an external tool finished.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ToolExit {
    /// Exit code, or `None` if the process was terminated by a signal.
    pub code: Option<i32>,
}

impl ToolExit {
    pub fn code(code: i32) -> Self {
        Self { code: Some(code) }
    }

    /// True if the tool exited with exactly `expected`.
    pub fn is(&self, expected: i32) -> bool {
        self.code == Some(expected)
    }
}

/// Capability to run an external program and wait for it.
pub trait ToolRunner {
    fn run(&self, program: &str, args: &[String]) -> Result<ToolExit, DriverFetchError>;
}

/// Runs tools as child processes sharing this process's stdio.
#[derive(Clone, Copy, Debug, Default)]
pub struct ProcessRunner;

impl ToolRunner for ProcessRunner {
    fn run(&self, program: &str, args: &[String]) -> Result<ToolExit, DriverFetchError> {
        debug!(program, ?args, "launching tool");
        let status = Command::new(program)
            .args(args)
            .status()
            .map_err(|source| DriverFetchError::Tool {
                program: program.to_string(),
                source,
            })?;
        debug!(program, status = ?status.code(), "tool finished");
        Ok(ToolExit {
            code: status.code(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_code_matching_is_exact() {
        assert!(ToolExit::code(0).is(0));
        assert!(!ToolExit::code(1).is(0));
        assert!(!ToolExit { code: None }.is(0));
    }

    #[test]
    fn missing_program_is_a_launch_error() {
        let err = ProcessRunner
            .run("driverfetch-no-such-program", &[])
            .expect_err("should fail");
        assert!(matches!(err, DriverFetchError::Tool { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn process_exit_status_is_reported() {
        let exit = ProcessRunner
            .run("sh", &["-c".to_string(), "exit 3".to_string()])
            .expect("run");
        assert_eq!(exit, ToolExit::code(3));
    }
}
