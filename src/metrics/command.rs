//! External helper commands used by some probes.

use std::io::ErrorKind;
use std::process::Command;
use tracing::debug;

/// Consecutive failed runs after which a command is no longer spawned.
pub const MAX_CONSECUTIVE_FAILURES: u32 = 3;

/// A command whose stdout feeds a probe.
///
/// A program that is not installed is never spawned again. One that is
/// installed but keeps failing is given up on after
/// [`MAX_CONSECUTIVE_FAILURES`] runs in a row; a success resets the count.
#[derive(Debug, Clone)]
pub struct CommandProbe {
    program: String,
    args: Vec<String>,
    missing: bool,
    failures: u32,
}

impl CommandProbe {
    pub fn new<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
            missing: false,
            failures: 0,
        }
    }

    /// Run a PowerShell snippet without loading the user profile.
    pub fn powershell(script: impl Into<String>) -> Self {
        Self::new(
            "powershell",
            [
                "-NoProfile".to_string(),
                "-NonInteractive".to_string(),
                "-Command".to_string(),
                script.into(),
            ],
        )
    }

    /// Whether the program was found to be absent.
    pub fn is_missing(&self) -> bool {
        self.missing
    }

    /// Whether the command will no longer be spawned.
    pub fn is_disabled(&self) -> bool {
        self.missing || self.failures >= MAX_CONSECUTIVE_FAILURES
    }

    /// Run the command, returning stdout on a zero exit status.
    pub fn run(&mut self) -> Option<String> {
        if self.is_disabled() {
            return None;
        }

        match Command::new(&self.program).args(&self.args).output() {
            Ok(output) if output.status.success() => {
                self.failures = 0;
                Some(String::from_utf8_lossy(&output.stdout).into_owned())
            }
            Ok(output) => {
                debug!(
                    program = %self.program,
                    status = %output.status,
                    "helper command failed"
                );
                self.record_failure();
                None
            }
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!(program = %self.program, "helper command not installed");
                self.missing = true;
                None
            }
            Err(err) => {
                debug!(program = %self.program, error = %err, "helper command could not start");
                self.record_failure();
                None
            }
        }
    }

    fn record_failure(&mut self) {
        self.failures += 1;
        if self.failures == MAX_CONSECUTIVE_FAILURES {
            debug!(
                program = %self.program,
                failures = self.failures,
                "helper command keeps failing; disabled"
            );
        }
    }
}
