//! `CommandRunner` that spawns `sh -c` with a hard timeout.

use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::domain::ports::{CommandOutput, CommandRunner, ProcessError};

/// Runs commands through the platform shell.
///
/// On unix each command gets its own process group so a timeout kills the
/// whole tree (dev servers, watchers) rather than just the shell.
#[derive(Debug, Clone, Copy, Default)]
pub struct ShellCommandRunner;

impl ShellCommandRunner {
    /// Runner with no environment overrides.
    pub const fn new() -> Self {
        Self
    }

    fn shell_command(command: &str) -> Command {
        #[cfg(unix)]
        {
            let mut cmd = Command::new("sh");
            cmd.arg("-c").arg(command);
            cmd.process_group(0);
            cmd
        }
        #[cfg(not(unix))]
        {
            let mut cmd = Command::new("cmd");
            cmd.arg("/C").arg(command);
            cmd
        }
    }
}

#[async_trait]
impl CommandRunner for ShellCommandRunner {
    async fn run(
        &self,
        command: &str,
        cwd: &Path,
        limit: Duration,
    ) -> Result<CommandOutput, ProcessError> {
        if command.trim().is_empty() {
            return Err(ProcessError::EmptyCommand);
        }

        debug!(command = %command, cwd = %cwd.display(), timeout_secs = limit.as_secs(), "Running command");
        let started = Instant::now();

        let child = Self::shell_command(command)
            .current_dir(cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| ProcessError::Spawn {
                command: command.to_string(),
                source,
            })?;
        let pid = child.id();

        match timeout(limit, child.wait_with_output()).await {
            Ok(Ok(output)) => {
                let result = CommandOutput {
                    exit_code: output.status.code(),
                    stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                    stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
                    duration_ms: elapsed_ms(started),
                    timed_out: false,
                };
                debug!(
                    command = %command,
                    exit_code = ?result.exit_code,
                    duration_ms = result.duration_ms,
                    "Command finished"
                );
                Ok(result)
            }
            Ok(Err(source)) => Err(ProcessError::Spawn {
                command: command.to_string(),
                source,
            }),
            Err(_) => {
                kill_process_group(pid);
                warn!(command = %command, timeout_secs = limit.as_secs(), "Command timed out");
                Ok(CommandOutput {
                    exit_code: None,
                    stdout: String::new(),
                    stderr: format!("Command timed out after {}s", limit.as_secs()),
                    duration_ms: elapsed_ms(started),
                    timed_out: true,
                })
            }
        }
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

#[cfg(unix)]
fn kill_process_group(pid: Option<u32>) {
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    let Some(pid) = pid.and_then(|p| i32::try_from(p).ok()) else {
        return;
    };
    if let Err(e) = killpg(Pid::from_raw(pid), Signal::SIGKILL) {
        debug!(pid, error = %e, "Process group already gone");
    }
}

#[cfg(not(unix))]
fn kill_process_group(_pid: Option<u32>) {}
