use std::ffi::OsStr;
use std::process::Stdio;

use tokio::io::AsyncWriteExt;
use tokio::process::Command;

/// Errors from running an external CLI such as `docker` or `kubectl`.
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error("command failed to start ({command}): {source}")]
    Io {
        command: String,
        #[source]
        source: std::io::Error,
    },
    #[error("command returned non-zero exit ({command}) status={status:?}: {stderr}")]
    Failed {
        command: String,
        status: Option<i32>,
        stderr: String,
    },
}

impl CommandError {
    pub fn stderr(&self) -> Option<&str> {
        match self {
            CommandError::Failed { stderr, .. } => Some(stderr),
            CommandError::Io { .. } => None,
        }
    }
}

/// A CLI binary plus the arguments and environment for one invocation.
pub(crate) struct CliCommand {
    command: Command,
    rendered: String,
    stdin: Option<String>,
    merge_stderr: bool,
}

impl CliCommand {
    pub(crate) fn new(binary: impl AsRef<OsStr>) -> Self {
        let binary = binary.as_ref();
        Self {
            command: Command::new(binary),
            rendered: binary.to_string_lossy().to_string(),
            stdin: None,
            merge_stderr: false,
        }
    }

    pub(crate) fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        let arg = arg.as_ref();
        self.rendered.push(' ');
        self.rendered.push_str(&arg.to_string_lossy());
        self.command.arg(arg);
        self
    }

    pub(crate) fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        for arg in args {
            self = self.arg(arg);
        }
        self
    }

    /// Set an environment variable for the child without showing its value in logs.
    pub(crate) fn env(mut self, key: &str, value: &str) -> Self {
        self.command.env(key, value);
        self
    }

    pub(crate) fn stdin(mut self, input: String) -> Self {
        self.stdin = Some(input);
        self
    }

    /// Append the child's stderr to the returned output, for commands like `docker logs` that
    /// replay a stream the child wrote to either.
    pub(crate) fn merge_stderr(mut self) -> Self {
        self.merge_stderr = true;
        self
    }

    /// Run to completion and return stdout, failing on a non-zero exit.
    pub(crate) async fn output(mut self) -> Result<String, CommandError> {
        log::debug!("Running: {}", self.rendered);

        self.command
            .stdin(if self.stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = self.command.spawn().map_err(|source| CommandError::Io {
            command: self.rendered.clone(),
            source,
        })?;

        if let (Some(input), Some(mut pipe)) = (self.stdin.take(), child.stdin.take()) {
            pipe.write_all(input.as_bytes())
                .await
                .map_err(|source| CommandError::Io {
                    command: self.rendered.clone(),
                    source,
                })?;
            // Dropping the pipe closes stdin so the child sees EOF
            drop(pipe);
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(|source| CommandError::Io {
                command: self.rendered.clone(),
                source,
            })?;

        let mut stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();

        if !output.status.success() {
            return Err(CommandError::Failed {
                command: self.rendered,
                status: output.status.code(),
                stderr,
            });
        }

        if self.merge_stderr && !stderr.is_empty() {
            if !stdout.is_empty() && !stdout.ends_with('\n') {
                stdout.push('\n');
            }
            stdout.push_str(&stderr);
        }

        log::trace!("Output of {}: {}", self.rendered, stdout);
        Ok(stdout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(unix)]
    #[tokio::test]
    async fn stdout_is_returned() {
        let out = CliCommand::new("sh")
            .args(["-c", "echo $GREETING"])
            .env("GREETING", "hello")
            .output()
            .await
            .unwrap();

        assert_eq!("hello\n", out);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn stdin_is_forwarded() {
        let out = CliCommand::new("cat")
            .stdin("apiVersion: v1".to_string())
            .output()
            .await
            .unwrap();

        assert_eq!("apiVersion: v1", out);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn non_zero_exit_keeps_stderr() {
        let err = CliCommand::new("sh")
            .args(["-c", "echo 'namespace already exists' >&2; exit 1"])
            .output()
            .await
            .unwrap_err();

        assert_eq!(Some("namespace already exists"), err.stderr());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn merged_stderr_is_appended() {
        let out = CliCommand::new("sh")
            .args(["-c", "echo starting; echo FAILURE >&2"])
            .merge_stderr()
            .output()
            .await
            .unwrap();

        assert_eq!("starting\nFAILURE", out);
    }

    #[tokio::test]
    async fn missing_binary_is_an_io_error() {
        let err = CliCommand::new("hangar-definitely-not-installed")
            .output()
            .await
            .unwrap_err();

        assert!(matches!(err, CommandError::Io { .. }));
    }
}
