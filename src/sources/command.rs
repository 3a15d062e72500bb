use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::gateway::CredentialConfig;
use crate::errors::CredentialError;
use crate::sources::fetch::CredentialFetcher;

pub const COMMAND_ERROR_PREFIX: &str = "credential command";

/// Obtains a credential by running a fixed external program.
///
/// Program and arguments come from the service configuration only. Its stdout
/// is handed to the cache as is; stdout and stderr never end up in errors or logs.
#[derive(Debug, Clone)]
pub struct CommandFetcher {
    program: PathBuf,
    args: Vec<String>,
    timeout: Duration,
}

impl CommandFetcher {
    pub fn new(program: impl Into<PathBuf>, args: Vec<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            args,
            timeout,
        }
    }

    pub fn from_config(config: &CredentialConfig) -> Self {
        Self::new(
            &config.command,
            config.args.clone(),
            Duration::from_secs(config.fetch_timeout_seconds),
        )
    }
}

impl CredentialFetcher for CommandFetcher {
    async fn execute(&self, cancel: &CancellationToken) -> Result<Vec<u8>, CredentialError> {
        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        info!(program = %self.program.display(), "running credential command");
        let child = command.spawn().map_err(|err| {
            CredentialError::Fetch(format!("{COMMAND_ERROR_PREFIX} failed to start: {}", err.kind()))
        })?;

        // dropping the wait future kills the child
        let output = tokio::select! {
            _ = cancel.cancelled() => {
                return Err(CredentialError::Fetch(format!("{COMMAND_ERROR_PREFIX} canceled")));
            }
            waited = tokio::time::timeout(self.timeout, child.wait_with_output()) => match waited {
                Err(_) => {
                    return Err(CredentialError::Fetch(format!(
                        "{COMMAND_ERROR_PREFIX} timed out after {:?}",
                        self.timeout
                    )));
                }
                Ok(Err(err)) => {
                    return Err(CredentialError::Fetch(format!("{COMMAND_ERROR_PREFIX} failed: {}", err.kind())));
                }
                Ok(Ok(output)) => output,
            },
        };

        debug!(
            stdout_bytes = output.stdout.len(),
            stderr_bytes = output.stderr.len(),
            "credential command finished"
        );

        if !output.status.success() {
            return Err(CredentialError::Fetch(format!(
                "{COMMAND_ERROR_PREFIX} {}",
                describe_exit(output.status)
            )));
        }
        Ok(output.stdout)
    }
}

fn describe_exit(status: ExitStatus) -> String {
    match status.code() {
        Some(code) => format!("exited with status {code}"),
        None => "terminated by signal".to_owned(),
    }
}
