//! External control actions.
//!
//! The executor is chosen once at startup; the state machine only sees the
//! [`ActionExecutor`] trait.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use mcpanel_core::ServerAction;
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, info};

/// Captured output of a successful control action.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActionOutput {
    /// Combined stdout and stderr.
    pub output: String,
}

/// Why an action did not complete.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ActionError {
    /// The control command could not be started.
    #[error("failed to spawn control command: {0}")]
    Spawn(String),
    /// The control command ran and reported failure.
    #[error("control command exited with {code:?}: {output}")]
    Failed {
        /// Exit code, if the process exited normally.
        code: Option<i32>,
        /// Combined stdout and stderr.
        output: String,
    },
    /// The control command did not finish in time.
    #[error("control command timed out after {0:?}")]
    TimedOut(Duration),
    /// The process never reached the expected reachability.
    #[error("process not {expected} after {attempts} liveness probes")]
    LivenessTimeout {
        /// `"reachable"` or `"unreachable"`.
        expected: &'static str,
        /// Probes attempted.
        attempts: u32,
    },
    /// The action was cancelled before completing.
    #[error("action cancelled")]
    Cancelled,
    /// The action task ended abnormally.
    #[error("action task aborted: {0}")]
    Aborted(String),
}

/// Carries out a lifecycle action against the managed process.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ActionExecutor: Send + Sync {
    /// Run `action`. Non-zero exits are errors.
    async fn execute(&self, action: ServerAction) -> Result<ActionOutput, ActionError>;
}

/// Runs `<program> <args...> <action>` and waits for it to exit.
pub struct CommandExecutor {
    program: String,
    args: Vec<String>,
}

impl CommandExecutor {
    /// Create an executor for `program` with leading `args`.
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    fn command(&self, action: ServerAction) -> Command {
        let mut cmd = Command::new(&self.program);
        let _ = cmd
            .args(&self.args)
            .arg(action.as_str())
            .stdin(Stdio::null())
            .kill_on_drop(true);
        cmd
    }
}

#[async_trait]
impl ActionExecutor for CommandExecutor {
    async fn execute(&self, action: ServerAction) -> Result<ActionOutput, ActionError> {
        debug!(program = %self.program, %action, "spawning control command");
        let output = self
            .command(action)
            .output()
            .await
            .map_err(|e| ActionError::Spawn(e.to_string()))?;

        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        combined.push_str(&String::from_utf8_lossy(&output.stderr));

        if output.status.success() {
            info!(%action, "control command succeeded");
            Ok(ActionOutput { output: combined })
        } else {
            Err(ActionError::Failed {
                code: output.status.code(),
                output: combined,
            })
        }
    }
}
