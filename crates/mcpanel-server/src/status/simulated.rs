//! In-memory managed process for development and tests.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use mcpanel_core::ServerAction;
use tracing::info;

use super::executor::{ActionError, ActionExecutor, ActionOutput};
use super::probe::LivenessProbe;

/// Pretends to be the managed process: actions flip a running flag after a
/// delay and the probe reports that flag.
pub struct SimulatedProcess {
    running: AtomicBool,
    delay: Duration,
}

impl SimulatedProcess {
    /// Create a stand-in that takes `delay` per action.
    pub fn new(delay: Duration, running: bool) -> Self {
        Self {
            running: AtomicBool::new(running),
            delay,
        }
    }

    /// Whether the simulated process is up.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Flip the running flag out-of-band, as a crash or manual start would.
    pub fn set_running(&self, running: bool) {
        self.running.store(running, Ordering::Release);
    }
}

#[async_trait]
impl ActionExecutor for SimulatedProcess {
    async fn execute(&self, action: ServerAction) -> Result<ActionOutput, ActionError> {
        tokio::time::sleep(self.delay).await;
        self.set_running(action.expects_reachable());
        info!(%action, "simulated control action");
        Ok(ActionOutput {
            output: format!("simulated {action}"),
        })
    }
}

#[async_trait]
impl LivenessProbe for SimulatedProcess {
    async fn is_reachable(&self) -> bool {
        self.is_running()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn actions_flip_running_after_delay() {
        let sim = SimulatedProcess::new(Duration::from_secs(2), false);
        let start = tokio::time::Instant::now();

        let out = sim.execute(ServerAction::Start).await.unwrap();
        assert_eq!(out.output, "simulated start");
        assert_eq!(start.elapsed(), Duration::from_secs(2));
        assert!(sim.is_reachable().await);

        let _ = sim.execute(ServerAction::Stop).await.unwrap();
        assert!(!sim.is_reachable().await);

        let _ = sim.execute(ServerAction::Restart).await.unwrap();
        assert!(sim.is_running());
    }

    #[tokio::test]
    async fn out_of_band_changes_are_observed() {
        let sim = SimulatedProcess::new(Duration::ZERO, true);
        sim.set_running(false);
        assert!(!sim.is_reachable().await);
    }
}
