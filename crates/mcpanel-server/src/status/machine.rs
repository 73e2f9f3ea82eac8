//! The single owner of the managed process status.
//!
//! Every mutation goes through one `parking_lot` mutex and is pushed onto a
//! handoff channel while that lock is held, so the forwarder sees changes in
//! mutation order. The lock is never held across the control command, a
//! liveness probe, or a sleep.

use std::sync::Arc;
use std::time::Duration;

use mcpanel_core::{ActionRejected, ServerAction, ServerStatus};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info, info_span, warn};

use super::executor::{ActionError, ActionExecutor};
use super::probe::LivenessProbe;

/// Receiving end of the status handoff channel.
pub type StatusUpdates = mpsc::UnboundedReceiver<ServerStatus>;

/// Timing of the action protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusConfig {
    /// Upper bound on one control command invocation.
    pub action_timeout: Duration,
    /// Liveness probes attempted after a successful command.
    pub liveness_attempts: u32,
    /// Delay between liveness probes.
    pub liveness_interval: Duration,
}

impl Default for StatusConfig {
    fn default() -> Self {
        Self {
            action_timeout: Duration::from_secs(30),
            liveness_attempts: 120,
            liveness_interval: Duration::from_secs(1),
        }
    }
}

/// Result of one action attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionOutcome {
    /// The action that ran.
    pub action: ServerAction,
    /// Status the action resolved to.
    pub status: ServerStatus,
    /// `Ok` when the expected terminal condition was confirmed.
    pub result: Result<(), ActionError>,
}

impl ActionOutcome {
    /// Whether the action reached its target status.
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

/// Completion signal and cancel switch for an in-flight action.
pub struct ActionHandle {
    action: ServerAction,
    resume: ServerStatus,
    machine: Arc<StatusMachine>,
    join: JoinHandle<ActionOutcome>,
    cancel: CancellationToken,
}

impl ActionHandle {
    /// The action being run.
    pub fn action(&self) -> ServerAction {
        self.action
    }

    /// Ask the action to stop; it resolves to the status it started from.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Wait for the action to resolve.
    pub async fn wait(self) -> ActionOutcome {
        match self.join.await {
            Ok(outcome) => outcome,
            Err(e) => {
                let status = self.resume;
                let _ = self.machine.set_status(status);
                ActionOutcome {
                    action: self.action,
                    status,
                    result: Err(ActionError::Aborted(e.to_string())),
                }
            }
        }
    }
}

/// Owns the current [`ServerStatus`] and runs lifecycle actions.
pub struct StatusMachine {
    status: Mutex<ServerStatus>,
    handoff: mpsc::UnboundedSender<ServerStatus>,
    executor: Arc<dyn ActionExecutor>,
    probe: Arc<dyn LivenessProbe>,
    config: StatusConfig,
    cancel: CancellationToken,
}

impl StatusMachine {
    /// Create a machine at `initial` and the receiver for its status changes.
    pub fn new(
        initial: ServerStatus,
        executor: Arc<dyn ActionExecutor>,
        probe: Arc<dyn LivenessProbe>,
        config: StatusConfig,
    ) -> (Self, StatusUpdates) {
        let (handoff, updates) = mpsc::unbounded_channel();
        let machine = Self {
            status: Mutex::new(initial),
            handoff,
            executor,
            probe,
            config,
            cancel: CancellationToken::new(),
        };
        (machine, updates)
    }

    /// Probe once and map the answer to a stable status.
    pub async fn detect_initial(probe: &dyn LivenessProbe) -> ServerStatus {
        let status = ServerStatus::from_reachable(probe.is_reachable().await);
        info!(%status, "detected initial server status");
        status
    }

    /// Current status.
    pub fn status(&self) -> ServerStatus {
        *self.status.lock()
    }

    /// Set the status. Returns `false` (and emits nothing) if unchanged.
    pub fn set_status(&self, next: ServerStatus) -> bool {
        let mut current = self.status.lock();
        self.transition(&mut current, next)
    }

    /// Validate `action` against the guard table, enter its transitional
    /// status and run it in the background.
    ///
    /// The check and the transition happen under one lock acquisition, so two
    /// racing requests cannot both pass the guard. A failed or cancelled
    /// command reverts to the stable status seen here.
    pub fn request(self: &Arc<Self>, action: ServerAction) -> Result<ActionHandle, ActionRejected> {
        let resume = {
            let mut current = self.status.lock();
            if !action.permitted_from(*current) {
                debug!(%action, current = %*current, "action rejected by guard");
                return Err(ActionRejected {
                    action,
                    current: *current,
                });
            }
            let resume = *current;
            let _ = self.transition(&mut current, action.transitional_status());
            resume
        };

        let cancel = self.cancel.child_token();
        let machine = Arc::clone(self);
        let task_cancel = cancel.clone();
        let join = tokio::spawn(
            async move { machine.run_action(action, resume, task_cancel).await }
                .instrument(info_span!("action", %action)),
        );
        Ok(ActionHandle {
            action,
            resume,
            machine: Arc::clone(self),
            join,
            cancel,
        })
    }

    /// Correct drift between the recorded status and a fresh probe.
    ///
    /// Transitional statuses belong to a running action and are left alone.
    /// Returns the corrected status, if any.
    pub async fn reconcile(&self) -> Option<ServerStatus> {
        let observed = self.status();
        if observed.is_transitional() {
            debug!(status = %observed, "skipping reconcile during action");
            return None;
        }

        let expected = ServerStatus::from_reachable(self.probe.is_reachable().await);
        if expected == observed {
            return None;
        }

        let mut current = self.status.lock();
        if *current != observed {
            debug!(status = %*current, "status moved during probe, skipping reconcile");
            return None;
        }
        let _ = self.transition(&mut current, expected);
        info!(from = %observed, to = %expected, "reconciled status with liveness probe");
        Some(expected)
    }

    /// Cancel every in-flight action.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    fn transition(&self, current: &mut ServerStatus, next: ServerStatus) -> bool {
        if *current == next {
            return false;
        }
        let previous = std::mem::replace(current, next);
        if self.handoff.send(next).is_err() {
            debug!(status = %next, "status forwarder gone, change not broadcast");
        }
        info!(from = %previous, to = %next, "status changed");
        true
    }

    async fn run_action(
        &self,
        action: ServerAction,
        resume: ServerStatus,
        cancel: CancellationToken,
    ) -> ActionOutcome {
        let timeout = self.config.action_timeout;
        let invoked = tokio::select! {
            () = cancel.cancelled() => Err(ActionError::Cancelled),
            result = time::timeout(timeout, self.executor.execute(action)) => {
                result.unwrap_or(Err(ActionError::TimedOut(timeout)))
            }
        };
        if let Err(error) = invoked {
            warn!(%error, "control action failed");
            return self.settle(action, resume, Err(error));
        }

        match self.await_liveness(action.expects_reachable(), &cancel).await {
            Ok(()) => self.settle(action, action.target_status(), Ok(())),
            Err(ActionError::Cancelled) => {
                self.settle(action, resume, Err(ActionError::Cancelled))
            }
            Err(error) => {
                warn!(%error, "liveness confirmation failed");
                self.settle(action, ServerStatus::Offline, Err(error))
            }
        }
    }

    async fn await_liveness(
        &self,
        reachable: bool,
        cancel: &CancellationToken,
    ) -> Result<(), ActionError> {
        let attempts = self.config.liveness_attempts;
        for attempt in 1..=attempts {
            if self.probe.is_reachable().await == reachable {
                debug!(attempt, reachable, "liveness confirmed");
                return Ok(());
            }
            if attempt < attempts {
                tokio::select! {
                    () = cancel.cancelled() => return Err(ActionError::Cancelled),
                    () = time::sleep(self.config.liveness_interval) => {}
                }
            }
        }
        Err(ActionError::LivenessTimeout {
            expected: if reachable { "reachable" } else { "unreachable" },
            attempts,
        })
    }

    fn settle(
        &self,
        action: ServerAction,
        status: ServerStatus,
        result: Result<(), ActionError>,
    ) -> ActionOutcome {
        let _ = self.set_status(status);
        ActionOutcome {
            action,
            status,
            result,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use assert_matches::assert_matches;
    use async_trait::async_trait;

    use super::*;
    use crate::status::executor::{ActionOutput, MockActionExecutor};
    use crate::status::probe::MockLivenessProbe;

    fn config() -> StatusConfig {
        StatusConfig {
            action_timeout: Duration::from_secs(30),
            liveness_attempts: 3,
            liveness_interval: Duration::from_secs(1),
        }
    }

    fn machine(
        initial: ServerStatus,
        executor: impl ActionExecutor + 'static,
        probe: impl LivenessProbe + 'static,
    ) -> (Arc<StatusMachine>, StatusUpdates) {
        let (machine, updates) =
            StatusMachine::new(initial, Arc::new(executor), Arc::new(probe), config());
        (Arc::new(machine), updates)
    }

    fn succeeding() -> MockActionExecutor {
        let mut exec = MockActionExecutor::new();
        let _ = exec
            .expect_execute()
            .returning(|_| Ok(ActionOutput::default()));
        exec
    }

    fn failing() -> MockActionExecutor {
        let mut exec = MockActionExecutor::new();
        let _ = exec.expect_execute().returning(|_| {
            Err(ActionError::Failed {
                code: Some(1),
                output: "boom".into(),
            })
        });
        exec
    }

    fn reachable(answer: bool) -> MockLivenessProbe {
        let mut probe = MockLivenessProbe::new();
        let _ = probe.expect_is_reachable().returning(move || answer);
        probe
    }

    fn drain(updates: &mut StatusUpdates) -> Vec<ServerStatus> {
        let mut seen = Vec::new();
        while let Ok(status) = updates.try_recv() {
            seen.push(status);
        }
        seen
    }

    struct HangingExecutor;

    #[async_trait]
    impl ActionExecutor for HangingExecutor {
        async fn execute(&self, _action: ServerAction) -> Result<ActionOutput, ActionError> {
            time::sleep(Duration::from_secs(3600)).await;
            Ok(ActionOutput::default())
        }
    }

    #[tokio::test]
    async fn guard_table_decides_and_rejections_are_silent() {
        for current in ServerStatus::ALL {
            for action in ServerAction::ALL {
                let permitted = action.permitted_from(current);
                let mut exec = MockActionExecutor::new();
                let _ = exec
                    .expect_execute()
                    .times(usize::from(permitted))
                    .returning(|_| Ok(ActionOutput::default()));
                let (m, mut updates) =
                    machine(current, exec, reachable(action.expects_reachable()));

                match m.request(action) {
                    Ok(handle) => {
                        assert!(permitted, "{action} from {current} should be rejected");
                        assert_eq!(drain(&mut updates), vec![action.transitional_status()]);
                        let outcome = handle.wait().await;
                        assert!(outcome.is_success());
                    }
                    Err(rejected) => {
                        assert!(!permitted, "{action} from {current} should be accepted");
                        assert_eq!(rejected, ActionRejected { action, current });
                        assert_eq!(m.status(), current);
                        assert!(drain(&mut updates).is_empty());
                    }
                }
            }
        }
    }

    #[test]
    fn set_status_is_idempotent() {
        let (m, mut updates) = machine(ServerStatus::Offline, succeeding(), reachable(false));
        assert!(m.set_status(ServerStatus::Online));
        assert!(!m.set_status(ServerStatus::Online));
        assert!(!m.set_status(ServerStatus::Online));
        assert_eq!(drain(&mut updates), vec![ServerStatus::Online]);
    }

    #[tokio::test]
    async fn start_success_emits_starting_then_online() {
        let (m, mut updates) = machine(ServerStatus::Offline, succeeding(), reachable(true));
        let outcome = m.request(ServerAction::Start).unwrap().wait().await;

        assert_eq!(outcome.status, ServerStatus::Online);
        assert!(outcome.is_success());
        assert_eq!(
            drain(&mut updates),
            vec![ServerStatus::Starting, ServerStatus::Online]
        );
    }

    #[tokio::test]
    async fn start_failure_emits_starting_then_offline() {
        let mut probe = MockLivenessProbe::new();
        let _ = probe.expect_is_reachable().times(0);
        let (m, mut updates) = machine(ServerStatus::Offline, failing(), probe);
        let outcome = m.request(ServerAction::Start).unwrap().wait().await;

        assert_eq!(outcome.status, ServerStatus::Offline);
        assert_matches!(outcome.result, Err(ActionError::Failed { code: Some(1), .. }));
        assert_eq!(
            drain(&mut updates),
            vec![ServerStatus::Starting, ServerStatus::Offline]
        );
    }

    #[tokio::test]
    async fn failed_stop_reverts_to_online() {
        let (m, mut updates) = machine(ServerStatus::Online, failing(), reachable(true));
        let outcome = m.request(ServerAction::Stop).unwrap().wait().await;

        assert_eq!(outcome.status, ServerStatus::Online);
        assert_eq!(
            drain(&mut updates),
            vec![ServerStatus::Stopping, ServerStatus::Online]
        );
    }

    #[tokio::test]
    async fn stop_waits_for_unreachable() {
        let (m, mut updates) = machine(ServerStatus::Online, succeeding(), reachable(false));
        let outcome = m.request(ServerAction::Stop).unwrap().wait().await;

        assert_eq!(outcome.status, ServerStatus::Offline);
        assert_eq!(
            drain(&mut updates),
            vec![ServerStatus::Stopping, ServerStatus::Offline]
        );
    }

    #[tokio::test]
    async fn failed_restart_reverts_to_status_it_started_from() {
        for stable in [ServerStatus::Offline, ServerStatus::Online] {
            let mut probe = MockLivenessProbe::new();
            let _ = probe.expect_is_reachable().times(0);
            let (m, mut updates) = machine(stable, failing(), probe);
            let outcome = m.request(ServerAction::Restart).unwrap().wait().await;

            assert_eq!(outcome.status, stable);
            assert_eq!(m.status(), stable);
            assert_eq!(
                drain(&mut updates),
                vec![ServerStatus::Restarting, stable]
            );
        }
    }

    #[tokio::test]
    async fn restart_from_offline_comes_online() {
        let (m, mut updates) = machine(ServerStatus::Offline, succeeding(), reachable(true));
        let outcome = m.request(ServerAction::Restart).unwrap().wait().await;

        assert!(outcome.is_success());
        assert_eq!(
            drain(&mut updates),
            vec![ServerStatus::Restarting, ServerStatus::Online]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn liveness_polls_until_reachable() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);
        let mut probe = MockLivenessProbe::new();
        let _ = probe
            .expect_is_reachable()
            .returning(move || counter.fetch_add(1, Ordering::SeqCst) + 1 >= 3);

        let (m, mut updates) = machine(ServerStatus::Offline, succeeding(), probe);
        let started = time::Instant::now();
        let outcome = m.request(ServerAction::Start).unwrap().wait().await;

        assert!(outcome.is_success());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(started.elapsed(), Duration::from_secs(2));
        assert_eq!(
            drain(&mut updates),
            vec![ServerStatus::Starting, ServerStatus::Online]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_liveness_budget_resolves_offline() {
        let mut probe = MockLivenessProbe::new();
        let _ = probe.expect_is_reachable().times(3).returning(|| false);
        let (m, mut updates) = machine(ServerStatus::Online, succeeding(), probe);
        let outcome = m.request(ServerAction::Restart).unwrap().wait().await;

        assert_eq!(outcome.status, ServerStatus::Offline);
        assert_matches!(
            outcome.result,
            Err(ActionError::LivenessTimeout {
                expected: "reachable",
                attempts: 3
            })
        );
        assert_eq!(
            drain(&mut updates),
            vec![ServerStatus::Restarting, ServerStatus::Offline]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn hung_command_times_out() {
        let (m, mut updates) = machine(ServerStatus::Offline, HangingExecutor, reachable(true));
        let outcome = m.request(ServerAction::Start).unwrap().wait().await;

        assert_eq!(outcome.status, ServerStatus::Offline);
        assert_eq!(
            outcome.result,
            Err(ActionError::TimedOut(Duration::from_secs(30)))
        );
        assert_eq!(
            drain(&mut updates),
            vec![ServerStatus::Starting, ServerStatus::Offline]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_reverts_to_status_it_started_from() {
        let (m, mut updates) = machine(ServerStatus::Online, HangingExecutor, reachable(true));
        let handle = m.request(ServerAction::Stop).unwrap();
        assert_eq!(handle.action(), ServerAction::Stop);
        handle.cancel();
        let outcome = handle.wait().await;

        assert_eq!(outcome.result, Err(ActionError::Cancelled));
        assert_eq!(m.status(), ServerStatus::Online);
        assert_eq!(
            drain(&mut updates),
            vec![ServerStatus::Stopping, ServerStatus::Online]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_cancels_inflight_actions() {
        let (m, _updates) = machine(ServerStatus::Offline, HangingExecutor, reachable(true));
        let handle = m.request(ServerAction::Start).unwrap();
        m.shutdown();
        assert_eq!(handle.wait().await.result, Err(ActionError::Cancelled));
        assert_eq!(m.status(), ServerStatus::Offline);
    }

    #[tokio::test]
    async fn second_request_sees_transitional_status() {
        let (m, _updates) = machine(ServerStatus::Offline, HangingExecutor, reachable(true));
        let _first = m.request(ServerAction::Start).unwrap();
        let Err(rejected) = m.request(ServerAction::Start) else {
            panic!("second start must be rejected");
        };
        assert_eq!(rejected.current, ServerStatus::Starting);
        m.shutdown();
    }

    #[tokio::test]
    async fn reconcile_corrects_offline_to_online() {
        let (m, mut updates) = machine(ServerStatus::Offline, succeeding(), reachable(true));
        assert_eq!(m.reconcile().await, Some(ServerStatus::Online));
        assert_eq!(m.status(), ServerStatus::Online);
        assert_eq!(drain(&mut updates), vec![ServerStatus::Online]);
    }

    #[tokio::test]
    async fn reconcile_corrects_online_to_offline() {
        let (m, mut updates) = machine(ServerStatus::Online, succeeding(), reachable(false));
        assert_eq!(m.reconcile().await, Some(ServerStatus::Offline));
        assert_eq!(drain(&mut updates), vec![ServerStatus::Offline]);
    }

    #[tokio::test]
    async fn reconcile_noop_when_consistent() {
        let (m, mut updates) = machine(ServerStatus::Online, succeeding(), reachable(true));
        assert_eq!(m.reconcile().await, None);
        assert!(drain(&mut updates).is_empty());
    }

    #[tokio::test]
    async fn reconcile_skips_transitional() {
        let mut probe = MockLivenessProbe::new();
        let _ = probe.expect_is_reachable().times(0);
        let (m, mut updates) = machine(ServerStatus::Stopping, succeeding(), probe);
        assert_eq!(m.reconcile().await, None);
        assert!(drain(&mut updates).is_empty());
    }

    #[tokio::test]
    async fn detect_initial_maps_reachability() {
        assert_eq!(
            StatusMachine::detect_initial(&reachable(true)).await,
            ServerStatus::Online
        );
        assert_eq!(
            StatusMachine::detect_initial(&reachable(false)).await,
            ServerStatus::Offline
        );
    }
}
