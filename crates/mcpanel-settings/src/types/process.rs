//! Managed process control settings.

use serde::{Deserialize, Serialize};

/// How lifecycle actions are carried out.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutorKind {
    /// In-memory stand-in; nothing is spawned.
    #[default]
    Simulated,
    /// Run the configured control command.
    Command,
}

/// Settings for driving and probing the managed process.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProcessSettings {
    /// `host:port` the process listens on; used by the liveness probe.
    pub address: String,
    /// Which executor to use.
    pub executor: ExecutorKind,
    /// Program invoked for actions.
    pub control_program: String,
    /// Arguments placed before the action name.
    pub control_args: Vec<String>,
    /// Upper bound on one control command invocation.
    pub action_timeout_ms: u64,
    /// Connect timeout of a single liveness probe.
    pub probe_timeout_ms: u64,
    /// Probes attempted after an action before giving up.
    pub liveness_attempts: u32,
    /// Delay between liveness probes.
    pub liveness_interval_ms: u64,
    /// Period of the status/reachability reconciliation pass.
    pub reconcile_interval_secs: u64,
    /// Delay of the simulated executor.
    pub simulated_delay_ms: u64,
}

impl Default for ProcessSettings {
    fn default() -> Self {
        Self {
            address: "127.0.0.1:25565".to_string(),
            executor: ExecutorKind::Simulated,
            control_program: "sudo".to_string(),
            control_args: vec!["/opt/mcpanel/minecraft-server.sh".to_string()],
            action_timeout_ms: 30_000,
            probe_timeout_ms: 3_000,
            liveness_attempts: 120,
            liveness_interval_ms: 1_000,
            reconcile_interval_secs: 30,
            simulated_delay_ms: 2_000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let s = ProcessSettings::default();
        assert_eq!(s.address, "127.0.0.1:25565");
        assert_eq!(s.executor, ExecutorKind::Simulated);
        assert_eq!(s.liveness_attempts, 120);
        assert_eq!(s.liveness_interval_ms, 1_000);
        assert_eq!(s.probe_timeout_ms, 3_000);
    }

    #[test]
    fn executor_kind_wire_values() {
        let kind: ExecutorKind = serde_json::from_str("\"command\"").unwrap();
        assert_eq!(kind, ExecutorKind::Command);
        assert_eq!(
            serde_json::to_string(&ExecutorKind::Simulated).unwrap(),
            "\"simulated\""
        );
    }

    #[test]
    fn control_args_replace_not_merge() {
        let s: ProcessSettings =
            serde_json::from_str(r#"{"controlArgs": ["systemctl"]}"#).unwrap();
        assert_eq!(s.control_args, vec!["systemctl"]);
        assert_eq!(s.control_program, "sudo");
    }
}
