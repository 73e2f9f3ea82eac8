//! # mcpanel
//!
//! Panel binary: loads settings, picks the process executor and probe, and
//! runs the HTTP/WebSocket server until Ctrl-C.

#![deny(unsafe_code)]

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use mcpanel_core::logging::init_subscriber;
use mcpanel_server::status::{
    ActionExecutor, CommandExecutor, LivenessProbe, SimulatedProcess, TcpProbe,
};
use mcpanel_server::{PanelServer, ServerConfig};
use mcpanel_settings::{ExecutorKind, PanelSettings, ProcessSettings};

/// Grace period for background tasks and the HTTP server on shutdown.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Game server control panel.
#[derive(Parser, Debug)]
#[command(name = "mcpanel", about = "Game server control panel")]
struct Cli {
    /// Settings file (defaults to `~/.mcpanel/settings.json`).
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Host to bind (overrides settings).
    #[arg(long)]
    host: Option<String>,

    /// Port to bind (overrides settings).
    #[arg(long)]
    port: Option<u16>,

    /// Process executor: `simulated` or `command` (overrides settings).
    #[arg(long, value_parser = parse_executor)]
    executor: Option<ExecutorKind>,
}

impl Cli {
    fn apply(self, settings: &mut PanelSettings) {
        if let Some(host) = self.host {
            settings.server.host = host;
        }
        if let Some(port) = self.port {
            settings.server.port = port;
        }
        if let Some(executor) = self.executor {
            settings.process.executor = executor;
        }
    }
}

fn parse_executor(value: &str) -> Result<ExecutorKind, String> {
    match value.to_ascii_lowercase().as_str() {
        "simulated" => Ok(ExecutorKind::Simulated),
        "command" => Ok(ExecutorKind::Command),
        other => Err(format!("unknown executor {other:?}, expected simulated or command")),
    }
}

/// Build the executor and probe once; the rest of the panel only sees traits.
fn process_backend(
    process: &ProcessSettings,
) -> (Arc<dyn ActionExecutor>, Arc<dyn LivenessProbe>) {
    match process.executor {
        ExecutorKind::Command => {
            let executor: Arc<dyn ActionExecutor> = Arc::new(CommandExecutor::new(
                process.control_program.clone(),
                process.control_args.clone(),
            ));
            let probe: Arc<dyn LivenessProbe> = Arc::new(TcpProbe::new(
                process.address.clone(),
                Duration::from_millis(process.probe_timeout_ms),
            ));
            (executor, probe)
        }
        ExecutorKind::Simulated => {
            let sim = Arc::new(SimulatedProcess::new(
                Duration::from_millis(process.simulated_delay_ms),
                false,
            ));
            let executor: Arc<dyn ActionExecutor> = sim.clone();
            let probe: Arc<dyn LivenessProbe> = sim;
            (executor, probe)
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let settings_path = cli
        .settings
        .clone()
        .unwrap_or_else(mcpanel_settings::settings_path);
    let mut settings = mcpanel_settings::load_settings_from_path(&settings_path)
        .with_context(|| format!("Failed to load settings from {}", settings_path.display()))?;
    cli.apply(&mut settings);
    settings.validate().context("Invalid settings")?;

    init_subscriber(&settings.logging.level, settings.logging.format);
    tracing::info!(
        path = %settings_path.display(),
        executor = ?settings.process.executor,
        "settings loaded"
    );

    let (executor, probe) = process_backend(&settings.process);
    let server = PanelServer::build(ServerConfig::from(&settings), executor, probe).await;
    server.spawn_background();

    let (addr, handle) = server.listen().await.context("Failed to bind server")?;
    tracing::info!("mcpanel listening on http://{addr}");

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl-c")?;

    tracing::info!("Shutting down...");
    server.graceful_shutdown(Some(SHUTDOWN_GRACE)).await;
    if tokio::time::timeout(SHUTDOWN_GRACE, handle).await.is_err() {
        tracing::warn!("http server did not drain in time");
    }

    tracing::info!("Shutdown complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_defaults_leave_settings_alone() {
        let cli = Cli::parse_from(["mcpanel"]);
        let mut settings = PanelSettings::default();
        cli.apply(&mut settings);
        assert_eq!(settings.server.port, 4000);
        assert_eq!(settings.process.executor, ExecutorKind::Simulated);
    }

    #[test]
    fn cli_overrides_settings() {
        let cli = Cli::parse_from([
            "mcpanel",
            "--host",
            "127.0.0.1",
            "--port",
            "8080",
            "--executor",
            "Command",
        ]);
        let mut settings = PanelSettings::default();
        cli.apply(&mut settings);
        assert_eq!(settings.server.host, "127.0.0.1");
        assert_eq!(settings.server.port, 8080);
        assert_eq!(settings.process.executor, ExecutorKind::Command);
    }

    #[test]
    fn unknown_executor_is_rejected() {
        assert!(Cli::try_parse_from(["mcpanel", "--executor", "docker"]).is_err());
    }

    #[tokio::test]
    async fn simulated_backend_shares_one_process() {
        let (executor, probe) = process_backend(&ProcessSettings {
            simulated_delay_ms: 0,
            ..ProcessSettings::default()
        });
        assert!(!probe.is_reachable().await);
        let _ = executor
            .execute(mcpanel_core::ServerAction::Start)
            .await
            .unwrap();
        assert!(probe.is_reachable().await);
    }
}
