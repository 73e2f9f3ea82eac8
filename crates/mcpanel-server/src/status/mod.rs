//! Server status ownership and the start/stop/restart protocol.

mod executor;
mod feed;
mod machine;
mod probe;
mod reconcile;
mod simulated;

pub use executor::{ActionError, ActionExecutor, ActionOutput, CommandExecutor};
pub use feed::{StatusFeed, run_status_forwarder};
pub use machine::{ActionHandle, ActionOutcome, StatusConfig, StatusMachine, StatusUpdates};
pub use probe::{LivenessProbe, TcpProbe};
pub use reconcile::run_reconciler;
pub use simulated::SimulatedProcess;
