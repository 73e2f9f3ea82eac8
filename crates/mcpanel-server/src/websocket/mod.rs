//! Real-time event hub: connections, pumps, routing and snapshots.

mod connection;
mod handler;
mod heartbeat;
mod hub;
mod pumps;
mod resync;
mod router;
mod snapshot;

pub use connection::{Connection, SendError};
pub use handler::{Disposition, handle_frame};
pub use heartbeat::Heartbeat;
pub use hub::{Hub, HubConfig};
pub use resync::{CatalogResync, ChangelogResync, LogResync, StatusResync, default_router};
pub use router::{EventHandler, EventRouter, RouteError, expect_empty_payload};
pub use snapshot::{PanelSnapshot, SnapshotSource};
