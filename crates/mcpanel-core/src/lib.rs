//! # mcpanel-core
//!
//! Foundation types shared by every mcpanel crate.
//!
//! - **Status**: [`ServerStatus`] lifecycle enum and [`ServerAction`] with its guard table
//! - **Events**: [`ServerEvent`] closed tagged union and the `{type, payload}` wire envelope
//! - **Catalog**: mod listing and changelog payload types
//! - **IDs**: [`ConnectionId`] newtype (UUID v7)
//! - **Logging**: `tracing` subscriber setup and a capture layer for tests

#![deny(unsafe_code)]

pub mod catalog;
pub mod events;
pub mod ids;
pub mod logging;
pub mod status;

pub use catalog::{Changelog, ModChange, ModChangeType, ModEntry, ModList};
pub use events::{EventKind, FrameError, InboundFrame, LogLines, ServerEvent, StatusPayload};
pub use ids::ConnectionId;
pub use status::{ActionRejected, ServerAction, ServerStatus};
