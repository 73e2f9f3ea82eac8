//! # mcpanel-server
//!
//! Control and monitoring backend for one managed game-server process.
//!
//! - WebSocket hub: connection registry, bounded per-client queues, read and
//!   write pumps with ping/pong keepalive, snapshot on connect
//! - Status machine: guarded start/stop/restart with timeout and liveness
//!   confirmation, drift reconciliation
//! - Log pipeline: rotating file tailer, ring buffer, batched broadcasts
//! - Mod catalog with a daily changelog
//! - Axum HTTP surface, SSE status stream and graceful shutdown

#![deny(unsafe_code)]

pub mod catalog;
pub mod config;
pub mod error;
pub mod health;
pub mod logtail;
pub mod routes;
pub mod server;
pub mod shutdown;
pub mod status;
pub mod websocket;

pub use config::ServerConfig;
pub use server::{AppState, PanelServer};
