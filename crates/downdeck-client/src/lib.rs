//! Client core for the download dashboard: keeps the in-memory task view
//! consistent by reconciling authoritative snapshot loads (pull) with
//! partial progress batches (push), drives the push channel's
//! connect/fail/reconnect lifecycle, and partitions each task's byte range
//! into a fixed-resolution grid for rendering.
//!
//! Rendering itself, dialog wiring, and the HTTP transport are external
//! collaborators; this crate only exposes the seams they plug into
//! ([`runtime::Transport`], [`runtime::SnapshotFetcher`]).

pub mod channel;
pub mod config;
pub mod format;
pub mod grid;
pub mod palette;
pub mod runtime;
pub mod store;

pub use channel::{ChannelEvent, ChannelMachine, ChannelState, Effect};
pub use config::ClientConfig;
pub use grid::{partition, Cell, CellStatus, GRID_SIZE};
pub use runtime::{
    run_channel, ChannelNotice, SnapshotFetcher, Transport, TransportError, TransportLink,
};
pub use store::{placeholder_task, SnapshotToken, TaskStore, ViewTask};
