//! Change-event source and glue.
//!
//! # Data Flow
//! ```text
//! routes dir + overlay file on disk
//!     → watcher.rs (notify events → ChangeEvent over mpsc)
//!     → controller.rs (parse via routes.rs / overlay.rs,
//!                      mutate the aggregate, save)
//! ```
//!
//! # Design Decisions
//! - One mutation batch plus one save per delivered event
//! - A payload that fails to parse is logged and dropped; the aggregate
//!   keeps its previous state and the process keeps running
//! - The controller caches the last parsed value per source so updates can
//!   retract what the previous version registered

pub mod controller;
pub mod overlay;
pub mod routes;
pub mod watcher;

use std::path::PathBuf;

pub use controller::Controller;
pub use watcher::SourceWatcher;

/// What happened to a watched source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    /// Created or modified.
    Upserted,
    /// Deleted.
    Removed,
}

/// One change to a watched source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeEvent {
    /// A route-object file changed.
    Route { path: PathBuf, kind: ChangeKind },
    /// The overlay document changed.
    Overlay { kind: ChangeKind },
}
