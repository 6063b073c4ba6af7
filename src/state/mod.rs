//! State management module
//!
//! Handles checkpoint documents, persistence and resumability.
//! State is persisted between sync runs to enable incremental syncs.
//!
//! # Overview
//!
//! The state module provides:
//! - `Checkpoint` - One document per run, keyed by stream then partition id
//! - `PartitionCheckpoint` - A partition's `position` and optional `history`
//! - `StateManager` - File-based state persistence with atomic writes
//!
//! # Layout
//!
//! ```json
//! {
//!   "streams": {
//!     "orders": {
//!       "partitions": {
//!         "acct-1": { "position": "2024-01-05T00:00:00Z" },
//!         "bucket-a": {
//!           "position": "2023-08-01T10:11:12.000000Z",
//!           "history": { "a.csv": "2023-08-01T10:11:12.000000Z" }
//!         }
//!       }
//!     }
//!   }
//! }
//! ```
//!
//! Keys this version does not know about are kept on load and written back
//! unchanged, at every level of the document.

mod manager;
mod types;

pub use manager::StateManager;
pub use types::{Checkpoint, PartitionCheckpoint, StreamCheckpoint};
