//! Partition routing module
//!
//! Supports: Single implicit partition, static List, Parent stream records
//!
//! # Overview
//!
//! Partitions split a stream into independently-tracked sub-streams, each
//! with its own cursor state. This is useful for:
//! - Per-account or per-project extraction
//! - Child resources that require a parent ID
//! - Static list of values (e.g., regions)
//!
//! Partition ids are unique within a stream; routers drop duplicates.

mod routers;
mod types;

pub use routers::{ListRouter, ParentRouter, SinglePartitionRouter};
pub use types::{Partition, PartitionRouter, DEFAULT_PARTITION_ID};
