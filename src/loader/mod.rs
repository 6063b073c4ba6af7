//! YAML Loader module
//!
//! Parse stream definitions from YAML files.
//!
//! # Overview
//!
//! The loader module provides:
//! - `StreamDefinition` - Declarative stream specification
//! - YAML parsing with validation at load time
//! - Builders turning definitions into cursors, routers and orchestrator settings
//!
//! # Example
//!
//! ```yaml
//! name: orders
//! cursor:
//!   type: datetime
//!   cursor_field: updated_at
//!   start_datetime: "{{ config.start_date }}"
//!   step: P3D
//!   granularity: 1d
//! partition:
//!   type: list
//!   values: "{{ config.account_ids }}"
//!   partition_field: account_id
//! ```

mod parser;
mod types;

pub use parser::{
    build_cursor, build_orchestrator_config, build_router, default_granularity, load_stream,
    load_stream_from_str,
};
pub use types::{
    AsyncJobDefinition, CursorDefinition, ListValues, PartitionDefinition, StreamDefinition,
};
