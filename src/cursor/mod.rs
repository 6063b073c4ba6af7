//! Cursor module
//!
//! Tracks how far each partition has been extracted.
//!
//! # Overview
//!
//! - `DatetimeCursor` - Watermark over a datetime field, sliced into windows
//! - `FullRefreshCursor` - One whole-partition slice per run, nothing persisted
//! - `FileHistoryCursor` - Bounded map of resource id to last-seen position
//! - `CursorFactory` - Builds the right cursor for each partition from stream settings
//!
//! Watermarks only move forward, and only after a slice's records have been
//! emitted. A checkpoint that does not match the cursor variant is rejected
//! rather than reinterpreted.

mod datetime;
mod factory;
mod full_refresh;
mod history;
mod types;

pub use datetime::{DatetimeCursor, DatetimeCursorSettings};
pub use factory::CursorFactory;
pub use full_refresh::FullRefreshCursor;
pub use history::{
    FileHistoryCursor, FileHistorySettings, DEFAULT_MAX_HISTORY_SIZE, HISTORY_DATETIME_FORMAT,
};
pub use types::{Cursor, CursorKind};
