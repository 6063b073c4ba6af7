//! Time window module
//!
//! Splits a `[start, end]` range into contiguous, non-overlapping windows.
//!
//! # Overview
//!
//! The window module provides:
//! - `parse_duration` - Compact (`3d`, `1h30m`, `250ms`) and ISO-8601 (`P3D`) durations
//! - `TimeWindows` - Validated generator configuration, restartable
//! - `TimeWindowIter` - Lazy iterator over the windows
//! - `Slice` - One unit of extraction work: a window scoped to a partition
//!
//! All arithmetic happens in UTC.

mod duration;
mod generator;
mod types;

pub use duration::{format_duration, parse_duration};
pub use generator::{generate, TimeWindowIter, TimeWindows};
pub use types::{Slice, TimeWindow};
