//! Formatting helpers for terminal output.

pub mod format;

pub use format::{format_date, format_optional, format_timestamp, format_totals, truncate_string};
