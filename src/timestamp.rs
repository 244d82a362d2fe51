//! Timestamp formatting for backup artifact names.

use chrono::{DateTime, Local};

/// `YYYY-MM-DD_HHMMSS-mmm`, always 21 characters.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d_%H%M%S-%3f";

/// Current local time rendered with [`TIMESTAMP_FORMAT`].
#[must_use]
pub fn format_timestamp() -> String {
    format_datetime(&Local::now())
}

/// Render an arbitrary instant with [`TIMESTAMP_FORMAT`].
#[must_use]
pub fn format_datetime(dt: &DateTime<Local>) -> String {
    dt.format(TIMESTAMP_FORMAT).to_string()
}
