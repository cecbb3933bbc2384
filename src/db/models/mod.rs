//! Database models split into domain-specific modules.

pub mod booking;
pub mod listing;
pub mod user;

pub use booking::*;
pub use listing::*;
pub use user::*;

/// Current time in the fixed-width RFC 3339 form stored in `*_at` columns.
///
/// Fixed width keeps lexicographic order equal to chronological order.
pub fn now_timestamp() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Micros, true)
}
