//! Stores the user directory composes with.
//!
//! Each one is a narrow port with a SQL adapter sharing the directory pool.

mod bot;
mod channel;
mod group;
mod status;
mod team;

pub use bot::*;
pub use channel::*;
pub use group::*;
pub use status::*;
pub use team::*;

/// Current wall time in milliseconds.
pub(crate) fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
