//! Activity logging: JSONL sink plus the background logger thread feeding it.

pub mod activity;
pub mod jsonl;

pub use activity::{ActivityEvent, ActivityLoggerHandle, spawn_logger};
