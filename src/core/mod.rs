//! Core types: errors, configuration, cancellation, size formatting.

pub mod config;
pub mod context;
pub mod errors;
pub mod units;
