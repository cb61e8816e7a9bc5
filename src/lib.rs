#![forbid(unsafe_code)]

//! volsweep: container volume inventory and prune planning.
//!
//! Reads the volumes a container runtime knows about, works out which
//! containers mount each one, flags the orphans, and builds a reviewable
//! prune plan that can be applied volume by volume.
//!
//! # Library usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use volsweep::prelude::*;
//!
//! let provider = Arc::new(MockProvider::new().with_volume("cache", "local", 4096, ""));
//! let mut session = Session::new(provider, SessionOptions::default());
//! session.start(&Context::background());
//! println!("{} orphans", session.model().orphan_count());
//! ```

pub mod prelude;

pub mod core;
pub mod inventory;
pub mod logger;
pub mod provider;
pub mod session;
#[cfg(feature = "signals")]
pub mod signals;
#[cfg(feature = "tui")]
pub mod tui;
