//! Convenience re-exports for library consumers.
//!
//! ```rust,no_run
//! use volsweep::prelude::*;
//! ```

// Core
pub use crate::core::config::Config;
pub use crate::core::context::Context;
pub use crate::core::errors::{ErrorKind, Result, VsError};
pub use crate::core::units::format_size;

// Inventory
pub use crate::inventory::{Container, SIZE_UNKNOWN, Volume, resolve_attachments};

// Providers
pub use crate::provider::docker_cli::DockerCliProvider;
pub use crate::provider::mock::MockProvider;
pub use crate::provider::{InventoryProvider, connect};

// Session
pub use crate::session::{
    ApplyOutcome, Pane, PrunePlan, Session, SessionModel, SessionMsg, SessionOptions,
};

// Logging
pub use crate::logger::{ActivityEvent, ActivityLoggerHandle, spawn_logger};
