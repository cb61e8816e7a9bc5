//! Inventory data model: volume records and container attachment resolution.

pub mod attachments;
pub mod volume;

pub use attachments::{AttachmentIndex, Container, resolve_attachments};
pub use volume::{SIZE_UNKNOWN, Volume};
