//! Interactive dashboard over a [`crate::session::Session`].
//!
//! [`render`] and [`input`] are pure and unit-tested; [`runtime`] owns the
//! terminal and is the only part that touches crossterm I/O.

pub mod input;
pub mod render;
pub mod runtime;
pub mod terminal_guard;

pub use runtime::run;
