//! Domain logic for the Beacon notification engine.
//!
//! This crate has zero internal dependencies so that the repository layer,
//! the delivery crate, the engine and the HTTP server can all share it.

pub mod category;
pub mod error;
pub mod preferences;
pub mod quiet_hours;
pub mod quota;
pub mod roles;
pub mod status;
pub mod target;
pub mod types;
