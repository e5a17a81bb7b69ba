//! Domain model structs and DTOs.
//!
//! Each submodule contains:
//! - A `FromRow` + `Serialize` entity struct matching the database row
//! - A create DTO for inserts where the engine creates rows

pub mod device;
pub mod notification;
pub mod profile;
pub mod quota_subject;
