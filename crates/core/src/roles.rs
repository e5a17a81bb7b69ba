//! Well-known sender role name constants.
//!
//! These must match the `role` claim issued by the identity service.

pub const ROLE_ADMIN: &str = "admin";
pub const ROLE_TOWN_ADMIN: &str = "town_admin";
pub const ROLE_BUSINESS_OWNER: &str = "business_owner";
