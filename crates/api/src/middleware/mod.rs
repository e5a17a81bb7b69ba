//! Authentication and authorization.
//!
//! - [`auth::AuthUser`] -- Extracts the authenticated user from a JWT Bearer token.
//! - [`rbac::RequireSender`] -- Requires a role that may send notifications.
//! - [`rbac::authorize_send`] / [`rbac::authorize_estimate`] -- role vs. target
//!   and category checks run before the engine.

pub mod auth;
pub mod rbac;
