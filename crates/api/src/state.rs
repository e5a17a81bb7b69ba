use std::sync::Arc;

use beacon_engine::NotificationEngine;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheaply cloneable (inner data is behind `Arc` or is already `Clone`).
#[derive(Clone)]
pub struct AppState {
    /// Notification engine over the configured store and push provider.
    pub engine: NotificationEngine,
    /// Server configuration.
    pub config: Arc<ServerConfig>,
}
