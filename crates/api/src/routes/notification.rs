//! Route definitions for the `/notifications` resource.
//!
//! All endpoints require authentication.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::notification;
use crate::state::AppState;

/// Routes mounted at `/notifications`.
///
/// ```text
/// POST   /send                 -> send_notification
/// POST   /audience-estimate    -> audience_estimate
///
/// GET    /preferences          -> get_preferences
/// PUT    /preferences          -> update_preferences
///
/// GET    /{id}                 -> get_notification
/// GET    /{id}/deliveries      -> list_deliveries
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/send", post(notification::send_notification))
        .route("/audience-estimate", post(notification::audience_estimate))
        .route(
            "/preferences",
            get(notification::get_preferences).put(notification::update_preferences),
        )
        .route("/{id}", get(notification::get_notification))
        .route("/{id}/deliveries", get(notification::list_deliveries))
}
