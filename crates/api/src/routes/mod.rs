pub mod health;
pub mod notification;

use axum::routing::get;
use axum::Router;

use crate::handlers;
use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /notifications/send                       send (sender roles)
/// /notifications/audience-estimate          dry-run audience size (sender roles)
/// /notifications/preferences                get, replace (any authenticated user)
/// /notifications/{id}                       get (own, or any for admin)
/// /notifications/{id}/deliveries            delivery rows
///
/// /quota                                    caller's business and town quota
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/notifications", notification::router())
        .route("/quota", get(handlers::quota::get_quota))
}
