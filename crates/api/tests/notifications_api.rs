//! Integration tests for `/api/v1/notifications` and `/api/v1/quota`.
//!
//! Every test runs the full router over an in-memory store and a scripted
//! push provider; no database or network is needed.

mod common;

use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use beacon_core::quota::QuotaKind;
use beacon_delivery::testing::ScriptedProvider;
use beacon_engine::store::memory::MemoryStore;
use common::{
    admin_token, body_json, get_auth, owner_token, post_json, put_json, send, token_for,
    town_admin_token,
};
use serde_json::json;

/// Town 1 with three residents; user 12 has disabled town alerts.
fn town_fixture(town_limit: Option<i32>, town_usage: i32) -> Arc<MemoryStore> {
    let store = Arc::new(MemoryStore::new());
    store.add_town(1, 0, town_limit, town_usage);
    store.add_town(2, 0, None, 0);
    store.add_profile(10, 1, None);
    store.add_profile(11, 1, None);
    store.add_profile(12, 1, Some(json!({ "categories": { "townAlerts": false } })));
    store.add_device(10, "tok-10");
    store.add_device(11, "tok-11");
    store.add_device(12, "tok-12");
    store
}

/// Business 50 (a restaurant in town 1) with two active subscribers.
fn business_fixture(limit: Option<i32>, usage: i32) -> Arc<MemoryStore> {
    let store = Arc::new(MemoryStore::new());
    store.add_town(1, 0, None, 0);
    store.add_business(50, 1, "restaurant", limit, usage);
    store.add_profile(20, 1, None);
    store.add_profile(21, 1, None);
    store.add_subscription(50, 20, true);
    store.add_subscription(50, 21, true);
    store.add_device(20, "tok-20");
    store.add_device(21, "tok-21");
    store
}

fn provider() -> Arc<ScriptedProvider> {
    Arc::new(ScriptedProvider::new(100))
}

fn town_alert() -> serde_json::Value {
    json!({
        "title": "Road closed",
        "body": "Main Street is closed until noon",
        "type": "town_alert",
        "targetType": "TOWN",
        "townId": 1,
    })
}

fn promotion() -> serde_json::Value {
    json!({
        "title": "Half price",
        "body": "Today only",
        "type": "promotion",
        "targetType": "BUSINESS_SUBSCRIBERS",
        "deeplink": "app://business/50",
    })
}

// ---------------------------------------------------------------------------
// Send
// ---------------------------------------------------------------------------

#[tokio::test]
async fn admin_town_send_delivers_to_eligible_residents() {
    let store = town_fixture(None, 0);
    let provider = provider();
    let app = common::build_test_app(store.clone(), provider.clone());

    let response = post_json(app, "/api/v1/notifications/send", &admin_token(1), town_alert()).await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["success"], true);
    assert_eq!(json["audienceCount"], 2);
    assert_eq!(json["delivered"], 2);
    assert_eq!(json["failed"], 0);

    let id = json["notificationId"].as_i64().unwrap();
    let notification = store.notification(id).unwrap();
    assert_eq!(notification.status, "sent");
    assert_eq!(notification.delivery_count, 2);
    assert_eq!(provider.calls().len(), 1);
    assert!(!provider.calls()[0].contains(&"tok-12".to_string()));
}

#[tokio::test(start_paused = true)]
async fn send_outliving_the_request_timeout_still_completes() {
    let store = town_fixture(Some(10), 0);
    let provider = Arc::new(ScriptedProvider::new(100).with_delay(Duration::from_secs(2)));
    let mut config = common::test_config();
    config.request_timeout_secs = 1;
    let app = common::build_test_app_with_config(store.clone(), provider.clone(), config);

    let response = post_json(app, "/api/v1/notifications/send", &admin_token(1), town_alert()).await;
    assert_eq!(response.status(), StatusCode::REQUEST_TIMEOUT);

    tokio::time::sleep(Duration::from_secs(3)).await;

    let notifications = store.notifications();
    assert_eq!(notifications.len(), 1);
    let notification = &notifications[0];
    assert_eq!(notification.status, "sent");
    assert_eq!(notification.delivery_count, 2);
    assert_eq!(store.deliveries(notification.id).len(), 2);
    assert_eq!(provider.calls().len(), 1);
    assert_eq!(store.usage(QuotaKind::Town, 1), Some(1));
}

#[tokio::test]
async fn owner_send_reports_partial_failure_and_deactivates_dead_token() {
    let store = business_fixture(Some(10), 0);
    let provider = Arc::new(ScriptedProvider::new(100).with_unregistered("tok-21"));
    let app = common::build_test_app(store.clone(), provider);

    let response = post_json(app, "/api/v1/notifications/send", &owner_token(2, 50), promotion()).await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["delivered"], 1);
    assert_eq!(json["failed"], 1);
    assert_eq!(json["audienceCount"], 2);

    assert!(!store.device("tok-21").unwrap().is_active);
    assert!(store.device("tok-20").unwrap().is_active);
    assert_eq!(store.usage(QuotaKind::Business, 50), Some(1));
}

#[tokio::test]
async fn send_with_no_eligible_recipients_returns_400_with_notification_id() {
    let store = Arc::new(MemoryStore::new());
    store.add_town(1, 0, None, 0);
    store.add_profile(10, 1, None);
    let app = common::build_test_app(store.clone(), provider());

    let response = post_json(app, "/api/v1/notifications/send", &admin_token(1), town_alert()).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let json = body_json(response).await;
    assert_eq!(json["code"], "NO_RECIPIENTS");
    assert_eq!(json["audienceCount"], 0);
    let id = json["notificationId"].as_i64().unwrap();
    assert_eq!(store.notification(id).unwrap().status, "failed");
}

#[tokio::test]
async fn exhausted_quota_returns_403_without_calling_provider() {
    let store = business_fixture(Some(3), 3);
    let provider = provider();
    let app = common::build_test_app(store.clone(), provider.clone());

    let response = post_json(app, "/api/v1/notifications/send", &owner_token(2, 50), promotion()).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let json = body_json(response).await;
    assert_eq!(json["code"], "QUOTA_EXCEEDED");
    assert_eq!(json["quota"]["allowed"], false);
    assert_eq!(json["quota"]["limit"], 3);
    assert_eq!(json["quota"]["remaining"], 0);
    assert!(json["notificationId"].is_i64());

    assert!(provider.calls().is_empty());
    assert_eq!(store.usage(QuotaKind::Business, 50), Some(3));
}

#[tokio::test]
async fn emergency_alert_ignores_exhausted_town_quota() {
    let store = town_fixture(Some(1), 1);
    let app = common::build_test_app(store.clone(), provider());

    let mut body = town_alert();
    body["type"] = json!("emergency_alert");
    let response = post_json(app, "/api/v1/notifications/send", &town_admin_token(3, 1), body).await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    // Emergency alerts reach user 12 too: the town-alert opt-out does not apply.
    assert_eq!(json["delivered"], 3);
    assert_eq!(store.usage(QuotaKind::Town, 1), Some(1));
}

#[tokio::test]
async fn transport_failure_still_counts_as_sent() {
    let store = business_fixture(Some(10), 4);
    let provider = Arc::new(ScriptedProvider::new(100).with_transport_failure_for("tok-20"));
    let app = common::build_test_app(store.clone(), provider);

    let response = post_json(app, "/api/v1/notifications/send", &owner_token(2, 50), promotion()).await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["delivered"], 0);
    assert_eq!(json["failed"], 2);
    let id = json["notificationId"].as_i64().unwrap();
    assert_eq!(store.notification(id).unwrap().status, "sent");
    assert_eq!(store.deliveries(id).len(), 2);
    assert_eq!(store.usage(QuotaKind::Business, 50), Some(5));
}

#[tokio::test]
async fn send_with_only_malformed_tokens_returns_500_and_releases_quota() {
    let store = Arc::new(MemoryStore::new());
    store.add_town(1, 0, None, 0);
    store.add_business(50, 1, "restaurant", Some(10), 4);
    store.add_profile(20, 1, None);
    store.add_subscription(50, 20, true);
    store.add_device(20, "not a token");
    let provider = provider();
    let app = common::build_test_app(store.clone(), provider.clone());

    let response = post_json(app, "/api/v1/notifications/send", &owner_token(2, 50), promotion()).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let json = body_json(response).await;
    assert_eq!(json["code"], "DISPATCH_FAILED");
    let id = json["notificationId"].as_i64().unwrap();
    assert_eq!(store.notification(id).unwrap().status, "failed");
    assert!(provider.calls().is_empty());
    assert!(!store.device("not a token").unwrap().is_active);
    assert_eq!(store.usage(QuotaKind::Business, 50), Some(4));
}

// ---------------------------------------------------------------------------
// Send: authorization and validation
// ---------------------------------------------------------------------------

#[tokio::test]
async fn send_without_token_returns_401() {
    let app = common::build_test_app(town_fixture(None, 0), provider());
    let response = send(
        app,
        axum::http::Method::POST,
        "/api/v1/notifications/send",
        None,
        Some(town_alert()),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn resident_role_cannot_send() {
    let store = town_fixture(None, 0);
    let app = common::build_test_app(store.clone(), provider());
    let token = token_for(10, "resident", None, Some(1));

    let response = post_json(app, "/api/v1/notifications/send", &token, town_alert()).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert!(store.notifications().is_empty());
}

#[tokio::test]
async fn business_owner_cannot_broadcast_to_town() {
    let store = business_fixture(None, 0);
    let app = common::build_test_app(store.clone(), provider());

    let mut body = promotion();
    body["targetType"] = json!("TOWN");
    body["townId"] = json!(1);
    let response = post_json(app, "/api/v1/notifications/send", &owner_token(2, 50), body).await;

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(body_json(response).await["code"], "FORBIDDEN");
    assert!(store.notifications().is_empty());
}

#[tokio::test]
async fn town_admin_cannot_send_to_another_town() {
    let store = town_fixture(None, 0);
    let app = common::build_test_app(store.clone(), provider());

    let mut body = town_alert();
    body["townId"] = json!(2);
    let response = post_json(app, "/api/v1/notifications/send", &town_admin_token(3, 1), body).await;

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert!(store.notifications().is_empty());
}

#[tokio::test]
async fn unknown_type_and_empty_title_are_validation_errors() {
    let store = town_fixture(None, 0);

    let mut unknown_type = town_alert();
    unknown_type["type"] = json!("gossip");
    let mut empty_title = town_alert();
    empty_title["title"] = json!("");
    let mut unknown_target = town_alert();
    unknown_target["targetType"] = json!("EVERYONE");

    for body in [unknown_type, empty_title, unknown_target] {
        let app = common::build_test_app(store.clone(), provider());
        let response = post_json(app, "/api/v1/notifications/send", &admin_token(1), body).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["code"], "VALIDATION_ERROR");
    }
    assert!(store.notifications().is_empty());
}

#[tokio::test]
async fn send_to_unknown_town_returns_404_before_creating_a_row() {
    let store = town_fixture(None, 0);
    let app = common::build_test_app(store.clone(), provider());

    let mut body = town_alert();
    body["townId"] = json!(999);
    let response = post_json(app, "/api/v1/notifications/send", &admin_token(1), body).await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(store.notifications().is_empty());
}

// ---------------------------------------------------------------------------
// Audience estimate
// ---------------------------------------------------------------------------

#[tokio::test]
async fn town_estimate_reports_breakdown_without_writing() {
    let store = town_fixture(None, 0);
    store.add_profile(13, 1, None);
    let provider = provider();
    let app = common::build_test_app(store.clone(), provider.clone());

    let response = post_json(
        app,
        "/api/v1/notifications/audience-estimate",
        &town_admin_token(3, 1),
        json!({ "targetType": "TOWN", "type": "town_alert" }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["estimatedAudience"], 2);
    assert_eq!(json["breakdown"]["totalProfiles"], 4);
    assert_eq!(json["breakdown"]["blockedByPreferences"], 1);
    assert_eq!(json["breakdown"]["noDeviceToken"], 1);

    assert!(store.notifications().is_empty());
    assert!(provider.calls().is_empty());
}

#[tokio::test]
async fn business_estimate_defaults_to_own_business() {
    let app = common::build_test_app(business_fixture(None, 0), provider());

    let response = post_json(
        app,
        "/api/v1/notifications/audience-estimate",
        &owner_token(2, 50),
        json!({ "targetType": "BUSINESS" }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["estimatedAudience"], 2);
    assert_eq!(json["breakdown"]["totalSubscribers"], 2);
}

#[tokio::test]
async fn owner_cannot_estimate_another_business() {
    let store = business_fixture(None, 0);
    store.add_business(51, 1, "museum", None, 0);
    let app = common::build_test_app(store, provider());

    let response = post_json(
        app,
        "/api/v1/notifications/audience-estimate",
        &owner_token(2, 50),
        json!({ "targetType": "BUSINESS", "businessId": 51 }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

// ---------------------------------------------------------------------------
// Reads
// ---------------------------------------------------------------------------

#[tokio::test]
async fn sender_reads_own_notification_and_deliveries() {
    let store = town_fixture(None, 0);
    let token = town_admin_token(3, 1);

    let app = common::build_test_app(store.clone(), provider());
    let sent = body_json(post_json(app, "/api/v1/notifications/send", &token, town_alert()).await).await;
    let id = sent["notificationId"].as_i64().unwrap();

    let app = common::build_test_app(store.clone(), provider());
    let response = get_auth(app, &format!("/api/v1/notifications/{id}"), &token).await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"]["status"], "sent");
    assert_eq!(json["data"]["audienceCount"], 2);

    let app = common::build_test_app(store.clone(), provider());
    let response = get_auth(app, &format!("/api/v1/notifications/{id}/deliveries"), &token).await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn other_senders_get_404_but_admin_sees_everything() {
    let store = town_fixture(None, 0);

    let app = common::build_test_app(store.clone(), provider());
    let sent = body_json(post_json(app, "/api/v1/notifications/send", &town_admin_token(3, 1), town_alert()).await).await;
    let uri = format!("/api/v1/notifications/{}", sent["notificationId"]);

    let app = common::build_test_app(store.clone(), provider());
    let response = get_auth(app, &uri, &town_admin_token(4, 1)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let app = common::build_test_app(store.clone(), provider());
    let response = get_auth(app, &uri, &admin_token(1)).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn quota_endpoint_reports_callers_business() {
    let app = common::build_test_app(business_fixture(Some(10), 4), provider());

    let response = get_auth(app, "/api/v1/quota", &owner_token(2, 50)).await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["data"]["business"]["used"], 4);
    assert_eq!(json["data"]["business"]["remaining"], 6);
    assert!(json["data"].get("town").is_none());
}

// ---------------------------------------------------------------------------
// Preferences
// ---------------------------------------------------------------------------

#[tokio::test]
async fn preferences_default_for_profile_without_record() {
    let app = common::build_test_app(town_fixture(None, 0), provider());
    let token = token_for(10, "resident", None, Some(1));

    let response = get_auth(app, "/api/v1/notifications/preferences", &token).await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["data"]["globalEnabled"], true);
    assert_eq!(json["data"]["quietHours"]["enabled"], false);
    assert_eq!(json["data"]["quietHours"]["start"], "22:00");
}

#[tokio::test]
async fn preferences_update_resolves_legacy_shape() {
    let store = town_fixture(None, 0);
    let app = common::build_test_app(store.clone(), provider());
    let token = token_for(11, "resident", None, Some(1));

    let response = put_json(
        app,
        "/api/v1/notifications/preferences",
        &token,
        json!({ "townAlerts": false, "quietHours": { "enabled": true, "start": "23:00", "end": "07:00" } }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["data"]["categories"]["townAlerts"], false);
    assert_eq!(json["data"]["categories"]["events"], true);
    assert_eq!(json["data"]["quietHours"]["start"], "23:00");

    let stored = store.stored_preferences(11).unwrap();
    assert_eq!(stored["categories"]["townAlerts"], false);
}

#[tokio::test]
async fn preferences_reject_non_object_and_unknown_profile() {
    let store = town_fixture(None, 0);

    let app = common::build_test_app(store.clone(), provider());
    let response = put_json(
        app,
        "/api/v1/notifications/preferences",
        &token_for(10, "resident", None, Some(1)),
        json!(false),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let app = common::build_test_app(store, provider());
    let response = get_auth(
        app,
        "/api/v1/notifications/preferences",
        &token_for(99, "resident", None, None),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
