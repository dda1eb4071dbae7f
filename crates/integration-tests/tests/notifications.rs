//! Integration tests for waitlist fan-out, engagement tracking and the admin
//! dashboards.

use axum::http::StatusCode;
use rust_decimal_macros::dec;
use serde_json::json;

use attireburg_core::ProductId;
use attireburg_integration_tests::TestApp;

async fn subscribe(app: &TestApp, email: &str, product_id: ProductId) {
    let response = app
        .post(
            "/api/waitlist/subscribe",
            None,
            json!({ "email": email, "productId": product_id }),
        )
        .await;
    assert_eq!(response.status, StatusCode::OK, "{}", response.text);
}

#[tokio::test]
async fn test_restock_fan_out_counts_failures() {
    let app = TestApp::new();
    let admin = app.admin_token();
    let coat = app.store.add_product("Mantel", "mantel", dec!(249), 0).await;
    for email in ["a@example.com", "b@example.com", "c@example.com"] {
        subscribe(&app, email, coat.id).await;
    }
    app.mailer.fail_for("b@example.com").await;

    let report = app
        .post(
            "/api/notifications/restock",
            Some(&admin),
            json!({ "productId": coat.id }),
        )
        .await;
    assert_eq!(report.status, StatusCode::OK);
    assert_eq!(report.json, json!({ "recipients": 3, "sent": 2, "failed": 1 }));

    let delivered = app.mailer.sent().await;
    assert_eq!(delivered.len(), 2);
    assert!(delivered.iter().all(|m| m.subject == "Wieder verfügbar: Mantel"));
    assert!(delivered[0].text.contains("/api/waitlist/unsubscribe?"));

    let logged = app.store.notifications().await;
    assert_eq!(logged.len(), 2);
    assert!(logged.iter().all(|n| n.email != "b@example.com"));
}

#[tokio::test]
async fn test_restock_for_unknown_item_is_not_found() {
    let app = TestApp::new();
    let admin = app.admin_token();

    let response = app
        .post(
            "/api/notifications/restock",
            Some(&admin),
            json!({ "productId": 31337 }),
        )
        .await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_engagement_feeds_analytics() {
    let app = TestApp::new();
    let admin = app.admin_token();
    let coat = app.store.add_product("Mantel", "mantel", dec!(249), 0).await;
    for email in ["a@example.com", "b@example.com", "c@example.com", "d@example.com"] {
        subscribe(&app, email, coat.id).await;
    }
    app.post(
        "/api/notifications/restock",
        Some(&admin),
        json!({ "productId": coat.id }),
    )
    .await;

    let ids: Vec<String> = app
        .store
        .notifications()
        .await
        .iter()
        .map(|n| n.id.to_string())
        .collect();
    assert_eq!(ids.len(), 4);

    let opened = app
        .post(
            &format!("/api/notifications/{}/events", ids[0]),
            None,
            json!({ "event": "opened" }),
        )
        .await;
    assert_eq!(opened.status, StatusCode::NO_CONTENT);
    app.post(
        &format!("/api/notifications/{}/events", ids[1]),
        None,
        json!({ "event": "purchased" }),
    )
    .await;

    let analytics = app.get("/api/notifications/status", Some(&admin)).await;
    assert_eq!(analytics.status, StatusCode::OK);
    assert_eq!(analytics.json["totalSent"], 4);
    assert_eq!(analytics.json["openRate"], 50.0);
    assert_eq!(analytics.json["clickRate"], 25.0);
    assert_eq!(analytics.json["conversionRate"], 25.0);

    let unknown = app
        .post(
            "/api/notifications/9999/events",
            None,
            json!({ "event": "clicked" }),
        )
        .await;
    assert_eq!(unknown.status, StatusCode::NOT_FOUND);

    let bad_event = app
        .post(
            &format!("/api/notifications/{}/events", ids[2]),
            None,
            json!({ "event": "forwarded" }),
        )
        .await;
    assert_eq!(bad_event.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_analytics_without_notifications_is_zero() {
    let app = TestApp::new();
    let admin = app.admin_token();

    let analytics = app.get("/api/notifications/status", Some(&admin)).await;
    assert_eq!(analytics.json["totalSent"], 0);
    assert_eq!(analytics.json["openRate"], 0.0);
}

#[tokio::test]
async fn test_send_test_email() {
    let app = TestApp::new();
    let admin = app.admin_token();

    let sent = app
        .post(
            "/api/notifications/test",
            Some(&admin),
            json!({ "email": "ops@attireburg.de" }),
        )
        .await;
    assert_eq!(sent.status, StatusCode::OK);
    assert_eq!(sent.json["success"], true);
    assert_eq!(app.mailer.sent_to("ops@attireburg.de").await.len(), 1);

    app.mailer.fail_for("broken@attireburg.de").await;
    let failed = app
        .post(
            "/api/notifications/test",
            Some(&admin),
            json!({ "email": "broken@attireburg.de" }),
        )
        .await;
    assert_eq!(failed.status, StatusCode::OK);
    assert_eq!(failed.json["success"], false);

    let malformed = app
        .post("/api/notifications/test", Some(&admin), json!({ "email": "nope" }))
        .await;
    assert_eq!(malformed.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_notification_admin_routes_require_admin() {
    let app = TestApp::new();
    let customer = app.customer_token(3, "kunde@example.com");

    let status = app.get("/api/notifications/status", Some(&customer)).await;
    assert_eq!(status.status, StatusCode::FORBIDDEN);

    let test = app
        .post("/api/notifications/test", None, json!({ "email": "kunde@example.com" }))
        .await;
    assert_eq!(test.status, StatusCode::UNAUTHORIZED);
}

// =============================================================================
// Admin dashboards
// =============================================================================

#[tokio::test]
async fn test_admin_waitlist_overview() {
    let app = TestApp::new();
    let admin = app.admin_token();
    let coat = app.store.add_product("Mantel", "mantel", dec!(249), 0).await;
    let scarf = app.store.add_product("Schal", "schal", dec!(39), 0).await;
    subscribe(&app, "a@example.com", coat.id).await;
    subscribe(&app, "b@example.com", coat.id).await;
    subscribe(&app, "a@example.com", scarf.id).await;

    let overview = app.get("/api/admin/waitlists", Some(&admin)).await;
    assert_eq!(overview.status, StatusCode::OK);
    assert_eq!(overview.json["totals"]["activeSubscriptions"], 3);
    assert_eq!(overview.json["totals"]["waitlistedItems"], 2);
    assert_eq!(overview.json["data"][0]["productName"], "Mantel");
    assert_eq!(overview.json["data"][0]["activeCount"], 2);

    let paged = app
        .get("/api/admin/waitlists?page=2&perPage=1", Some(&admin))
        .await;
    assert_eq!(paged.json["page"], 2);
    assert_eq!(paged.json["data"][0]["productName"], "Schal");
}

#[tokio::test]
async fn test_production_check_reports_missing_integrations() {
    let app = TestApp::new();
    let admin = app.admin_token();

    let report = app.get("/api/admin/production-check", Some(&admin)).await;
    assert_eq!(report.status, StatusCode::OK);
    assert_eq!(report.json["overall"], "ready-with-warnings");

    let status_of = |name: &str| {
        report.json["checks"]
            .as_array()
            .unwrap()
            .iter()
            .find(|check| check["name"] == name)
            .map(|check| check["status"].clone())
            .unwrap()
    };
    assert_eq!(status_of("jwt_secret"), "pass");
    assert_eq!(status_of("database"), "pass");
    assert_eq!(status_of("paypal"), "warning");
    assert_eq!(status_of("smtp"), "warning");
}
