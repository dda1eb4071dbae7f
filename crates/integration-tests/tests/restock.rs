//! Integration tests for restock dates and the storefront restock hint.

use axum::http::StatusCode;
use chrono::{Duration, Utc};
use rust_decimal_macros::dec;
use serde_json::json;

use attireburg_core::Locale;
use attireburg_integration_tests::TestApp;

fn in_days(days: i64) -> String {
    (Utc::now() + Duration::days(days)).to_rfc3339()
}

// =============================================================================
// Authorization
// =============================================================================

#[tokio::test]
async fn test_restock_admin_routes_require_admin_token() {
    let app = TestApp::new();
    let product = app.store.add_product("Mantel", "mantel", dec!(249), 0).await;
    let body = json!({ "productId": product.id, "expectedDate": in_days(10) });

    let anonymous = app.post("/api/admin/restock-dates", None, body.clone()).await;
    assert_eq!(anonymous.status, StatusCode::UNAUTHORIZED);

    let customer = app.customer_token(1, "kunde@example.com");
    let forbidden = app
        .post("/api/admin/restock-dates", Some(&customer), body)
        .await;
    assert_eq!(forbidden.status, StatusCode::FORBIDDEN);
    assert_eq!(forbidden.json["error"], "Admin access required");

    let garbage = app
        .get("/api/admin/restock-dates", Some("not-a-jwt"))
        .await;
    assert_eq!(garbage.status, StatusCode::UNAUTHORIZED);
}

// =============================================================================
// Setting and reading dates
// =============================================================================

#[tokio::test]
async fn test_past_restock_date_is_rejected() {
    let app = TestApp::new();
    let admin = app.admin_token();
    let product = app.store.add_product("Mantel", "mantel", dec!(249), 0).await;

    let response = app
        .post(
            "/api/admin/restock-dates",
            Some(&admin),
            json!({ "productId": product.id, "expectedDate": in_days(-1) }),
        )
        .await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.json["error"], "Expected date must be in the future");
}

#[tokio::test]
async fn test_restock_date_for_unknown_product_is_not_found() {
    let app = TestApp::new();
    let admin = app.admin_token();

    let response = app
        .post(
            "/api/admin/restock-dates",
            Some(&admin),
            json!({ "productId": 404, "expectedDate": in_days(5) }),
        )
        .await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_variant_dates_are_independent() {
    let app = TestApp::with_locale(Locale::En);
    let admin = app.admin_token();
    let product = app.store.add_product("Hemd", "hemd", dec!(79), 0).await;
    let small = app.store.add_variant(product.id, "HE-S", "S", None, 0).await;
    let large = app.store.add_variant(product.id, "HE-L", "L", None, 0).await;

    let set = app
        .post(
            "/api/admin/restock-dates",
            Some(&admin),
            json!({
                "productId": product.id,
                "variantId": small.id,
                "expectedDate": in_days(14),
                "notes": "Container from Porto"
            }),
        )
        .await;
    assert_eq!(set.status, StatusCode::OK);
    assert_eq!(set.json["success"], true);

    let small_hint = app
        .get(
            &format!("/api/products/{}/restock?variantId={}", product.id, small.id),
            None,
        )
        .await;
    assert_eq!(small_hint.status, StatusCode::OK);
    assert_eq!(small_hint.json["shouldShow"], true);
    assert_eq!(small_hint.json["state"], "future-date");
    assert!(
        small_hint.json["label"]
            .as_str()
            .unwrap()
            .starts_with("Expected back in stock on ")
    );

    let large_hint = app
        .get(
            &format!("/api/products/{}/restock?variantId={}", product.id, large.id),
            None,
        )
        .await;
    assert_eq!(large_hint.json["state"], "no-date");
    assert_eq!(large_hint.json["label"], "Currently out of stock");

    let product_hint = app
        .get(&format!("/api/products/{}/restock", product.id), None)
        .await;
    assert_eq!(product_hint.json["state"], "no-date");
}

#[tokio::test]
async fn test_in_stock_items_show_no_hint() {
    let app = TestApp::new();
    let admin = app.admin_token();
    let product = app.store.add_product("Schal", "schal", dec!(39), 5).await;

    app.post(
        "/api/admin/restock-dates",
        Some(&admin),
        json!({ "productId": product.id, "expectedDate": in_days(3) }),
    )
    .await;

    let hint = app
        .get(&format!("/api/products/{}/restock", product.id), None)
        .await;
    assert_eq!(hint.json["shouldShow"], false);
    assert!(hint.json["label"].is_null());
}

#[tokio::test]
async fn test_locale_query_overrides_default() {
    let app = TestApp::new();
    let product = app.store.add_product("Schal", "schal", dec!(39), 0).await;

    let german = app
        .get(&format!("/api/products/{}/restock", product.id), None)
        .await;
    assert_eq!(german.json["label"], "Derzeit nicht vorrätig");

    let english = app
        .get(
            &format!("/api/products/{}/restock?locale=en-GB", product.id),
            None,
        )
        .await;
    assert_eq!(english.json["label"], "Currently out of stock");
}

#[tokio::test]
async fn test_clear_and_history() {
    let app = TestApp::new();
    let admin = app.admin_token();
    let product = app.store.add_product("Mantel", "mantel", dec!(249), 0).await;

    app.post(
        "/api/admin/restock-dates",
        Some(&admin),
        json!({ "productId": product.id, "expectedDate": in_days(20) }),
    )
    .await;

    let current = app
        .get(
            &format!("/api/admin/restock-dates?productId={}", product.id),
            Some(&admin),
        )
        .await;
    assert_eq!(current.status, StatusCode::OK);
    assert!(current.json["expectedDate"].is_string());

    let cleared = app
        .delete(
            &format!("/api/admin/restock-dates?productId={}", product.id),
            Some(&admin),
        )
        .await;
    assert_eq!(cleared.status, StatusCode::OK);
    assert_eq!(cleared.json["message"], "Restock date cleared");

    let after = app
        .get(
            &format!("/api/admin/restock-dates?productId={}&history=true", product.id),
            Some(&admin),
        )
        .await;
    assert!(after.json["expectedDate"].is_null());
    assert_eq!(after.json["history"].as_array().unwrap().len(), 2);

    let hint = app
        .get(&format!("/api/products/{}/restock", product.id), None)
        .await;
    assert_eq!(hint.json["state"], "no-date");
}

#[tokio::test]
async fn test_clear_without_product_is_bad_request() {
    let app = TestApp::new();
    let admin = app.admin_token();

    let response = app.delete("/api/admin/restock-dates", Some(&admin)).await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.json["error"], "productId is required");
}

// =============================================================================
// Bulk updates and upcoming list
// =============================================================================

#[tokio::test]
async fn test_bulk_update_skips_invalid_entries() {
    let app = TestApp::new();
    let admin = app.admin_token();
    let coat = app.store.add_product("Mantel", "mantel", dec!(249), 0).await;
    let scarf = app.store.add_product("Schal", "schal", dec!(39), 0).await;

    let response = app
        .post(
            "/api/admin/restock-dates",
            Some(&admin),
            json!({
                "updates": [
                    { "productId": coat.id, "expectedDate": in_days(7) },
                    { "productId": scarf.id, "expectedDate": in_days(-7) }
                ]
            }),
        )
        .await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.json["updatedCount"], 1);
    assert_eq!(response.json["message"], "Updated 1 of 2 restock dates");
    assert_eq!(response.json["failed"][0]["productId"], scarf.id.as_i32());

    let upcoming = app.get("/api/admin/restock-dates", Some(&admin)).await;
    let upcoming = upcoming.json.as_array().unwrap().clone();
    assert_eq!(upcoming.len(), 1);
    assert_eq!(upcoming[0]["productName"], "Mantel");
}
