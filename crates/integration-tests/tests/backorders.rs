//! Integration tests for the backorder lifecycle.

use axum::http::StatusCode;
use chrono::{Duration, Utc};
use rust_decimal_macros::dec;
use serde_json::{Value, json};

use attireburg_core::{ProductId, StockKey, StockLine, VariantId};
use attireburg_integration_tests::TestApp;
use attireburg_server::db::CatalogStore;

fn checkout(email: &str, product_id: ProductId, variant_id: VariantId, quantity: i32) -> Value {
    json!({
        "email": email,
        "items": [{
            "productId": product_id,
            "variantId": variant_id,
            "quantity": quantity,
            "size": "M",
            "color": "Navy",
            "price": "49.99"
        }],
        "shippingAddress": "Lindenstraße 4",
        "shippingCity": "Hamburg",
        "shippingPostal": "20095"
    })
}

struct Fixture {
    app: TestApp,
    product_id: ProductId,
    variant_id: VariantId,
}

async fn fixture() -> Fixture {
    let app = TestApp::new();
    let product = app.store.add_product("Pullover", "pullover", dec!(49.99), 0).await;
    let variant = app
        .store
        .add_variant(product.id, "PU-M-NAVY", "M", Some("Navy"), 0)
        .await;
    Fixture {
        app,
        product_id: product.id,
        variant_id: variant.id,
    }
}

impl Fixture {
    fn key(&self) -> StockKey {
        StockKey::variant(self.product_id, self.variant_id)
    }

    async fn stock(&self) -> i32 {
        self.app.store.stock_level(self.key()).await.unwrap().unwrap()
    }

    async fn backorder(&self, token: &str, email: &str, quantity: i32) -> i64 {
        let response = self
            .app
            .post(
                "/api/backorders/create",
                Some(token),
                checkout(email, self.product_id, self.variant_id, quantity),
            )
            .await;
        assert_eq!(response.status, StatusCode::CREATED, "{}", response.text);
        response.json["orderId"].as_i64().unwrap()
    }
}

// =============================================================================
// Create, status, cancel
// =============================================================================

#[tokio::test]
async fn test_create_then_cancel_restores_stock() {
    let fx = fixture().await;
    let alice = fx.app.customer_token(7, "alice@x.com");

    let created = fx
        .app
        .post(
            "/api/backorders/create",
            Some(&alice),
            checkout("alice@x.com", fx.product_id, fx.variant_id, 2),
        )
        .await;
    assert_eq!(created.status, StatusCode::CREATED);
    assert_eq!(created.json["success"], true);
    assert_eq!(created.json["message"], "Backorder created successfully");
    let order_id = created.json["orderId"].as_i64().unwrap();
    assert_eq!(fx.stock().await, -2);

    let status = fx
        .app
        .get(&format!("/api/backorders/status?orderId={order_id}"), Some(&alice))
        .await;
    assert_eq!(status.status, StatusCode::OK);
    assert_eq!(status.json["status"], "PENDING");
    assert_eq!(status.json["orderType"], "backorder");
    assert_eq!(status.json["totalAmount"], "99.98");

    let cancelled = fx
        .app
        .put(
            "/api/backorders/cancel",
            Some(&alice),
            json!({ "orderId": order_id, "reason": "Found it elsewhere" }),
        )
        .await;
    assert_eq!(cancelled.status, StatusCode::OK);
    assert_eq!(cancelled.json["order"]["status"], "CANCELLED");
    assert_eq!(cancelled.json["order"]["cancellationReason"], "Found it elsewhere");
    assert_eq!(fx.stock().await, 0);

    let twice = fx
        .app
        .put("/api/backorders/cancel", Some(&alice), json!({ "orderId": order_id }))
        .await;
    assert_eq!(twice.status, StatusCode::CONFLICT);
    assert_eq!(fx.stock().await, 0);
}

#[tokio::test]
async fn test_create_requires_customer_token() {
    let fx = fixture().await;

    let response = fx
        .app
        .post(
            "/api/backorders/create",
            None,
            checkout("alice@x.com", fx.product_id, fx.variant_id, 1),
        )
        .await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_create_validates_checkout() {
    let fx = fixture().await;
    let alice = fx.app.customer_token(7, "alice@x.com");

    let zero = checkout("alice@x.com", fx.product_id, fx.variant_id, 0);
    let response = fx.app.post("/api/backorders/create", Some(&alice), zero).await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);

    let mut no_city = checkout("alice@x.com", fx.product_id, fx.variant_id, 1);
    no_city["shippingCity"] = json!("  ");
    let response = fx.app.post("/api/backorders/create", Some(&alice), no_city).await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.json["error"], "Shipping city is required");

    let mut wrong_total = checkout("alice@x.com", fx.product_id, fx.variant_id, 2);
    wrong_total["totalAmount"] = json!("10.00");
    let response = fx
        .app
        .post("/api/backorders/create", Some(&alice), wrong_total)
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);

    assert_eq!(fx.stock().await, 0);
}

#[tokio::test]
async fn test_customers_only_see_their_own_backorders() {
    let fx = fixture().await;
    let alice = fx.app.customer_token(7, "alice@x.com");
    let mallory = fx.app.customer_token(8, "mallory@x.com");
    let order_id = fx.backorder(&alice, "alice@x.com", 1).await;

    let peek = fx
        .app
        .get(&format!("/api/backorders/status?orderId={order_id}"), Some(&mallory))
        .await;
    assert_eq!(peek.status, StatusCode::FORBIDDEN);

    let list = fx
        .app
        .get("/api/backorders/status?userId=7", Some(&mallory))
        .await;
    assert_eq!(list.status, StatusCode::FORBIDDEN);

    let cancel = fx
        .app
        .put("/api/backorders/cancel", Some(&mallory), json!({ "orderId": order_id }))
        .await;
    assert_eq!(cancel.status, StatusCode::FORBIDDEN);

    let own = fx
        .app
        .get("/api/backorders/status?userId=7", Some(&alice))
        .await;
    assert_eq!(own.status, StatusCode::OK);
    assert_eq!(own.json.as_array().unwrap().len(), 1);

    let admin = fx.app.admin_token();
    let by_admin = fx
        .app
        .get(&format!("/api/backorders/status?orderId={order_id}"), Some(&admin))
        .await;
    assert_eq!(by_admin.status, StatusCode::OK);

    let neither = fx.app.get("/api/backorders/status", Some(&alice)).await;
    assert_eq!(neither.status, StatusCode::BAD_REQUEST);
}

// =============================================================================
// FIFO fulfillment
// =============================================================================

#[tokio::test]
async fn test_received_stock_is_handed_out_in_priority_order() {
    let fx = fixture().await;
    let admin = fx.app.admin_token();
    let alice = fx.app.customer_token(7, "alice@x.com");
    let bob = fx.app.customer_token(9, "bob@x.com");

    let first = fx.backorder(&alice, "alice@x.com", 1).await;
    let second = fx.backorder(&bob, "bob@x.com", 1).await;
    assert_eq!(fx.stock().await, -2);

    let received = fx
        .app
        .put(
            "/api/admin/backorders/fulfill",
            Some(&admin),
            json!({ "productId": fx.product_id, "variantId": fx.variant_id, "quantity": 1 }),
        )
        .await;
    assert_eq!(received.status, StatusCode::OK);
    assert_eq!(received.json["fulfilledOrderIds"], json!([first]));
    assert_eq!(received.json["stillPending"], 1);
    assert!(received.json["waitlist"].is_null());

    let jump_the_queue = fx
        .app
        .put(
            "/api/admin/backorders/fulfill",
            Some(&admin),
            json!({ "orderId": second }),
        )
        .await;
    assert_eq!(jump_the_queue.status, StatusCode::CONFLICT);

    let more = fx
        .app
        .put(
            "/api/admin/backorders/fulfill",
            Some(&admin),
            json!({ "productId": fx.product_id, "variantId": fx.variant_id, "quantity": 2 }),
        )
        .await;
    assert_eq!(more.json["fulfilledOrderIds"], json!([second]));
    assert_eq!(more.json["stillPending"], 0);
    assert_eq!(more.json["waitlist"]["recipients"], 0);
    assert_eq!(fx.stock().await, 1);

    let alice_mail = fx.app.mailer.sent_to("alice@x.com").await;
    assert_eq!(alice_mail.len(), 1);
    assert!(alice_mail[0].subject.contains("wird jetzt vorbereitet"));

    let status = fx
        .app
        .get(&format!("/api/backorders/status?orderId={first}"), Some(&alice))
        .await;
    assert_eq!(status.json["status"], "PROCESSING");
    assert!(status.json["fulfilledAt"].is_string());
}

#[tokio::test]
async fn test_fulfill_single_backorder_when_covered() {
    let fx = fixture().await;
    let admin = fx.app.admin_token();
    let alice = fx.app.customer_token(7, "alice@x.com");
    let order_id = fx.backorder(&alice, "alice@x.com", 1).await;

    fx.app
        .store
        .restore_stock(&[StockLine::new(fx.key(), 1)])
        .await
        .unwrap();

    let fulfilled = fx
        .app
        .put(
            "/api/admin/backorders/fulfill",
            Some(&admin),
            json!({ "orderId": order_id }),
        )
        .await;
    assert_eq!(fulfilled.status, StatusCode::OK);
    assert_eq!(fulfilled.json["order"]["status"], "PROCESSING");

    let missing_target = fx
        .app
        .put("/api/admin/backorders/fulfill", Some(&admin), json!({}))
        .await;
    assert_eq!(missing_target.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_fulfill_requires_admin() {
    let fx = fixture().await;
    let alice = fx.app.customer_token(7, "alice@x.com");
    let order_id = fx.backorder(&alice, "alice@x.com", 1).await;

    let response = fx
        .app
        .put(
            "/api/admin/backorders/fulfill",
            Some(&alice),
            json!({ "orderId": order_id }),
        )
        .await;
    assert_eq!(response.status, StatusCode::FORBIDDEN);
}

// =============================================================================
// Delays
// =============================================================================

#[tokio::test]
async fn test_delay_emails_customer() {
    let fx = fixture().await;
    let admin = fx.app.admin_token();
    let alice = fx.app.customer_token(7, "alice@x.com");
    let order_id = fx.backorder(&alice, "alice@x.com", 1).await;
    let new_date = (Utc::now() + Duration::days(21)).to_rfc3339();

    let delayed = fx
        .app
        .post(
            "/api/admin/backorders/delay",
            Some(&admin),
            json!({ "orderId": order_id, "newDate": new_date }),
        )
        .await;
    assert_eq!(delayed.status, StatusCode::OK);
    assert_eq!(delayed.json["notification"]["success"], true);
    assert!(delayed.json["order"]["expectedFulfillmentDate"].is_string());

    let mail = fx.app.mailer.sent_to("alice@x.com").await;
    assert_eq!(mail.len(), 1);
    assert!(mail[0].subject.starts_with("Lieferverzögerung für Ihre Bestellung"));
    assert!(mail[0].text.contains("Pullover"));
    assert!(mail[0].html.contains("action=cancel"));
}

#[tokio::test]
async fn test_delay_rejects_past_dates_and_closed_backorders() {
    let fx = fixture().await;
    let admin = fx.app.admin_token();
    let alice = fx.app.customer_token(7, "alice@x.com");
    let order_id = fx.backorder(&alice, "alice@x.com", 1).await;

    let past = fx
        .app
        .post(
            "/api/admin/backorders/delay",
            Some(&admin),
            json!({ "orderId": order_id, "newDate": (Utc::now() - Duration::days(1)).to_rfc3339() }),
        )
        .await;
    assert_eq!(past.status, StatusCode::BAD_REQUEST);
    assert_eq!(past.json["error"], "New date must be in the future");

    fx.app
        .put("/api/backorders/cancel", Some(&alice), json!({ "orderId": order_id }))
        .await;
    let closed = fx
        .app
        .post(
            "/api/admin/backorders/delay",
            Some(&admin),
            json!({ "orderId": order_id }),
        )
        .await;
    assert_eq!(closed.status, StatusCode::CONFLICT);
    assert!(fx.app.mailer.sent_to("alice@x.com").await.is_empty());
}

// =============================================================================
// Admin listing
// =============================================================================

#[tokio::test]
async fn test_admin_listing_counts_by_status() {
    let fx = fixture().await;
    let admin = fx.app.admin_token();
    let alice = fx.app.customer_token(7, "alice@x.com");
    let keep = fx.backorder(&alice, "alice@x.com", 1).await;
    let drop = fx.backorder(&alice, "alice@x.com", 1).await;
    fx.app
        .put("/api/backorders/cancel", Some(&alice), json!({ "orderId": drop }))
        .await;

    let pending = fx
        .app
        .get("/api/admin/backorders?status=PENDING", Some(&admin))
        .await;
    assert_eq!(pending.status, StatusCode::OK);
    assert_eq!(pending.json["total"], 1);
    assert_eq!(pending.json["data"][0]["id"], keep);
    assert_eq!(pending.json["counts"]["PENDING"], 1);
    assert_eq!(pending.json["counts"]["CANCELLED"], 1);
    assert_eq!(pending.json["counts"]["SHIPPED"], 0);

    let all = fx
        .app
        .get("/api/admin/backorders?perPage=1", Some(&admin))
        .await;
    assert_eq!(all.json["total"], 2);
    assert_eq!(all.json["perPage"], 1);
    assert_eq!(all.json["data"].as_array().unwrap().len(), 1);
}
