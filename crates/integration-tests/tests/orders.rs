//! Integration tests for checkout and the order status state machine.

use axum::http::StatusCode;
use rust_decimal_macros::dec;
use serde_json::{Value, json};

use attireburg_core::{ProductId, StockKey};
use attireburg_integration_tests::TestApp;
use attireburg_server::db::CatalogStore;

fn checkout(product_id: ProductId, quantity: i32) -> Value {
    json!({
        "email": "kunde@example.com",
        "items": [{
            "productId": product_id,
            "quantity": quantity,
            "size": "One Size",
            "price": "39.00"
        }],
        "shippingAddress": "Hauptstraße 1",
        "shippingCity": "Berlin",
        "shippingPostal": "10115"
    })
}

async fn status(app: &TestApp, token: &str, order_id: &Value, to: &str) -> (StatusCode, Value) {
    let response = app
        .put(
            &format!("/api/admin/orders/{order_id}/status"),
            Some(token),
            json!({ "status": to, "trackingNumber": "DHL-123456" }),
        )
        .await;
    (response.status, response.json)
}

#[tokio::test]
async fn test_place_order_reserves_stock() {
    let app = TestApp::new();
    let scarf = app.store.add_product("Schal", "schal", dec!(39), 3).await;
    let customer = app.customer_token(5, "kunde@example.com");

    let placed = app.post("/api/orders", Some(&customer), checkout(scarf.id, 2)).await;
    assert_eq!(placed.status, StatusCode::CREATED);
    assert_eq!(placed.json["status"], "PENDING");
    assert_eq!(placed.json["orderType"], "regular");
    assert_eq!(placed.json["totalAmount"], "78.00");
    assert_eq!(
        app.store.stock_level(StockKey::product(scarf.id)).await.unwrap(),
        Some(1)
    );

    let short = app.post("/api/orders", Some(&customer), checkout(scarf.id, 2)).await;
    assert_eq!(short.status, StatusCode::CONFLICT);
    assert!(
        short.json["error"]
            .as_str()
            .unwrap()
            .starts_with("Insufficient stock")
    );
    assert_eq!(
        app.store.stock_level(StockKey::product(scarf.id)).await.unwrap(),
        Some(1)
    );

    let unknown = app.post("/api/orders", Some(&customer), checkout(ProductId::new(77), 1)).await;
    assert_eq!(unknown.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_regular_order_is_not_a_backorder() {
    let app = TestApp::new();
    let scarf = app.store.add_product("Schal", "schal", dec!(39), 3).await;
    let customer = app.customer_token(5, "kunde@example.com");

    let placed = app.post("/api/orders", Some(&customer), checkout(scarf.id, 1)).await;
    let order_id = &placed.json["id"];

    let lookup = app
        .get(&format!("/api/backorders/status?orderId={order_id}"), Some(&customer))
        .await;
    assert_eq!(lookup.status, StatusCode::NOT_FOUND);
    assert_eq!(lookup.json["error"], "Backorder not found");
}

#[tokio::test]
async fn test_status_walk_and_rejected_transitions() {
    let app = TestApp::new();
    let admin = app.admin_token();
    let scarf = app.store.add_product("Schal", "schal", dec!(39), 3).await;
    let customer = app.customer_token(5, "kunde@example.com");
    let placed = app.post("/api/orders", Some(&customer), checkout(scarf.id, 1)).await;
    let order_id = placed.json["id"].clone();

    for to in ["CONFIRMED", "PROCESSING", "SHIPPED"] {
        let (code, body) = status(&app, &admin, &order_id, to).await;
        assert_eq!(code, StatusCode::OK, "{to}: {body}");
        assert_eq!(body["status"], to);
    }

    for back in ["PENDING", "CONFIRMED"] {
        let (code, body) = status(&app, &admin, &order_id, back).await;
        assert_eq!(code, StatusCode::CONFLICT);
        let message = body["error"].as_str().unwrap();
        assert!(message.contains("SHIPPED"), "{message}");
        assert!(message.contains(back), "{message}");
    }

    let shipped = app.mailer.sent_to("kunde@example.com").await;
    assert_eq!(shipped.len(), 1);
    assert!(shipped[0].text.contains("DHL-123456"));

    let history = app
        .get(&format!("/api/admin/orders/{order_id}/history"), Some(&admin))
        .await;
    assert_eq!(history.status, StatusCode::OK);
    let statuses: Vec<&str> = history
        .json
        .as_array()
        .unwrap()
        .iter()
        .map(|entry| entry["toStatus"].as_str().unwrap())
        .collect();
    assert_eq!(statuses, ["PENDING", "CONFIRMED", "PROCESSING", "SHIPPED"]);
    assert!(history.json[0]["fromStatus"].is_null());
}

#[tokio::test]
async fn test_admin_cancel_restores_stock() {
    let app = TestApp::new();
    let admin = app.admin_token();
    let scarf = app.store.add_product("Schal", "schal", dec!(39), 3).await;
    let customer = app.customer_token(5, "kunde@example.com");
    let placed = app.post("/api/orders", Some(&customer), checkout(scarf.id, 3)).await;
    let order_id = placed.json["id"].clone();
    assert_eq!(
        app.store.stock_level(StockKey::product(scarf.id)).await.unwrap(),
        Some(0)
    );

    let cancelled = app
        .put(
            &format!("/api/admin/orders/{order_id}/status"),
            Some(&admin),
            json!({ "status": "CANCELLED", "notes": "Payment failed" }),
        )
        .await;
    assert_eq!(cancelled.status, StatusCode::OK);
    assert_eq!(cancelled.json["cancellationReason"], "Payment failed");
    assert_eq!(
        app.store.stock_level(StockKey::product(scarf.id)).await.unwrap(),
        Some(3)
    );
}

#[tokio::test]
async fn test_status_routes_are_admin_only() {
    let app = TestApp::new();
    let customer = app.customer_token(5, "kunde@example.com");

    let update = app
        .put(
            "/api/admin/orders/1/status",
            Some(&customer),
            json!({ "status": "CONFIRMED" }),
        )
        .await;
    assert_eq!(update.status, StatusCode::FORBIDDEN);

    let admin = app.admin_token();
    let missing = app.get("/api/admin/orders/999/history", Some(&admin)).await;
    assert_eq!(missing.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_pending_backorder_is_not_moved_by_status_update() {
    let app = TestApp::new();
    let admin = app.admin_token();
    let coat = app.store.add_product("Mantel", "mantel", dec!(39), 0).await;
    let alice = app.customer_token(7, "alice@x.com");
    let bob = app.customer_token(9, "bob@x.com");

    let mut ids = Vec::new();
    for (token, email) in [(&alice, "alice@x.com"), (&bob, "bob@x.com")] {
        let created = app
            .post(
                "/api/backorders/create",
                Some(token),
                json!({
                    "email": email,
                    "items": [{
                        "productId": coat.id,
                        "quantity": 2,
                        "size": "One Size",
                        "price": "39.00"
                    }],
                    "shippingAddress": "Hauptstraße 1",
                    "shippingCity": "Berlin",
                    "shippingPostal": "10115"
                }),
            )
            .await;
        assert_eq!(created.status, StatusCode::CREATED, "{}", created.text);
        ids.push(created.json["orderId"].clone());
    }

    for to in ["PROCESSING", "CONFIRMED"] {
        let (code, body) = status(&app, &admin, &ids[1], to).await;
        assert_eq!(code, StatusCode::CONFLICT);
        assert!(
            body["error"]
                .as_str()
                .unwrap()
                .contains("/api/admin/backorders/fulfill")
        );
    }

    let received = app
        .put(
            "/api/admin/backorders/fulfill",
            Some(&admin),
            json!({ "productId": coat.id, "quantity": 2 }),
        )
        .await;
    assert_eq!(received.status, StatusCode::OK);
    assert_eq!(received.json["fulfilledOrderIds"], json!([ids[0]]));
    assert_eq!(received.json["stillPending"], 1);
}
