//! Cart endpoints and authentication.

mod common;

use common::TestHarness;
use serde_json::{json, Value};
use uuid::Uuid;

#[tokio::test]
async fn cart_requires_a_valid_token() {
    let harness = TestHarness::new().await;

    harness
        .server
        .get("/api/v1/cart")
        .await
        .assert_status_unauthorized();

    let response = harness
        .server
        .get("/api/v1/cart")
        .authorization_bearer("not-a-jwt")
        .await;
    response.assert_status_unauthorized();
    let body: Value = response.json();
    assert_eq!(body["error"]["code"], "unauthorized");
}

#[tokio::test]
async fn first_request_creates_client_profile() {
    let harness = TestHarness::new().await;

    let response = harness
        .server
        .get("/api/v1/me")
        .authorization_bearer(harness.customer_token())
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["role"], "client");
    assert_eq!(body["user_id"], harness.customer_id.to_string());

    let response = harness
        .server
        .put("/api/v1/me")
        .authorization_bearer(harness.customer_token())
        .json(&json!({ "full_name": "Ada Lovelace", "default_shipping": common::shipping_json() }))
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["full_name"], "Ada Lovelace");
    assert_eq!(body["role"], "client");
}

#[tokio::test]
async fn adds_items_and_prices_the_cart() {
    let harness = TestHarness::new().await;
    let token = harness.customer_token();
    let catalog = &harness.catalog;

    harness
        .add_to_cart(&token, &catalog.thyroid_listing, 2)
        .await
        .assert_status_ok();
    let response = harness.add_to_cart(&token, &catalog.vitamin_listing, 1).await;
    response.assert_status_ok();

    let body: Value = response.json();
    assert_eq!(body["item_count"], 3);
    assert_eq!(body["total"]["amount"], 2 * 4900 + 2900);
    assert_eq!(body["items"][0]["line_total"]["amount"], 9800);
    assert!(body.get("issues").is_none());

    // Adding the same listing again accumulates.
    let body: Value = harness
        .add_to_cart(&token, &catalog.vitamin_listing, 2)
        .await
        .json();
    assert_eq!(body["item_count"], 5);
}

#[tokio::test]
async fn rejects_quantities_beyond_stock() {
    let harness = TestHarness::new().await;
    let token = harness.customer_token();

    let response = harness
        .add_to_cart(&token, &harness.catalog.thyroid_listing, 6)
        .await;
    response.assert_status(axum::http::StatusCode::CONFLICT);
    let body: Value = response.json();
    assert_eq!(body["error"]["code"], "out_of_stock");
    assert_eq!(body["error"]["details"]["available"], 5);
    assert_eq!(body["error"]["details"]["requested"], 6);

    let response = harness
        .add_to_cart(&token, &harness.catalog.vitamin_listing, 11)
        .await;
    response.assert_status(axum::http::StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn unknown_listing_is_not_found() {
    let harness = TestHarness::new().await;

    let response = harness
        .server
        .post("/api/v1/cart/items")
        .authorization_bearer(harness.customer_token())
        .json(&json!({ "partner_product_id": Uuid::new_v4() }))
        .await;
    response.assert_status_not_found();
}

#[tokio::test]
async fn updates_removes_and_clears_lines() {
    let harness = TestHarness::new().await;
    let token = harness.customer_token();
    let thyroid = &harness.catalog.thyroid_listing;
    let vitamin = &harness.catalog.vitamin_listing;

    harness.add_to_cart(&token, thyroid, 1).await.assert_status_ok();
    harness.add_to_cart(&token, vitamin, 1).await.assert_status_ok();

    let body: Value = harness
        .server
        .put(&format!("/api/v1/cart/items/{}", thyroid.id))
        .authorization_bearer(&token)
        .json(&json!({ "quantity": 3 }))
        .await
        .json();
    assert_eq!(body["item_count"], 4);

    let body: Value = harness
        .server
        .put(&format!("/api/v1/cart/items/{}", thyroid.id))
        .authorization_bearer(&token)
        .json(&json!({ "quantity": 0 }))
        .await
        .json();
    assert_eq!(body["item_count"], 1);

    let body: Value = harness
        .server
        .delete(&format!("/api/v1/cart/items/{}", vitamin.id))
        .authorization_bearer(&token)
        .await
        .json();
    assert_eq!(body["item_count"], 0);
    assert!(body.get("total").is_none());

    harness
        .server
        .delete(&format!("/api/v1/cart/items/{}", vitamin.id))
        .authorization_bearer(&token)
        .await
        .assert_status_not_found();

    harness.add_to_cart(&token, vitamin, 2).await.assert_status_ok();
    harness
        .server
        .delete("/api/v1/cart")
        .authorization_bearer(&token)
        .await
        .assert_status(axum::http::StatusCode::NO_CONTENT);
    let body: Value = harness
        .server
        .get("/api/v1/cart")
        .authorization_bearer(&token)
        .await
        .json();
    assert_eq!(body["item_count"], 0);
}

#[tokio::test]
async fn carts_are_per_user() {
    let harness = TestHarness::new().await;
    let other = harness.token_for(Uuid::new_v4());

    harness
        .add_to_cart(&harness.customer_token(), &harness.catalog.vitamin_listing, 1)
        .await
        .assert_status_ok();

    let body: Value = harness
        .server
        .get("/api/v1/cart")
        .authorization_bearer(other)
        .await
        .json();
    assert_eq!(body["item_count"], 0);
}
