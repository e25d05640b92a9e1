//! Storefront flows: sign-up, cart, checkout and search.

use numisma_integration_tests::{TestContext, client, shipping_address};
use reqwest::StatusCode;
use serde_json::{Value, json};

#[tokio::test]
async fn test_health() {
    let ctx = TestContext::start().await;
    let resp = client()
        .get(ctx.store("/health"))
        .send()
        .await
        .expect("Health request failed");
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.text().await.expect("No body"), "ok");
}

#[tokio::test]
async fn test_cart_requires_sign_in() {
    let ctx = TestContext::start().await;
    let resp = client()
        .get(ctx.store("/api/cart"))
        .send()
        .await
        .expect("Cart request failed");
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_signup_starts_session() {
    let ctx = TestContext::start().await;
    let (client, id) = ctx.sign_up("asha@example.com").await;

    let me: Value = client
        .get(ctx.store("/api/auth/me"))
        .send()
        .await
        .expect("Me request failed")
        .json()
        .await
        .expect("Me body is not JSON");
    assert_eq!(me["user"]["id"], json!(id.to_string()));
    assert_eq!(me["user"]["email"], "asha@example.com");
}

#[tokio::test]
async fn test_duplicate_signup_conflicts() {
    let ctx = TestContext::start().await;
    ctx.sign_up("asha@example.com").await;

    let resp = client()
        .post(ctx.store("/api/auth/signup"))
        .json(&json!({
            "email": "asha@example.com",
            "password": numisma_integration_tests::PASSWORD,
            "confirm_password": numisma_integration_tests::PASSWORD,
        }))
        .send()
        .await
        .expect("Signup request failed");
    assert_eq!(resp.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_adding_twice_merges_cart_line() {
    let ctx = TestContext::start().await;
    let coin = ctx.listing("Mughal Silver Rupee", 18_500, 5).await;
    let (client, _) = ctx.sign_up("asha@example.com").await;

    for _ in 0..2 {
        let resp = client
            .post(ctx.store("/api/cart"))
            .json(&json!({ "coin_id": coin.id }))
            .send()
            .await
            .expect("Add to cart failed");
        assert_eq!(resp.status(), StatusCode::CREATED);
    }

    let cart: Value = client
        .get(ctx.store("/api/cart"))
        .send()
        .await
        .expect("Cart request failed")
        .json()
        .await
        .expect("Cart body is not JSON");
    let lines = cart["lines"].as_array().expect("No cart lines");
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0]["quantity"], 2);
    assert_eq!(cart["subtotal"], 37_000);

    let badge: Value = client
        .get(ctx.store("/api/cart/count"))
        .send()
        .await
        .expect("Badge request failed")
        .json()
        .await
        .expect("Badge body is not JSON");
    assert_eq!(badge["count"], 2);
}

#[tokio::test]
async fn test_checkout_places_order_and_empties_cart() {
    let ctx = TestContext::start().await;
    let coin = ctx.listing("1939 George VI Rupee", 3_200, 5).await;
    let (client, _) = ctx.sign_up("asha@example.com").await;

    client
        .post(ctx.store("/api/cart"))
        .json(&json!({ "coin_id": coin.id, "quantity": 2 }))
        .send()
        .await
        .expect("Add to cart failed");

    let resp = client
        .post(ctx.store("/api/checkout"))
        .json(&shipping_address())
        .send()
        .await
        .expect("Checkout failed");
    assert_eq!(resp.status(), StatusCode::CREATED);
    let placed: Value = resp.json().await.expect("Checkout body is not JSON");
    assert_eq!(placed["order"]["status"], "pending");
    assert_eq!(placed["order"]["total"], 6_400);
    assert_eq!(placed["payment"]["amount"], 6_400);
    let order_id = placed["order"]["id"].as_str().expect("No order id").to_string();

    let cart: Value = client
        .get(ctx.store("/api/cart"))
        .send()
        .await
        .expect("Cart request failed")
        .json()
        .await
        .expect("Cart body is not JSON");
    assert_eq!(cart["count"], 0);

    let orders: Value = client
        .get(ctx.store("/api/orders"))
        .send()
        .await
        .expect("Orders request failed")
        .json()
        .await
        .expect("Orders body is not JSON");
    assert_eq!(orders.as_array().map(Vec::len), Some(1));

    let stocked = ctx
        .repos
        .listings
        .get(coin.id)
        .await
        .expect("Listing lookup failed")
        .expect("Listing missing");
    assert_eq!(stocked.stock_quantity, 3);

    let resp = client
        .post(ctx.store(&format!("/api/orders/{order_id}/confirm-payment")))
        .send()
        .await
        .expect("Confirm payment failed");
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_other_users_order_is_not_found() {
    let ctx = TestContext::start().await;
    let coin = ctx.listing("Chola Copper Kasu", 1_200, 5).await;
    let (buyer, _) = ctx.sign_up("asha@example.com").await;
    let (other, _) = ctx.sign_up("ravi@example.com").await;

    buyer
        .post(ctx.store("/api/cart"))
        .json(&json!({ "coin_id": coin.id }))
        .send()
        .await
        .expect("Add to cart failed");
    let placed: Value = buyer
        .post(ctx.store("/api/checkout"))
        .json(&shipping_address())
        .send()
        .await
        .expect("Checkout failed")
        .json()
        .await
        .expect("Checkout body is not JSON");
    let order_id = placed["order"]["id"].as_str().expect("No order id");

    let resp = other
        .get(ctx.store(&format!("/api/orders/{order_id}")))
        .send()
        .await
        .expect("Order request failed");
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_course_prefix_restricts_search() {
    let ctx = TestContext::start().await;
    let body: Value = client()
        .get(ctx.store("/api/search"))
        .query(&[("q", "cour")])
        .send()
        .await
        .expect("Search request failed")
        .json()
        .await
        .expect("Search body is not JSON");

    let results = body["results"].as_array().expect("No results array");
    assert!(!results.is_empty());
    assert!(results.iter().all(|r| r["category"] == "course"));
}

#[tokio::test]
async fn test_blank_search_resolves_nowhere() {
    let ctx = TestContext::start().await;
    let resp = client()
        .get(ctx.store("/api/search/resolve"))
        .query(&[("q", "  ")])
        .send()
        .await
        .expect("Resolve request failed");
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}
