//! The coin verification wizard, end to end, and the expert review that
//! follows in the admin API.

use numisma_integration_tests::{TestContext, client};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, StatusCode};
use serde_json::{Value, json};

const JPEG: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10];

async fn photo(ctx: &TestContext, client: &Client, slot: u8, side: &str) -> StatusCode {
    let image = Part::bytes(JPEG.to_vec())
        .file_name(format!("coin-{slot}-{side}.jpg"))
        .mime_str("image/jpeg")
        .expect("Invalid MIME type");
    let form = Form::new()
        .text("slot", slot.to_string())
        .text("side", side.to_string())
        .part("image", image);
    client
        .post(ctx.store("/api/verification/photos"))
        .multipart(form)
        .send()
        .await
        .expect("Photo upload failed")
        .status()
}

async fn post(client: &Client, url: String) -> (StatusCode, Value) {
    let resp = client.post(url).send().await.expect("Request failed");
    let status = resp.status();
    (status, resp.json().await.unwrap_or(Value::Null))
}

/// Walk a fresh draft through details and upload, ready for payment.
async fn draft_with_photos(ctx: &TestContext, client: &Client, coins: u8) {
    let (status, _) = post(client, ctx.store("/api/verification")).await;
    assert_eq!(status, StatusCode::CREATED);

    let resp = client
        .put(ctx.store("/api/verification/details"))
        .json(&json!({ "name": "Asha Rao", "phone": "98765 43210", "coin_count": coins }))
        .send()
        .await
        .expect("Details request failed");
    assert_eq!(resp.status(), StatusCode::OK);

    let (status, draft) = post(client, ctx.store("/api/verification/advance")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(draft["step"], "upload");

    let slots = draft["slots"].as_array().map_or(0, Vec::len);
    for slot in 1..=u8::try_from(slots).expect("Too many slots") {
        assert_eq!(photo(ctx, client, slot, "front").await, StatusCode::OK);
        assert_eq!(photo(ctx, client, slot, "back").await, StatusCode::OK);
    }
}

#[tokio::test]
async fn test_anonymous_submission() {
    let ctx = TestContext::start().await;
    let client = client();
    draft_with_photos(&ctx, &client, 2).await;

    let (status, body) = post(&client, ctx.store("/api/verification/pay")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["payment"]["amount"], 40);
    assert_eq!(body["draft"]["step"], "payment");

    let (status, submission) = post(&client, ctx.store("/api/verification/submit")).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(submission["status"], "pending");
    assert_eq!(submission["user_id"], Value::Null);
    assert_eq!(submission["coin_count"], 2);

    // The draft is gone once submitted.
    let resp = client
        .get(ctx.store("/api/verification"))
        .send()
        .await
        .expect("Draft request failed");
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_bonus_slot_is_free() {
    let ctx = TestContext::start().await;
    let (client, _) = ctx.sign_up("asha@example.com").await;
    draft_with_photos(&ctx, &client, 5).await;

    let (status, body) = post(&client, ctx.store("/api/verification/pay")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["payment"]["amount"], 100);
    assert_eq!(body["draft"]["quote"]["totalCoinsToUpload"], 6);

    let (status, _) = post(&client, ctx.store("/api/verification/submit")).await;
    assert_eq!(status, StatusCode::CREATED);

    let mine: Value = client
        .get(ctx.store("/api/verification/mine"))
        .send()
        .await
        .expect("History request failed")
        .json()
        .await
        .expect("History body is not JSON");
    assert_eq!(mine.as_array().map(Vec::len), Some(1));
    assert_eq!(mine[0]["total_coins"], 6);
}

#[tokio::test]
async fn test_payment_needs_every_photo() {
    let ctx = TestContext::start().await;
    let client = client();
    post(&client, ctx.store("/api/verification")).await;
    client
        .put(ctx.store("/api/verification/details"))
        .json(&json!({ "name": "Asha Rao", "phone": "9876543210", "coin_count": 1 }))
        .send()
        .await
        .expect("Details request failed");
    post(&client, ctx.store("/api/verification/advance")).await;
    assert_eq!(photo(&ctx, &client, 1, "front").await, StatusCode::OK);

    let (status, _) = post(&client, ctx.store("/api/verification/pay")).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_invalid_details_do_not_advance() {
    let ctx = TestContext::start().await;
    let client = client();
    post(&client, ctx.store("/api/verification")).await;

    client
        .put(ctx.store("/api/verification/details"))
        .json(&json!({ "name": "", "phone": "12345", "coin_count": 9 }))
        .send()
        .await
        .expect("Details request failed");

    let (status, _) = post(&client, ctx.store("/api/verification/advance")).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_expert_review_is_final() {
    let ctx = TestContext::start().await;
    let client = client();
    draft_with_photos(&ctx, &client, 1).await;
    post(&client, ctx.store("/api/verification/pay")).await;
    let (_, submission) = post(&client, ctx.store("/api/verification/submit")).await;
    let id = submission["id"].as_str().expect("No submission id");

    let (admin, _) = ctx.admin_client("expert@example.com").await;
    let queue: Value = admin
        .get(ctx.admin("/api/verifications"))
        .query(&[("status", "pending")])
        .send()
        .await
        .expect("Queue request failed")
        .json()
        .await
        .expect("Queue body is not JSON");
    assert_eq!(queue["count"], 1);

    let review = |status: &'static str| {
        admin
            .post(ctx.admin(&format!("/api/verifications/{id}/review")))
            .json(&json!({ "status": status, "expert_notes": "  Die axis and edge reeding check out. " }))
            .send()
    };

    let resp = review("authentic").await.expect("Review failed");
    assert_eq!(resp.status(), StatusCode::OK);
    let reviewed: Value = resp.json().await.expect("Review body is not JSON");
    assert_eq!(reviewed["status"], "authentic");
    assert_eq!(reviewed["expert_notes"], "Die axis and edge reeding check out.");

    let resp = review("not_authentic").await.expect("Review failed");
    assert_eq!(resp.status(), StatusCode::CONFLICT);
}
