use actix_web::{http::StatusCode, web, web::ServiceConfig};
use chrono::Utc;
use gamestore_common::Cents;
use gamestore_engine::{
    db_types::{Order, OrderStatusType},
    events::EventProducers,
    test_utils::{prepare_test_env, random_db_path, seed_buyer_and_game, FakeGateway},
    traits::{AccountManagement, FulfillmentDatabase},
    FulfillmentApi,
    SqliteDatabase,
};
use serde_json::{json, Value};
use stripe_tools::webhook::sign_payload;

use super::helpers::{webhook_request, TEST_WEBHOOK_SECRET};
use crate::routes::PaymentWebhookRoute;

struct Fixture {
    db: SqliteDatabase,
    gateway: FakeGateway,
    order: Order,
}

impl Fixture {
    async fn new() -> Self {
        let url = random_db_path();
        prepare_test_env(&url).await;
        let db = SqliteDatabase::new_with_url(&url, 5).await.expect("Error creating connection to database");
        let gateway = FakeGateway::new();
        let (buyer, game) = seed_buyer_and_game(&db, Cents::from(1999)).await;
        let api = FulfillmentApi::new(db.clone(), gateway.clone(), EventProducers::default());
        let handle = api.initiate(buyer.id, game.id).await.expect("Could not start purchase");
        let order = db.fetch_order_by_order_id(&handle.order_id).await.unwrap().unwrap();
        Self { db, gateway, order }
    }

    fn configure(&self) -> impl FnOnce(&mut ServiceConfig) {
        let db = self.db.clone();
        let gateway = self.gateway.clone();
        move |cfg| {
            let api = FulfillmentApi::new(db, gateway, EventProducers::default());
            cfg.service(PaymentWebhookRoute::<SqliteDatabase, FakeGateway>::new()).app_data(web::Data::new(api));
        }
    }

    async fn post_signed(&self, body: &str) -> (StatusCode, String) {
        webhook_request(body, Some(sign(body, TEST_WEBHOOK_SECRET)), self.configure()).await
    }

    async fn current_status(&self) -> OrderStatusType {
        self.db.fetch_order_by_order_id(&self.order.order_id).await.unwrap().unwrap().status
    }
}

fn sign(body: &str, secret: &str) -> String {
    sign_payload(secret, Utc::now().timestamp(), body.as_bytes()).unwrap()
}

fn session_object(order: &Order, status: &str, payment_status: &str) -> Value {
    json!({
        "id": order.session_id,
        "object": "checkout.session",
        "url": null,
        "client_secret": null,
        "status": status,
        "payment_status": payment_status,
        "amount_total": order.amount.value(),
        "currency": order.currency,
        "customer_email": "buyer@example.com",
        "metadata": {
            "order_id": order.order_id.to_string(),
            "buyer_id": order.buyer_id.to_string(),
            "game_id": order.game_id.to_string()
        },
        "payment_intent": "pi_3PqZ9vLkdIwHu7ix0dGm1Xq2",
        "invoice": null
    })
}

fn event(event_type: &str, object: Value) -> String {
    json!({
        "id": format!("evt_{}", rand::random::<u32>()),
        "object": "event",
        "type": event_type,
        "created": Utc::now().timestamp(),
        "livemode": false,
        "data": { "object": object }
    })
    .to_string()
}

fn paid_event(order: &Order) -> String {
    event("checkout.session.completed", session_object(order, "complete", "paid"))
}

#[actix_web::test]
async fn paid_event_confirms_order() {
    let fx = Fixture::new().await;
    let body = paid_event(&fx.order);
    let (status, res) = fx.post_signed(&body).await;
    assert_eq!(status, StatusCode::OK, "{res}");
    assert_eq!(fx.current_status().await, OrderStatusType::Confirmed);
    assert!(fx.db.owns_game(fx.order.buyer_id, fx.order.game_id).await.unwrap());

    // Stripe redelivers. Nothing changes and the entitlement is not duplicated.
    let (status, _) = fx.post_signed(&body).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fx.current_status().await, OrderStatusType::Confirmed);
    let entitlements = fx.db.fetch_entitlements_for_buyer(fx.order.buyer_id).await.unwrap();
    assert_eq!(entitlements.len(), 1);
}

#[actix_web::test]
async fn async_payment_failure_cancels_order() {
    let fx = Fixture::new().await;
    let body = event("checkout.session.async_payment_failed", session_object(&fx.order, "complete", "unpaid"));
    let (status, _) = fx.post_signed(&body).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fx.current_status().await, OrderStatusType::Cancelled);
}

#[actix_web::test]
async fn bad_signature_is_rejected() {
    let fx = Fixture::new().await;
    let body = paid_event(&fx.order);
    let sig = sign(&body, "whsec_somebody_else");
    let (status, _) = webhook_request(&body, Some(sig), fx.configure()).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(fx.current_status().await, OrderStatusType::Pending);
}

#[actix_web::test]
async fn tampered_body_is_rejected() {
    let fx = Fixture::new().await;
    let body = paid_event(&fx.order);
    let sig = sign(&body, TEST_WEBHOOK_SECRET);
    let tampered = body.replace("1999", "1");
    let (status, _) = webhook_request(&tampered, Some(sig), fx.configure()).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(fx.current_status().await, OrderStatusType::Pending);
}

#[actix_web::test]
async fn missing_signature_is_rejected() {
    let fx = Fixture::new().await;
    let body = paid_event(&fx.order);
    let (status, _) = webhook_request(&body, None, fx.configure()).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(fx.current_status().await, OrderStatusType::Pending);
}

#[actix_web::test]
async fn stale_signature_is_rejected() {
    let fx = Fixture::new().await;
    let body = paid_event(&fx.order);
    let sig = sign_payload(TEST_WEBHOOK_SECRET, Utc::now().timestamp() - 3600, body.as_bytes()).unwrap();
    let (status, _) = webhook_request(&body, Some(sig), fx.configure()).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(fx.current_status().await, OrderStatusType::Pending);
}

#[actix_web::test]
async fn expiry_after_confirmation_is_acknowledged() {
    let fx = Fixture::new().await;
    let (status, _) = fx.post_signed(&paid_event(&fx.order)).await;
    assert_eq!(status, StatusCode::OK);
    let body = event("checkout.session.expired", session_object(&fx.order, "expired", "unpaid"));
    let (status, _) = fx.post_signed(&body).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fx.current_status().await, OrderStatusType::Confirmed);
}

#[actix_web::test]
async fn payment_for_cancelled_order_is_acknowledged() {
    let fx = Fixture::new().await;
    let body = event("checkout.session.expired", session_object(&fx.order, "expired", "unpaid"));
    let (status, _) = fx.post_signed(&body).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fx.current_status().await, OrderStatusType::Cancelled);

    let (status, _) = fx.post_signed(&paid_event(&fx.order)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fx.current_status().await, OrderStatusType::Cancelled);
    assert!(!fx.db.owns_game(fx.order.buyer_id, fx.order.game_id).await.unwrap());
}

#[actix_web::test]
async fn unrelated_events_are_ignored() {
    let fx = Fixture::new().await;
    let body = event("payment_intent.created", json!({ "id": "pi_123", "object": "payment_intent" }));
    let (status, _) = fx.post_signed(&body).await;
    assert_eq!(status, StatusCode::OK);

    let unpaid = event("checkout.session.completed", session_object(&fx.order, "complete", "unpaid"));
    let (status, _) = fx.post_signed(&unpaid).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fx.current_status().await, OrderStatusType::Pending);
}

#[actix_web::test]
async fn amount_mismatch_is_rejected() {
    let fx = Fixture::new().await;
    let mut session = session_object(&fx.order, "complete", "paid");
    session["amount_total"] = json!(1);
    let (status, _) = fx.post_signed(&event("checkout.session.completed", session)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(fx.current_status().await, OrderStatusType::Pending);
}

#[actix_web::test]
async fn missing_metadata_is_rejected() {
    let fx = Fixture::new().await;
    let mut session = session_object(&fx.order, "complete", "paid");
    session["metadata"] = json!({});
    let (status, _) = fx.post_signed(&event("checkout.session.completed", session)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(fx.current_status().await, OrderStatusType::Pending);
}

#[actix_web::test]
async fn unknown_order_is_acknowledged() {
    let fx = Fixture::new().await;
    let mut session = session_object(&fx.order, "complete", "paid");
    session["metadata"]["order_id"] = json!("gs_does_not_exist");
    let (status, _) = fx.post_signed(&event("checkout.session.completed", session)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fx.current_status().await, OrderStatusType::Pending);
}

#[actix_web::test]
async fn malformed_payload_is_rejected() {
    let fx = Fixture::new().await;
    let (status, _) = fx.post_signed("{\"id\": \"evt_1\", \"type\": ").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
