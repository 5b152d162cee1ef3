use actix_web::{http::StatusCode, web, web::ServiceConfig};
use gamestore_common::Cents;
use gamestore_engine::{
    db_types::{Entitlement, Order, OrderStatusType, Role},
    events::EventProducers,
    order_objects::PurchaseHandle,
    test_utils::{prepare_test_env, random_db_path, seed_buyer_and_game, FakeGateway},
    traits::AccountManagement,
    AccountApi,
    FulfillmentApi,
    SqliteDatabase,
};
use serde_json::json;

use super::helpers::{get_request, post_request, valid_token};
use crate::routes::{ConfirmPurchaseRoute, MyEntitlementsRoute, PurchaseRoute, VerifySessionRoute};

async fn setup() -> (SqliteDatabase, FakeGateway) {
    let url = random_db_path();
    prepare_test_env(&url).await;
    let db = SqliteDatabase::new_with_url(&url, 5).await.expect("Error creating connection to database");
    (db, FakeGateway::new())
}

fn configure(db: &SqliteDatabase, gateway: &FakeGateway) -> impl FnOnce(&mut ServiceConfig) {
    let db = db.clone();
    let gateway = gateway.clone();
    move |cfg| {
        let api = FulfillmentApi::new(db.clone(), gateway, EventProducers::default());
        cfg.service(PurchaseRoute::<SqliteDatabase, FakeGateway>::new())
            .service(VerifySessionRoute::<SqliteDatabase, FakeGateway>::new())
            .service(ConfirmPurchaseRoute::<SqliteDatabase, FakeGateway>::new())
            .service(MyEntitlementsRoute::<SqliteDatabase>::new())
            .app_data(web::Data::new(api))
            .app_data(web::Data::new(AccountApi::new(db)));
    }
}

#[actix_web::test]
async fn purchase_creates_pending_order() {
    let (db, gateway) = setup().await;
    let (buyer, game) = seed_buyer_and_game(&db, Cents::from(1999)).await;
    let token = valid_token(buyer.id, vec![Role::User]);
    let body = json!({ "game_id": game.id });
    let (status, body) = post_request(&token, "/api/purchases", body, configure(&db, &gateway)).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let handle: PurchaseHandle = serde_json::from_str(&body).unwrap();
    assert_eq!(handle.session_id, "cs_test_0001");
    assert_eq!(handle.amount, Cents::from(1999));
    assert_eq!(handle.currency, "usd");
    assert!(handle.redirect_url.is_some());

    let order = db.fetch_order_by_order_id(&handle.order_id).await.unwrap().expect("Order was not stored");
    assert_eq!(order.status, OrderStatusType::Pending);
    assert_eq!(order.buyer_id, buyer.id);
    let requests = gateway.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].correlation.order_id, handle.order_id);
    assert_eq!(requests[0].customer_email.as_deref(), Some(buyer.email.as_str()));
}

#[actix_web::test]
async fn purchase_unknown_game() {
    let (db, gateway) = setup().await;
    let (buyer, _) = seed_buyer_and_game(&db, Cents::from(500)).await;
    let token = valid_token(buyer.id, vec![Role::User]);
    let (status, _) =
        post_request(&token, "/api/purchases", json!({ "game_id": 999_999 }), configure(&db, &gateway)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(gateway.requests().is_empty());
}

#[actix_web::test]
async fn purchase_with_bad_body() {
    let (db, gateway) = setup().await;
    let token = valid_token(1, vec![Role::User]);
    let (status, _) = post_request(&token, "/api/purchases", json!({ "game": 1 }), configure(&db, &gateway)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn purchase_while_gateway_is_down() {
    let (db, gateway) = setup().await;
    let (buyer, game) = seed_buyer_and_game(&db, Cents::from(1999)).await;
    gateway.set_unavailable(true);
    let token = valid_token(buyer.id, vec![Role::User]);
    let (status, _) =
        post_request(&token, "/api/purchases", json!({ "game_id": game.id }), configure(&db, &gateway)).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    let orders = db.fetch_orders_for_buyer(buyer.id).await.unwrap();
    assert!(orders.is_empty());
}

#[actix_web::test]
async fn confirm_and_repurchase() {
    let (db, gateway) = setup().await;
    let (buyer, game) = seed_buyer_and_game(&db, Cents::from(2500)).await;
    let token = valid_token(buyer.id, vec![Role::User]);
    let (_, body) =
        post_request(&token, "/api/purchases", json!({ "game_id": game.id }), configure(&db, &gateway)).await;
    let handle: PurchaseHandle = serde_json::from_str(&body).unwrap();
    let confirm_path = format!("/api/purchases/{}/confirm", handle.order_id);

    // Not paid yet. The order stays pending.
    let (status, body) = post_request(&token, &confirm_path, json!({}), configure(&db, &gateway)).await;
    assert_eq!(status, StatusCode::OK);
    let order: Order = serde_json::from_str(&body).unwrap();
    assert_eq!(order.status, OrderStatusType::Pending);

    gateway.pay_session(&handle.session_id);
    let (status, body) = post_request(&token, &confirm_path, json!({}), configure(&db, &gateway)).await;
    assert_eq!(status, StatusCode::OK);
    let order: Order = serde_json::from_str(&body).unwrap();
    assert_eq!(order.status, OrderStatusType::Confirmed);
    assert_eq!(gateway.retrievals(), 2);

    let (status, body) = get_request(&token, "/api/entitlements", configure(&db, &gateway)).await;
    assert_eq!(status, StatusCode::OK);
    let entitlements: Vec<Entitlement> = serde_json::from_str(&body).unwrap();
    assert_eq!(entitlements.len(), 1);
    assert_eq!(entitlements[0].game_id, game.id);

    let (status, _) =
        post_request(&token, "/api/purchases", json!({ "game_id": game.id }), configure(&db, &gateway)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(gateway.requests().len(), 1);
}

#[actix_web::test]
async fn confirm_another_buyers_order() {
    let (db, gateway) = setup().await;
    let (buyer, game) = seed_buyer_and_game(&db, Cents::from(2500)).await;
    let (intruder, _) = seed_buyer_and_game(&db, Cents::from(100)).await;
    let token = valid_token(buyer.id, vec![Role::User]);
    let (_, body) =
        post_request(&token, "/api/purchases", json!({ "game_id": game.id }), configure(&db, &gateway)).await;
    let handle: PurchaseHandle = serde_json::from_str(&body).unwrap();
    gateway.pay_session(&handle.session_id);

    let token = valid_token(intruder.id, vec![Role::User]);
    let path = format!("/api/purchases/{}/confirm", handle.order_id);
    let (status, _) = post_request(&token, &path, json!({}), configure(&db, &gateway)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let order = db.fetch_order_by_order_id(&handle.order_id).await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatusType::Pending);
}

#[actix_web::test]
async fn verify_expired_session() {
    let (db, gateway) = setup().await;
    let (buyer, game) = seed_buyer_and_game(&db, Cents::from(999)).await;
    let token = valid_token(buyer.id, vec![Role::User]);
    let (_, body) =
        post_request(&token, "/api/purchases", json!({ "game_id": game.id }), configure(&db, &gateway)).await;
    let handle: PurchaseHandle = serde_json::from_str(&body).unwrap();
    gateway.time_out_session(&handle.session_id);

    let path = format!("/api/purchases/sessions/{}", handle.session_id);
    let (status, body) = get_request(&token, &path, configure(&db, &gateway)).await;
    assert_eq!(status, StatusCode::OK);
    let order: Order = serde_json::from_str(&body).unwrap();
    assert_eq!(order.status, OrderStatusType::Cancelled);

    // A cancelled order can be followed by a fresh purchase of the same game
    let (status, _) =
        post_request(&token, "/api/purchases", json!({ "game_id": game.id }), configure(&db, &gateway)).await;
    assert_eq!(status, StatusCode::OK);
}

#[actix_web::test]
async fn verify_while_gateway_is_down() {
    let (db, gateway) = setup().await;
    let (buyer, game) = seed_buyer_and_game(&db, Cents::from(999)).await;
    let token = valid_token(buyer.id, vec![Role::User]);
    let (_, body) =
        post_request(&token, "/api/purchases", json!({ "game_id": game.id }), configure(&db, &gateway)).await;
    let handle: PurchaseHandle = serde_json::from_str(&body).unwrap();
    gateway.pay_session(&handle.session_id);
    gateway.set_unavailable(true);

    let path = format!("/api/purchases/sessions/{}", handle.session_id);
    let (status, _) = get_request(&token, &path, configure(&db, &gateway)).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    let order = db.fetch_order_by_order_id(&handle.order_id).await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatusType::Pending);
}
