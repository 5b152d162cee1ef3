use actix_web::{http::StatusCode, test, web, web::ServiceConfig, App};
use chrono::{Days, TimeZone, Utc};
use gamestore_common::Cents;
use gamestore_engine::{
    db_types::{Entitlement, Order, OrderId, OrderStatusChange, OrderStatusType, Role},
    AccountApi,
};
use log::debug;
use mockall::predicate::eq;

use super::helpers::{get_request, issue_token, valid_token};
use crate::{
    endpoint_tests::mocks::MockAccountManager,
    routes::{
        health,
        MyEntitlementsRoute,
        MyPurchasesRoute,
        OrdersSearchRoute,
        PurchaseByIdRoute,
        PurchaseHistoryRoute,
    },
};

const BUYER_ID: i64 = 7;
const OTHER_BUYER_ID: i64 = 8;

fn order(order_id: &str, buyer_id: i64, status: OrderStatusType) -> Order {
    let created_at = Utc.with_ymd_and_hms(2024, 10, 19, 12, 0, 0).unwrap();
    Order {
        id: 1,
        order_id: OrderId::from(order_id),
        buyer_id,
        game_id: 3,
        amount: Cents::from(1999),
        currency: "usd".into(),
        session_id: format!("cs_test_{order_id}"),
        payment_ref: format!("cs_test_{order_id}"),
        status,
        invoice_url: None,
        created_at,
        updated_at: created_at,
    }
}

fn configure_with(manager: MockAccountManager) -> impl FnOnce(&mut ServiceConfig) {
    move |cfg| {
        cfg.service(MyPurchasesRoute::<MockAccountManager>::new())
            .service(PurchaseHistoryRoute::<MockAccountManager>::new())
            .service(PurchaseByIdRoute::<MockAccountManager>::new())
            .service(OrdersSearchRoute::<MockAccountManager>::new())
            .service(MyEntitlementsRoute::<MockAccountManager>::new())
            .app_data(web::Data::new(AccountApi::new(manager)));
    }
}

fn configure(cfg: &mut ServiceConfig) {
    configure_with(MockAccountManager::new())(cfg)
}

#[actix_web::test]
async fn health_check() {
    let app = test::init_service(App::new().service(health)).await;
    let req = test::TestRequest::get().uri("/health").to_request();
    let body = test::call_and_read_body(&app, req).await;
    assert_eq!(body, "👍️\n");
}

#[actix_web::test]
async fn fetch_my_purchases_no_token() {
    let _ = env_logger::try_init().ok();
    let (status, body) = get_request("", "/api/purchases", configure).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body.contains("No access token was provided"));
}

#[actix_web::test]
async fn fetch_my_purchases_expired_token() {
    let _ = env_logger::try_init().ok();
    let token = issue_token(BUYER_ID, vec![Role::User], Utc::now() - Days::new(1));
    debug!("Calling /api/purchases with expired token");
    let (status, _) = get_request(&token, "/api/purchases", configure).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn fetch_my_purchases_invalid_sig() {
    let _ = env_logger::try_init().ok();
    let mut token = valid_token(BUYER_ID, vec![Role::User]);
    token.replace_range(token.len() - 10..token.len() - 5, "AAAAA");
    let (status, _) = get_request(&token, "/api/purchases", configure).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn fetch_my_purchases_garbage_token() {
    let _ = env_logger::try_init().ok();
    let (status, _) = get_request("not-a-token", "/api/purchases", configure).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn fetch_my_purchases() {
    let _ = env_logger::try_init().ok();
    let mut manager = MockAccountManager::new();
    let orders = vec![order("gs_a", BUYER_ID, OrderStatusType::Confirmed), order("gs_b", BUYER_ID, OrderStatusType::Pending)];
    let expected = orders.clone();
    manager.expect_fetch_orders_for_buyer().with(eq(BUYER_ID)).times(1).returning(move |_| Ok(orders.clone()));
    let token = valid_token(BUYER_ID, vec![Role::User]);
    let (status, body) = get_request(&token, "/api/purchases", configure_with(manager)).await;
    assert_eq!(status, StatusCode::OK);
    let orders: Vec<Order> = serde_json::from_str(&body).unwrap();
    assert_eq!(orders, expected);
}

#[actix_web::test]
async fn fetch_own_purchase_by_id() {
    let _ = env_logger::try_init().ok();
    let mut manager = MockAccountManager::new();
    manager
        .expect_fetch_order_by_order_id()
        .withf(|id| id.as_str() == "gs_mine")
        .returning(|_| Ok(Some(order("gs_mine", BUYER_ID, OrderStatusType::Pending))));
    let token = valid_token(BUYER_ID, vec![Role::User]);
    let (status, body) = get_request(&token, "/api/purchases/gs_mine", configure_with(manager)).await;
    assert_eq!(status, StatusCode::OK);
    let order: Order = serde_json::from_str(&body).unwrap();
    assert_eq!(order.order_id.as_str(), "gs_mine");
}

#[actix_web::test]
async fn another_buyers_purchase_is_not_found() {
    let _ = env_logger::try_init().ok();
    let mut manager = MockAccountManager::new();
    manager
        .expect_fetch_order_by_order_id()
        .returning(|_| Ok(Some(order("gs_theirs", OTHER_BUYER_ID, OrderStatusType::Confirmed))));
    manager.expect_fetch_order_history().never();
    let token = valid_token(BUYER_ID, vec![Role::User]);
    let (status, _) = get_request(&token, "/api/purchases/gs_theirs", configure_with(manager)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn admin_can_see_any_purchase() {
    let _ = env_logger::try_init().ok();
    let mut manager = MockAccountManager::new();
    manager
        .expect_fetch_order_by_order_id()
        .returning(|_| Ok(Some(order("gs_theirs", OTHER_BUYER_ID, OrderStatusType::Confirmed))));
    let token = valid_token(BUYER_ID, vec![Role::User, Role::Admin]);
    let (status, body) = get_request(&token, "/api/purchases/gs_theirs", configure_with(manager)).await;
    assert_eq!(status, StatusCode::OK);
    let order: Order = serde_json::from_str(&body).unwrap();
    assert_eq!(order.buyer_id, OTHER_BUYER_ID);
}

#[actix_web::test]
async fn fetch_purchase_history() {
    let _ = env_logger::try_init().ok();
    let mut manager = MockAccountManager::new();
    manager
        .expect_fetch_order_by_order_id()
        .returning(|_| Ok(Some(order("gs_hist", BUYER_ID, OrderStatusType::Confirmed))));
    manager.expect_fetch_order_history().withf(|id| id.as_str() == "gs_hist").returning(|id| {
        let at = Utc.with_ymd_and_hms(2024, 10, 19, 12, 0, 0).unwrap();
        Ok(vec![
            OrderStatusChange {
                id: 1,
                order_id: id.clone(),
                old_status: None,
                new_status: OrderStatusType::Pending,
                reason: "Order created".into(),
                created_at: at,
            },
            OrderStatusChange {
                id: 2,
                order_id: id.clone(),
                old_status: Some(OrderStatusType::Pending),
                new_status: OrderStatusType::Confirmed,
                reason: "Payment received".into(),
                created_at: at + Days::new(1),
            },
        ])
    });
    let token = valid_token(BUYER_ID, vec![Role::User]);
    let (status, body) = get_request(&token, "/api/purchases/gs_hist/history", configure_with(manager)).await;
    assert_eq!(status, StatusCode::OK);
    let history: Vec<OrderStatusChange> = serde_json::from_str(&body).unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[1].new_status, OrderStatusType::Confirmed);
}

#[actix_web::test]
async fn fetch_my_entitlements() {
    let _ = env_logger::try_init().ok();
    let mut manager = MockAccountManager::new();
    manager.expect_fetch_entitlements_for_buyer().with(eq(BUYER_ID)).returning(|buyer_id| {
        Ok(vec![Entitlement {
            buyer_id,
            game_id: 3,
            order_id: OrderId::from("gs_a"),
            created_at: Utc.with_ymd_and_hms(2024, 10, 19, 12, 5, 0).unwrap(),
        }])
    });
    let token = valid_token(BUYER_ID, vec![Role::User]);
    let (status, body) = get_request(&token, "/api/entitlements", configure_with(manager)).await;
    assert_eq!(status, StatusCode::OK);
    let entitlements: Vec<Entitlement> = serde_json::from_str(&body).unwrap();
    assert_eq!(entitlements.len(), 1);
    assert_eq!(entitlements[0].game_id, 3);
}

#[actix_web::test]
async fn search_orders_as_normal_user() {
    let _ = env_logger::try_init().ok();
    let mut manager = MockAccountManager::new();
    manager.expect_search_orders().never();
    let token = valid_token(BUYER_ID, vec![Role::User]);
    let (status, body) = get_request(&token, "/api/orders?buyer_id=8", configure_with(manager)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(body.contains("Insufficient Permissions"), "{body}");
}

#[actix_web::test]
async fn search_orders_as_admin() {
    let _ = env_logger::try_init().ok();
    let mut manager = MockAccountManager::new();
    manager
        .expect_search_orders()
        .withf(|q| q.buyer_id == Some(OTHER_BUYER_ID) && q.status == Some(vec![OrderStatusType::Pending]))
        .times(1)
        .returning(|_| Ok(vec![order("gs_theirs", OTHER_BUYER_ID, OrderStatusType::Pending)]));
    let token = valid_token(1, vec![Role::Admin]);
    let (status, body) = get_request(&token, "/api/orders?buyer_id=8&status=pending", configure_with(manager)).await;
    assert_eq!(status, StatusCode::OK);
    let orders: Vec<Order> = serde_json::from_str(&body).unwrap();
    assert_eq!(orders.len(), 1);
}

#[actix_web::test]
async fn search_orders_bad_status() {
    let _ = env_logger::try_init().ok();
    let mut manager = MockAccountManager::new();
    manager.expect_search_orders().never();
    let token = valid_token(1, vec![Role::Admin]);
    let (status, _) = get_request(&token, "/api/orders?status=refunded", configure_with(manager)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
