use std::sync::Arc;

use actix_http::Request;
use actix_web::{
    body::MessageBody,
    dev::{Service, ServiceResponse},
    http::StatusCode,
    test,
    test::TestRequest,
    web,
    web::ServiceConfig,
    App,
};
use chrono::{DateTime, Days, Utc};
use gamestore_common::Secret;
use gamestore_engine::db_types::Role;
use jsonwebtoken::{encode, EncodingKey, Header};
use log::debug;

use crate::{
    auth::{JwtClaims, TokenVerifier},
    config::AuthConfig,
    middleware::{JwtAuthMiddlewareFactory, SignatureMiddlewareFactory},
};

// Test-only secrets. DO NOT re-use these anywhere.
pub const TEST_JWT_SECRET: &str = "gs-endpoint-tests-9c1f4e2a7b3d8e6f5a0c";
pub const TEST_WEBHOOK_SECRET: &str = "whsec_endpoint_tests_5d1e0c2b";

pub fn get_auth_config() -> AuthConfig {
    AuthConfig::new(TEST_JWT_SECRET)
}

pub fn issue_token(buyer_id: i64, roles: Vec<Role>, expiry: DateTime<Utc>) -> String {
    let claims = JwtClaims { sub: buyer_id, roles, exp: expiry.timestamp() };
    encode(&Header::default(), &claims, &EncodingKey::from_secret(TEST_JWT_SECRET.as_bytes())).expect("Failed to sign token")
}

pub fn valid_token(buyer_id: i64, roles: Vec<Role>) -> String {
    issue_token(buyer_id, roles, Utc::now() + Days::new(1))
}

/// Sends `req` to an `/api` scope that is protected by the bearer token middleware, as in the real server.
pub async fn api_request<F>(req: TestRequest, configure: F) -> (StatusCode, String)
where F: FnOnce(&mut ServiceConfig) {
    let verifier = Arc::new(TokenVerifier::new(&get_auth_config()));
    let scope = web::scope("/api").wrap(JwtAuthMiddlewareFactory::new(verifier)).configure(configure);
    let service = test::init_service(App::new().service(scope)).await;
    send(&service, req.to_request()).await
}

pub async fn get_request<F>(token: &str, path: &str, configure: F) -> (StatusCode, String)
where F: FnOnce(&mut ServiceConfig) {
    let mut req = TestRequest::get().uri(path);
    if !token.is_empty() {
        req = req.insert_header(("Authorization", format!("Bearer {token}")));
    }
    api_request(req, configure).await
}

pub async fn post_request<F>(token: &str, path: &str, body: serde_json::Value, configure: F) -> (StatusCode, String)
where F: FnOnce(&mut ServiceConfig) {
    let req = TestRequest::post()
        .uri(path)
        .insert_header(("Authorization", format!("Bearer {token}")))
        .set_json(body);
    api_request(req, configure).await
}

/// Posts a raw webhook body to a `/webhooks` scope that is protected by the signature middleware.
pub async fn webhook_request<F>(body: &str, signature: Option<String>, configure: F) -> (StatusCode, String)
where F: FnOnce(&mut ServiceConfig) {
    let secret = Secret::new(TEST_WEBHOOK_SECRET.to_string());
    let scope = web::scope("/webhooks").wrap(SignatureMiddlewareFactory::new(secret, 300)).configure(configure);
    let service = test::init_service(App::new().service(scope)).await;
    let mut req = TestRequest::post().uri("/webhooks/payment").set_payload(body.to_string());
    if let Some(sig) = signature {
        req = req.insert_header(("Stripe-Signature", sig));
    }
    send(&service, req.to_request()).await
}

async fn send<S, B>(service: &S, req: Request) -> (StatusCode, String)
where
    S: Service<Request, Response = ServiceResponse<B>, Error = actix_web::Error>,
    B: MessageBody,
{
    debug!("Making request");
    match test::try_call_service(service, req).await {
        Ok(res) => {
            let status = res.status();
            let body = test::read_body(res).await;
            (status, String::from_utf8_lossy(&body).into_owned())
        },
        Err(e) => {
            let res = e.error_response();
            let status = res.status();
            let body = res.into_body().try_into_bytes().unwrap_or_default();
            (status, String::from_utf8_lossy(&body).into_owned())
        },
    }
}
