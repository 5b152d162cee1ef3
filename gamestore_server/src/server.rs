use std::{sync::Arc, time::Duration};

use actix_web::{dev::Server, http::KeepAlive, middleware::Logger, web, App, HttpServer};
use gamestore_engine::{
    events::{EventHandlers, EventHooks, EventProducers},
    AccountApi,
    FulfillmentApi,
    SqliteDatabase,
};
use log::*;
use stripe_tools::StripeApi;

use crate::{
    auth::TokenVerifier,
    config::ServerConfig,
    errors::ServerError,
    expiry_worker::start_expiry_worker,
    integrations::stripe::StripeGateway,
    middleware::{JwtAuthMiddlewareFactory, SignatureMiddlewareFactory},
    notifications::{register_receipt_hook, MailRelay},
    reconcile_worker::start_reconcile_worker,
    routes::{
        health,
        ConfirmPurchaseRoute,
        MyEntitlementsRoute,
        MyPurchasesRoute,
        OrdersSearchRoute,
        PaymentWebhookRoute,
        PurchaseByIdRoute,
        PurchaseHistoryRoute,
        PurchaseRoute,
        VerifySessionRoute,
    },
};

const EVENT_BUFFER_SIZE: usize = 64;

pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    let db = SqliteDatabase::new_with_url(&config.database_url, 25)
        .await
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    db.run_migrations().await.map_err(|e| ServerError::InitializeError(e.to_string()))?;
    let stripe = StripeApi::new(config.stripe.clone()).map_err(|e| ServerError::InitializeError(e.to_string()))?;
    let gateway = StripeGateway::new(stripe);
    let mut hooks = EventHooks::default();
    register_receipt_hook(&mut hooks, MailRelay::new(config.mail.clone()));
    let handlers = EventHandlers::new(EVENT_BUFFER_SIZE, hooks);
    let producers = handlers.producers();
    handlers.start_handlers().await;
    let api = FulfillmentApi::new(db.clone(), gateway.clone(), producers.clone()).with_currency(&config.currency);
    match config.unpaid_order_timeout {
        Some(timeout) => {
            let _ = start_expiry_worker(api, timeout);
        },
        None => info!("🕰️ Unpaid order expiry is disabled"),
    }
    if let Some(interval) = config.reconcile_interval {
        let api = FulfillmentApi::new(db.clone(), gateway.clone(), producers.clone());
        let _ = start_reconcile_worker(api, interval);
    }
    let srv = create_server_instance(config, db, gateway, producers)?;
    srv.await.map_err(|e| ServerError::Unspecified(e.to_string()))
}

pub fn create_server_instance(
    config: ServerConfig,
    db: SqliteDatabase,
    gateway: StripeGateway,
    producers: EventProducers,
) -> Result<Server, ServerError> {
    let verifier = Arc::new(TokenVerifier::new(&config.auth));
    let currency = config.currency.clone();
    let webhook_secret = config.stripe.webhook_secret.clone();
    let webhook_tolerance = config.stripe.webhook_tolerance_secs;
    let srv = HttpServer::new(move || {
        let fulfillment_api =
            FulfillmentApi::new(db.clone(), gateway.clone(), producers.clone()).with_currency(currency.as_str());
        let accounts_api = AccountApi::new(db.clone());
        let app = App::new()
            .wrap(Logger::new("%t (%D ms) %s %a %{Host}i %U").log_target("gs::access_log"))
            .app_data(web::Data::new(fulfillment_api))
            .app_data(web::Data::new(accounts_api));
        // Routes that require authentication
        let api_scope = web::scope("/api")
            .wrap(JwtAuthMiddlewareFactory::new(Arc::clone(&verifier)))
            .service(PurchaseRoute::<SqliteDatabase, StripeGateway>::new())
            .service(MyPurchasesRoute::<SqliteDatabase>::new())
            .service(VerifySessionRoute::<SqliteDatabase, StripeGateway>::new())
            .service(PurchaseByIdRoute::<SqliteDatabase>::new())
            .service(ConfirmPurchaseRoute::<SqliteDatabase, StripeGateway>::new())
            .service(PurchaseHistoryRoute::<SqliteDatabase>::new())
            .service(OrdersSearchRoute::<SqliteDatabase>::new())
            .service(MyEntitlementsRoute::<SqliteDatabase>::new());
        // Routes that are called by the payment provider
        let webhook_scope = web::scope("/webhooks")
            .wrap(SignatureMiddlewareFactory::new(webhook_secret.clone(), webhook_tolerance))
            .service(PaymentWebhookRoute::<SqliteDatabase, StripeGateway>::new());
        app.service(health).service(api_scope).service(webhook_scope)
    })
    .keep_alive(KeepAlive::Timeout(Duration::from_secs(600)))
    .bind((config.host.as_str(), config.port))?
    .run();
    Ok(srv)
}
