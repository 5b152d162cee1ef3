//! Request handler definitions
//!
//! Define each route and it handler here.
//! Handlers that are more than a line or two MUST go into a separate module. Keep this module neat and tidy 🙏
//!
//! A note about performance:
//! Since each worker thread processes its requests sequentially, handlers which block the current thread will cause the
//! current worker to stop processing new requests. Any non-cpu-bound work (database calls, calls to the payment
//! provider) must be awaited, never blocked on.
use actix_web::{get, web, HttpResponse, Responder};
use gamestore_engine::{
    db_types::{OrderId, Role},
    order_objects::OrderQueryFilter,
    traits::{AccountManagement, FulfillmentDatabase, PaymentGateway},
    AccountApi,
    FulfillmentApi,
    FulfillmentError,
};
use log::*;
use stripe_tools::StripeEvent;

use crate::{
    auth::JwtClaims,
    data_objects::{JsonResponse, OrderSearchParams, PurchaseRequest},
    errors::ServerError,
    integrations::stripe::notification_from_event,
};

// Web-actix cannot handle generics in handlers, so it's implemented manually using the `route!` macro
#[macro_export]
macro_rules! route {
    ($name:ident => $method:ident $path:literal impl $($bounds:ty),+) => {
        paste::paste! { pub struct [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ >( $( core::marker::PhantomData<fn() -> [< T $bounds:camel> ] >,)+ );}
        paste::paste! { impl< $( [< T $bounds:camel> ],)+ > [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ > {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self($( core::marker::PhantomData::<fn() -> [< T $bounds:camel> ] >,)+)
            }
        }}
        paste::paste! { impl<$( [< T $bounds:camel >] , )+> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<$([<T $bounds:camel>],)+>
        where
            $([<T $bounds:camel>]: $bounds + 'static,)+
        {
            fn register(self, config: &mut actix_web::dev::AppService) {
                let res = actix_web::Resource::new($path)
                    .name(stringify!($name))
                    .guard(actix_web::guard::$method())
                    .to($name::< $( [< T $bounds:camel >], )+>);
                actix_web::dev::HttpServiceFactory::register(res, config);
            }
        }}
    };

    ($name:ident => $method:ident $path:literal impl $($bounds:ty),+ where requires [$($roles:ty),*])  => {
        paste::paste! { pub struct [<$name:camel Route>]<A>(core::marker::PhantomData<fn() -> A>);}
        paste::paste! { impl<A> [<$name:camel Route>]<A> {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self(core::marker::PhantomData::<fn() -> A>)
            }
        }}
        paste::paste! { impl<A> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<A>
        where
            A: $($bounds)++ 'static,
        {
            fn register(self, config: &mut actix_web::dev::AppService) {
                let res = actix_web::Resource::new($path)
                    .name(stringify!($name))
                    .guard(actix_web::guard::$method())
                    .to($name::<A>)
                    .wrap($crate::middleware::AclMiddlewareFactory::new(&[$($roles),+]));
                actix_web::dev::HttpServiceFactory::register(res, config);
            }
        }}
    };
}

// ----------------------------------------------   Health  ----------------------------------------------------
#[get("/health")]
pub async fn health() -> impl Responder {
    trace!("💻️ Received health check request");
    HttpResponse::Ok().body("👍️\n")
}

//----------------------------------------------   Purchases  ----------------------------------------------------
route!(purchase => Post "/purchases" impl FulfillmentDatabase, PaymentGateway);
/// Starts a purchase for the authenticated buyer.
///
/// The body is `{"game_id": <id>}`. On success the response carries the order id and what the client needs to continue
/// at the payment provider's hosted checkout page (`redirect_url`, or `client_secret` for embedded flows).
pub async fn purchase<B, G>(
    claims: JwtClaims,
    body: web::Json<PurchaseRequest>,
    api: web::Data<FulfillmentApi<B, G>>,
) -> Result<HttpResponse, ServerError>
where
    B: FulfillmentDatabase,
    G: PaymentGateway,
{
    let game_id = body.into_inner().game_id;
    debug!("💻️ POST purchase of game #{game_id} by buyer #{}", claims.sub);
    let handle = api.initiate(claims.buyer_id(), game_id).await?;
    Ok(HttpResponse::Ok().json(handle))
}

route!(confirm_purchase => Post "/purchases/{order_id}/confirm" impl FulfillmentDatabase, PaymentGateway);
/// Client-driven confirmation, for when the buyer returns from checkout before the webhook has arrived.
///
/// The payment provider is always consulted; the order only changes state if the provider reports an outcome.
pub async fn confirm_purchase<B, G>(
    claims: JwtClaims,
    path: web::Path<OrderId>,
    api: web::Data<FulfillmentApi<B, G>>,
) -> Result<HttpResponse, ServerError>
where
    B: FulfillmentDatabase,
    G: PaymentGateway,
{
    let order_id = path.into_inner();
    debug!("💻️ POST confirm for order {order_id} by buyer #{}", claims.sub);
    let order = api.confirm_for_buyer(&order_id, claims.buyer_id()).await?;
    Ok(HttpResponse::Ok().json(order))
}

route!(verify_session => Get "/purchases/sessions/{session_id}" impl FulfillmentDatabase, PaymentGateway);
/// Looks up the buyer's checkout session at the payment provider and applies the result.
pub async fn verify_session<B, G>(
    claims: JwtClaims,
    path: web::Path<String>,
    api: web::Data<FulfillmentApi<B, G>>,
) -> Result<HttpResponse, ServerError>
where
    B: FulfillmentDatabase,
    G: PaymentGateway,
{
    let session_id = path.into_inner();
    debug!("💻️ GET verify session {session_id} for buyer #{}", claims.sub);
    let order = api.verify(&session_id, claims.buyer_id()).await?;
    Ok(HttpResponse::Ok().json(order))
}

//----------------------------------------------   Orders  ----------------------------------------------------
route!(my_purchases => Get "/purchases" impl AccountManagement);
/// The authenticated buyer's orders, newest first.
pub async fn my_purchases<B: AccountManagement>(
    claims: JwtClaims,
    api: web::Data<AccountApi<B>>,
) -> Result<HttpResponse, ServerError> {
    debug!("💻️ GET my_purchases for buyer #{}", claims.sub);
    let orders = api.orders_for_buyer(claims.buyer_id()).await?;
    Ok(HttpResponse::Ok().json(orders))
}

route!(purchase_by_id => Get "/purchases/{order_id}" impl AccountManagement);
/// Fetches a single order. Buyers only see their own orders; admins see any order. Orders the caller may not see
/// are reported as not found.
pub async fn purchase_by_id<B: AccountManagement>(
    claims: JwtClaims,
    path: web::Path<OrderId>,
    api: web::Data<AccountApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = path.into_inner();
    debug!("💻️ GET purchase_by_id({order_id})");
    let order = api
        .order_by_id(&order_id)
        .await?
        .filter(|o| claims.is_admin() || o.buyer_id == claims.buyer_id())
        .ok_or_else(|| ServerError::NoRecordFound(format!("Order {order_id}")))?;
    Ok(HttpResponse::Ok().json(order))
}

route!(purchase_history => Get "/purchases/{order_id}/history" impl AccountManagement);
/// The status audit trail for an order. Same visibility rules as `/purchases/{order_id}`.
pub async fn purchase_history<B: AccountManagement>(
    claims: JwtClaims,
    path: web::Path<OrderId>,
    api: web::Data<AccountApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = path.into_inner();
    debug!("💻️ GET purchase_history({order_id})");
    let visible = api
        .order_by_id(&order_id)
        .await?
        .is_some_and(|o| claims.is_admin() || o.buyer_id == claims.buyer_id());
    if !visible {
        return Err(ServerError::NoRecordFound(format!("Order {order_id}")));
    }
    let history = api.order_history(&order_id).await?;
    Ok(HttpResponse::Ok().json(history))
}

route!(orders_search => Get "/orders" impl AccountManagement where requires [Role::Admin]);
/// Admin search over all orders. See [`OrderSearchParams`] for the supported query parameters.
pub async fn orders_search<B: AccountManagement>(
    query: web::Query<OrderSearchParams>,
    api: web::Data<AccountApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let query = OrderQueryFilter::try_from(query.into_inner())?;
    debug!("💻️ GET orders search for [{query}]");
    let orders = api.search_orders(query).await?;
    Ok(HttpResponse::Ok().json(orders))
}

route!(my_entitlements => Get "/entitlements" impl AccountManagement);
/// The games the authenticated buyer owns.
pub async fn my_entitlements<B: AccountManagement>(
    claims: JwtClaims,
    api: web::Data<AccountApi<B>>,
) -> Result<HttpResponse, ServerError> {
    debug!("💻️ GET my_entitlements for buyer #{}", claims.sub);
    let entitlements = api.entitlements_for_buyer(claims.buyer_id()).await?;
    Ok(HttpResponse::Ok().json(entitlements))
}

//----------------------------------------------   Webhooks  ----------------------------------------------------
route!(payment_webhook => Post "/payment" impl FulfillmentDatabase, PaymentGateway);
/// Receives payment events from Stripe. The signature has already been checked by the
/// [`crate::middleware::SignatureMiddlewareFactory`] wrapping this route.
///
/// Response codes tell Stripe whether to redeliver:
/// * 200 for events that were applied, ignored, or can never be applied (unknown order, order already terminal).
/// * 400 for payloads that cannot be understood or do not match the order.
/// * 500 for transient failures, so that Stripe tries again later.
pub async fn payment_webhook<B, G>(body: web::Bytes, api: web::Data<FulfillmentApi<B, G>>) -> HttpResponse
where
    B: FulfillmentDatabase,
    G: PaymentGateway,
{
    let event = match serde_json::from_slice::<StripeEvent>(&body) {
        Ok(event) => event,
        Err(e) => {
            warn!("💻️ Could not parse webhook payload. {e}");
            return HttpResponse::BadRequest().json(JsonResponse::failure("Invalid event payload."));
        },
    };
    trace!("💻️ Webhook event {} ({}) received", event.id, event.event_type);
    let notification = match notification_from_event(&event) {
        Ok(Some(notification)) => notification,
        Ok(None) => return HttpResponse::Ok().json(JsonResponse::success(format!("Event {} ignored.", event.id))),
        Err(e) => {
            warn!("💻️ Webhook event {} cannot be used. {e}", event.id);
            return HttpResponse::BadRequest().json(JsonResponse::failure(e));
        },
    };
    match api.confirm(notification).await {
        Ok(order) => {
            info!("💻️ Webhook event {} applied. Order {} is {}.", event.id, order.order_id, order.status);
            HttpResponse::Ok().json(JsonResponse::success(format!("Order {} is {}.", order.order_id, order.status)))
        },
        Err(e @ FulfillmentError::InvalidTransition { .. }) => {
            warn!("💻️ Webhook event {} conflicts with the order's state. {e}", event.id);
            HttpResponse::Ok().json(JsonResponse::failure(e))
        },
        Err(e) if e.is_not_found() => {
            warn!("💻️ Webhook event {} refers to an unknown order. {e}", event.id);
            HttpResponse::Ok().json(JsonResponse::failure(e))
        },
        Err(e @ FulfillmentError::InvalidNotification(_)) => {
            warn!("💻️ Webhook event {} was rejected. {e}", event.id);
            HttpResponse::BadRequest().json(JsonResponse::failure(e))
        },
        Err(e) => {
            error!("💻️ Could not apply webhook event {}. Stripe will retry. {e}", event.id);
            HttpResponse::InternalServerError().json(JsonResponse::failure(e))
        },
    }
}
