//! Webhook signature middleware for Actix Web.
//!
//! Stripe signs each webhook delivery with the endpoint's signing secret and sends the result in the
//! `Stripe-Signature` header. This middleware checks that signature against the raw request body before any handler
//! sees it, and puts the body back so the handler can parse it.
//!
//! Deliveries with a missing or invalid signature are rejected with 400 Bad Request.
use std::{
    future::{ready, Ready},
    rc::Rc,
};

use actix_http::h1;
use actix_web::{
    dev::{forward_ready, Payload, Service, ServiceRequest, ServiceResponse, Transform},
    error::ErrorBadRequest,
    web,
    Error,
};
use chrono::Utc;
use futures::future::LocalBoxFuture;
use gamestore_common::Secret;
use log::{trace, warn};
use stripe_tools::{webhook::verify_signature, SIGNATURE_HEADER};

pub struct SignatureMiddlewareFactory {
    secret: Secret<String>,
    tolerance_secs: i64,
}

impl SignatureMiddlewareFactory {
    pub fn new(secret: Secret<String>, tolerance_secs: i64) -> Self {
        SignatureMiddlewareFactory { secret, tolerance_secs }
    }
}

impl<S, B> Transform<S, ServiceRequest> for SignatureMiddlewareFactory
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Error = Error;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;
    type InitError = ();
    type Response = ServiceResponse<B>;
    type Transform = SignatureMiddlewareService<S>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(SignatureMiddlewareService {
            secret: self.secret.clone(),
            tolerance_secs: self.tolerance_secs,
            service: Rc::new(service),
        }))
    }
}

pub struct SignatureMiddlewareService<S> {
    secret: Secret<String>,
    tolerance_secs: i64,
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for SignatureMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;
    type Response = ServiceResponse<B>;

    forward_ready!(service);

    fn call(&self, mut req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);
        let secret = self.secret.reveal().clone();
        let tolerance_secs = self.tolerance_secs;
        Box::pin(async move {
            trace!("🔏️ Checking webhook signature");
            let data = req.extract::<web::Bytes>().await.map_err(|e| {
                warn!("🔏️ Failed to extract request data: {:?}", e);
                ErrorBadRequest("Failed to extract request data.")
            })?;
            let header = req
                .headers()
                .get(SIGNATURE_HEADER)
                .and_then(|v| v.to_str().ok())
                .ok_or_else(|| {
                    warn!("🔏️ No signature found in webhook request. Denying access.");
                    ErrorBadRequest("No webhook signature found.")
                })?
                .to_string();
            match verify_signature(data.as_ref(), &header, &secret, tolerance_secs, Utc::now()) {
                Ok(()) => {
                    trace!("🔏️ Webhook signature check ✅️");
                    req.set_payload(bytes_to_payload(data));
                    service.call(req).await
                },
                Err(e) => {
                    warn!("🔏️ Invalid webhook signature. {e}. Denying access.");
                    Err(ErrorBadRequest("Invalid webhook signature."))
                },
            }
        })
    }
}

fn bytes_to_payload(buf: web::Bytes) -> Payload {
    let (_, mut pl) = h1::Payload::create(true);
    pl.unread_data(buf);
    Payload::from(pl)
}
