//! Bearer token middleware.
//!
//! Verifies the `Authorization: Bearer <token>` header and stores the [`JwtClaims`] in the request extensions, where
//! the [`JwtClaims`] extractor and the ACL middleware pick them up. Requests without a valid token never reach the
//! wrapped services.
use std::{
    future::{ready, Ready},
    rc::Rc,
    sync::Arc,
};

use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    Error,
    HttpMessage,
};
use futures::future::LocalBoxFuture;
use log::*;

use crate::{auth::TokenVerifier, errors::ServerError};

pub struct JwtAuthMiddlewareFactory {
    verifier: Arc<TokenVerifier>,
}

impl JwtAuthMiddlewareFactory {
    pub fn new(verifier: Arc<TokenVerifier>) -> Self {
        Self { verifier }
    }
}

impl<S, B> Transform<S, ServiceRequest> for JwtAuthMiddlewareFactory
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Error = Error;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;
    type InitError = ();
    type Response = ServiceResponse<B>;
    type Transform = JwtAuthMiddlewareService<S>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(JwtAuthMiddlewareService { verifier: Arc::clone(&self.verifier), service: Rc::new(service) }))
    }
}

pub struct JwtAuthMiddlewareService<S> {
    verifier: Arc<TokenVerifier>,
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for JwtAuthMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;
    type Response = ServiceResponse<B>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);
        let result = self.verifier.verify_headers(req.headers());
        Box::pin(async move {
            match result {
                Ok(claims) => {
                    req.extensions_mut().insert(claims);
                    service.call(req).await
                },
                Err(e) => {
                    debug!("🔑️ Rejecting request to {}. {e}", req.path());
                    Err(ServerError::AuthenticationError(e).into())
                },
            }
        })
    }
}
