//! Access control list middleware for the storefront server.
//! This middleware can be placed on any route or service inside a scope that is wrapped by
//! [`super::JwtAuthMiddlewareFactory`].
//!
//! It checks the claims in the verified access token against the required roles for the route. If the bearer has all
//! the required roles, the request is allowed to continue. Otherwise, a 403 Forbidden response is returned.
use std::{pin::Pin, rc::Rc};

use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    Error,
    HttpMessage,
};
use futures::{
    future::{ok, Ready},
    Future,
};
use gamestore_engine::db_types::Role;
use log::*;

use crate::{
    auth::JwtClaims,
    errors::{AuthError, ServerError},
};

pub struct AclMiddlewareFactory {
    required_roles: Vec<Role>,
}

impl AclMiddlewareFactory {
    pub fn new(required_roles: &[Role]) -> Self {
        AclMiddlewareFactory { required_roles: required_roles.to_vec() }
    }
}

impl<S, B> Transform<S, ServiceRequest> for AclMiddlewareFactory
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Error = Error;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;
    type InitError = ();
    type Response = ServiceResponse<B>;
    type Transform = AclMiddlewareService<S>;

    fn new_transform(&self, service: S) -> Self::Future {
        ok(AclMiddlewareService { required_roles: self.required_roles.clone(), service: Rc::new(service) })
    }
}

pub struct AclMiddlewareService<S> {
    required_roles: Vec<Role>,
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for AclMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;
    type Response = ServiceResponse<B>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);
        let required_roles = self.required_roles.clone();
        Box::pin(async move {
            let claims = req.extensions().get::<JwtClaims>().cloned();
            let Some(claims) = claims else {
                warn!("🔑️ No access token claims found for {}. Is the route outside the /api scope?", req.path());
                return Err(ServerError::AuthenticationError(AuthError::MissingToken).into());
            };
            if required_roles.iter().all(|role| claims.roles.contains(role)) {
                service.call(req).await
            } else {
                debug!("🔑️ Buyer #{} lacks one of {required_roles:?} for {}", claims.sub, req.path());
                Err(ServerError::AuthenticationError(AuthError::InsufficientPermissions(
                    "Insufficient permissions.".to_string(),
                ))
                .into())
            }
        })
    }
}
