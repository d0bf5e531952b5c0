//! Bearer authentication middleware and extractors
//!
//! [`JwtAuth`] validates any `Authorization` header and stores the resulting
//! [`Identity`] in request extensions. Requests without a header, or with a
//! malformed or expired token, pass through anonymously. Handlers that need
//! a caller take [`Authenticated`], handlers that merely personalise take
//! [`MaybeAuthenticated`].

use crate::auth::jwt::TokenIssuer;
use crate::errors::GatewayError;
use actix_web::{
    dev::{forward_ready, Payload, Service, ServiceRequest, ServiceResponse, Transform},
    Error, FromRequest, HttpMessage, HttpRequest,
};
use exchange_core::Identity;
use futures_util::future::LocalBoxFuture;
use std::future::{ready, Ready};
use std::rc::Rc;

pub struct JwtAuth {
    issuer: TokenIssuer,
}

impl JwtAuth {
    pub fn new(issuer: TokenIssuer) -> Self {
        Self { issuer }
    }
}

impl<S, B> Transform<S, ServiceRequest> for JwtAuth
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = JwtAuthMiddleware<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(JwtAuthMiddleware {
            service: Rc::new(service),
            issuer: self.issuer.clone(),
        }))
    }
}

pub struct JwtAuthMiddleware<S> {
    service: Rc<S>,
    issuer: TokenIssuer,
}

impl<S, B> Service<ServiceRequest> for JwtAuthMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let identity = req.headers().get("Authorization").and_then(|header| {
            let token = header
                .to_str()
                .ok()
                .and_then(|h| h.strip_prefix("Bearer "))
                .map(str::trim);

            match token.map(|t| self.issuer.verify(t)) {
                Some(Ok(identity)) => Some(identity),
                Some(Err(err)) => {
                    crate::metrics::AUTH_FAILURES.inc();
                    tracing::debug!(path = %req.path(), "Ignoring rejected token: {}", err);
                    None
                }
                None => {
                    crate::metrics::AUTH_FAILURES.inc();
                    tracing::debug!(path = %req.path(), "Ignoring malformed auth header");
                    None
                }
            }
        });

        // Add caller to request extensions for handlers to access
        if let Some(identity) = identity {
            req.extensions_mut().insert(identity);
        }

        Box::pin(self.service.call(req))
    }
}

/// Caller identity; rejects the request with 401 when absent
#[derive(Debug, Clone, Copy)]
pub struct Authenticated(pub Identity);

impl FromRequest for Authenticated {
    type Error = GatewayError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        ready(
            req.extensions()
                .get::<Identity>()
                .copied()
                .map(Authenticated)
                .ok_or_else(|| GatewayError::Unauthorized("Not authorized, no token".to_string())),
        )
    }
}

/// Caller identity when a valid token was supplied
#[derive(Debug, Clone, Copy)]
pub struct MaybeAuthenticated(pub Option<Identity>);

impl FromRequest for MaybeAuthenticated {
    type Error = GatewayError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        ready(Ok(MaybeAuthenticated(req.extensions().get::<Identity>().copied())))
    }
}
