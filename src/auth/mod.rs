//! Identity boundary. Authentication happens upstream; the gateway forwards
//! the resolved user as `X-User-Id` / `X-User-Role` headers and this module
//! turns them into an [`ActingUser`] that handlers receive explicitly.

use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    http::header::HeaderMap,
    FromRequest, HttpMessage, HttpRequest,
};
use futures_util::future::{ready, LocalBoxFuture, Ready};
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::schema::db::Role;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ActingUser {
    pub id: Uuid,
    pub role: Role,
}

impl ActingUser {
    pub fn is_staff(&self) -> bool {
        self.role.is_staff()
    }
}

impl FromRequest for ActingUser {
    type Error = ApiError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut actix_web::dev::Payload) -> Self::Future {
        ready(
            req.extensions()
                .get::<ActingUser>()
                .copied()
                .ok_or(ApiError::Unauthorized("No resolved identity on request")),
        )
    }
}

fn resolve_identity(headers: &HeaderMap) -> Result<ActingUser, ApiError> {
    let id = headers
        .get("X-User-Id")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| Uuid::parse_str(value).ok())
        .ok_or(ApiError::Unauthorized("Missing or invalid X-User-Id header"))?;
    let role = headers
        .get("X-User-Role")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse::<Role>().ok())
        .ok_or(ApiError::Unauthorized(
            "Missing or invalid X-User-Role header",
        ))?;
    Ok(ActingUser { id, role })
}

#[derive(Clone, Copy, Default)]
pub struct GatewayAuth {
    staff_only: bool,
}

impl GatewayAuth {
    pub fn enabled() -> Self {
        Self { staff_only: false }
    }

    pub fn staff_only() -> Self {
        Self { staff_only: true }
    }
}

impl<S, B> Transform<S, ServiceRequest> for GatewayAuth
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = actix_web::Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = actix_web::Error;
    type Transform = GatewayAuthMiddleware<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(GatewayAuthMiddleware {
            service,
            staff_only: self.staff_only,
        }))
    }
}

pub struct GatewayAuthMiddleware<S> {
    service: S,
    staff_only: bool,
}

impl<S, B> Service<ServiceRequest> for GatewayAuthMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = actix_web::Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = actix_web::Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        match resolve_identity(req.headers()) {
            Ok(user) if self.staff_only && !user.is_staff() => Box::pin(ready(Err(
                ApiError::Forbidden("This action requires a moderator or admin role").into(),
            ))),
            Ok(user) => {
                req.extensions_mut().insert(user);
                Box::pin(self.service.call(req))
            }
            Err(error) => Box::pin(ready(Err(error.into()))),
        }
    }
}
