/// Access-token guard
///
/// Validates the bearer access token for one principal type, re-checks the
/// live account, and injects an [`AuthenticatedUser`] into request extensions
/// for use by route handlers.

use actix_web::{
    body::EitherBody,
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    http::header::AUTHORIZATION,
    Error, HttpMessage,
};
use futures::future::LocalBoxFuture;
use serde::Serialize;
use std::rc::Rc;
use std::sync::Arc;
use uuid::Uuid;

use crate::auth::{PrincipalType, Role, TokenService};
use crate::error::{AppError, AuthError};
use crate::store::AccountStore;

/// Identity of the caller, as attached by the guard
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthenticatedUser {
    pub id: Uuid,
    pub email: String,
    pub role: Role,
}

#[derive(Clone)]
pub struct AuthGuard {
    principal: PrincipalType,
    tokens: TokenService,
    accounts: Arc<dyn AccountStore>,
    require_password_changed: bool,
}

impl AuthGuard {
    pub fn player(tokens: TokenService, accounts: Arc<dyn AccountStore>) -> Self {
        Self::new(PrincipalType::Player, tokens, accounts)
    }

    /// Admin guard: additionally requires the `SUPER_ADMIN` role
    pub fn admin(tokens: TokenService, accounts: Arc<dyn AccountStore>) -> Self {
        Self::new(PrincipalType::Admin, tokens, accounts)
    }

    fn new(principal: PrincipalType, tokens: TokenService, accounts: Arc<dyn AccountStore>) -> Self {
        Self {
            principal,
            tokens,
            accounts,
            require_password_changed: false,
        }
    }

    /// Reject accounts still flagged `must_change_password`
    pub fn require_password_changed(mut self) -> Self {
        self.require_password_changed = true;
        self
    }

    /// Run every check against a raw `Authorization` header value
    pub async fn authorize(&self, header: Option<&str>) -> Result<AuthenticatedUser, AppError> {
        let token = header
            .and_then(|h| h.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(AuthError::MissingToken)?;

        let claims = self
            .tokens
            .verify_access_token(token, self.principal)
            .map_err(|e| AuthError::TokenInvalid(e.to_string()))?;
        let user_id = claims
            .subject_id()
            .map_err(|e| AuthError::TokenInvalid(e.to_string()))?;

        // Token claims may be stale; the account row is authoritative.
        let account = self
            .accounts
            .find_by_id(user_id)
            .await?
            .ok_or(AuthError::AccountNotFound)?;

        if !account.is_active {
            return Err(AuthError::AccountDisabled.into());
        }

        if self.principal == PrincipalType::Admin && account.role != Role::SuperAdmin {
            return Err(AuthError::Forbidden.into());
        }

        if self.require_password_changed && account.must_change_password {
            return Err(AuthError::PasswordChangeRequired.into());
        }

        Ok(AuthenticatedUser {
            id: account.id,
            email: account.email,
            role: account.role,
        })
    }
}

impl<S, B> Transform<S, ServiceRequest> for AuthGuard
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type InitError = ();
    type Transform = AuthGuardService<S>;
    type Future = std::future::Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        std::future::ready(Ok(AuthGuardService {
            service: Rc::new(service),
            guard: self.clone(),
        }))
    }
}

pub struct AuthGuardService<S> {
    service: Rc<S>,
    guard: AuthGuard,
}

impl<S, B> Service<ServiceRequest> for AuthGuardService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let header = req
            .headers()
            .get(AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .map(str::to_string);

        let guard = self.guard.clone();
        let service = self.service.clone();

        Box::pin(async move {
            match guard.authorize(header.as_deref()).await {
                Ok(user) => {
                    tracing::debug!(
                        user_id = %user.id,
                        principal = %guard.principal,
                        "Access token accepted"
                    );
                    req.extensions_mut().insert(user);
                    service.call(req).await.map(ServiceResponse::map_into_left_body)
                }
                // Rendered here so the error body carries this request's id
                Err(e) => Ok(req.error_response(e).map_into_right_body()),
            }
        })
    }
}
