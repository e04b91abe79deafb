/// Admin Routes
///
/// Admin session handling (signed with the admin secret pair) and the
/// account actions that end sessions: disabling a user and resetting a
/// password.

use actix_web::{web, HttpResponse};
use serde::Serialize;
use uuid::Uuid;

use crate::auth::{generate_temporary_password, PrincipalType, Role};
use crate::error::{AppError, AuthError, ErrorContext};
use crate::middleware::AuthenticatedUser;
use crate::routes::auth::{
    authenticate, open_session, AccountResponse, LoginRequest, LoginResponse, MessageResponse,
    RefreshRequest, TokenResponse,
};
use crate::startup::AppState;
use crate::store::AccountUpdate;
use crate::validators::require_non_empty;

#[derive(Serialize)]
pub struct ResetPasswordResponse {
    pub temporary_password: String,
}

/// POST /admin/auth/login
///
/// Same generic 401 as player login for every failure, including a valid
/// player account without the admin role.
pub async fn admin_login(
    form: web::Json<LoginRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let context = ErrorContext::new("admin_login");

    let account = authenticate(&state, &form).await?;
    if account.role != Role::SuperAdmin {
        tracing::warn!(
            request_id = %context.request_id,
            user_id = %account.id,
            "Admin login attempted by non-admin account"
        );
        return Err(AuthError::InvalidCredentials.into());
    }

    let pair = open_session(&state, &account, PrincipalType::Admin).await?;

    tracing::info!(
        request_id = %context.request_id,
        user_id = %account.id,
        "Admin logged in"
    );

    Ok(HttpResponse::Ok().json(LoginResponse::new(pair, &account, &state)))
}

/// POST /admin/auth/refresh
pub async fn admin_refresh(
    form: web::Json<RefreshRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let token = require_non_empty("refresh_token", &form.refresh_token)?;
    let pair = state
        .tokens
        .refresh_token_pair(token, PrincipalType::Admin)
        .await?;

    Ok(HttpResponse::Ok().json(TokenResponse::new(pair, &state)))
}

/// POST /admin/auth/logout
pub async fn admin_logout(
    user: web::ReqData<AuthenticatedUser>,
    form: web::Json<RefreshRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    state.tokens.revoke_family_by_token(&form.refresh_token).await?;

    tracing::info!(user_id = %user.id, "Admin logged out");

    Ok(HttpResponse::Ok().json(MessageResponse {
        message: "Logged out successfully".to_string(),
    }))
}

/// GET /admin/auth/me
pub async fn admin_me(
    user: web::ReqData<AuthenticatedUser>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let account = state
        .accounts
        .find_by_id(user.id)
        .await?
        .ok_or_else(|| AppError::NotFound("User".to_string()))?;

    Ok(HttpResponse::Ok().json(AccountResponse::from(account)))
}

/// PATCH /admin/users/{id}
///
/// Setting `is_active` to false revokes every session of the user.
pub async fn update_user(
    admin: web::ReqData<AuthenticatedUser>,
    path: web::Path<Uuid>,
    form: web::Json<AccountUpdate>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let user_id = path.into_inner();
    let context = ErrorContext::new("admin_update_user").with_user_id(admin.id);

    let account = state
        .accounts
        .update_flags(user_id, &form)
        .await?
        .ok_or_else(|| AppError::NotFound("User".to_string()))?;

    if form.is_active == Some(false) {
        let revoked = state.tokens.revoke_all_for_subject(user_id).await?;
        tracing::info!(
            request_id = %context.request_id,
            target_user_id = %user_id,
            revoked_sessions = revoked,
            "User disabled; sessions revoked"
        );
    }

    tracing::info!(
        request_id = %context.request_id,
        target_user_id = %user_id,
        is_active = account.is_active,
        must_change_password = account.must_change_password,
        "User updated"
    );

    Ok(HttpResponse::Ok().json(AccountResponse::from(account)))
}

/// POST /admin/users/{id}/reset-password
///
/// Issues a temporary password, forces a change on next login and revokes
/// every session.
pub async fn reset_user_password(
    admin: web::ReqData<AuthenticatedUser>,
    path: web::Path<Uuid>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let user_id = path.into_inner();
    let context = ErrorContext::new("admin_reset_password").with_user_id(admin.id);

    let temporary_password = generate_temporary_password();
    let password_hash = state.hasher.hash_async(temporary_password.clone()).await?;

    if !state.accounts.update_password(user_id, &password_hash, true).await? {
        return Err(AppError::NotFound("User".to_string()));
    }

    let revoked = state.tokens.revoke_all_for_subject(user_id).await?;

    tracing::info!(
        request_id = %context.request_id,
        target_user_id = %user_id,
        revoked_sessions = revoked,
        "Password reset by admin"
    );

    Ok(HttpResponse::Ok().json(ResetPasswordResponse { temporary_password }))
}
