/// Player Authentication Routes
///
/// Login, token refresh, logout, password change and the current-player
/// profile. Handlers stay thin: every token decision is made by
/// [`TokenService`](crate::auth::TokenService).

use actix_web::{web, HttpResponse};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::{validate_password_strength, PrincipalType, Role, TokenPair};
use crate::error::{AppError, AuthError, ErrorContext, ValidationError};
use crate::middleware::AuthenticatedUser;
use crate::startup::AppState;
use crate::store::Account;
use crate::validators::{normalize_email, require_non_empty};

/// Login request, shared by player and admin login
#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Refresh and logout request body
#[derive(Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

/// Token pair response for refresh and password change
#[derive(Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expires_in: i64,
}

/// Login response: token pair plus the account summary
#[derive(Serialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expires_in: i64,
    pub must_change_password: bool,
    pub user: UserSummary,
}

#[derive(Serialize)]
pub struct UserSummary {
    pub id: Uuid,
    pub email: String,
    pub role: Role,
}

/// Full account view for `me` endpoints and admin updates
#[derive(Serialize)]
pub struct AccountResponse {
    pub id: Uuid,
    pub email: String,
    pub role: Role,
    pub is_active: bool,
    pub must_change_password: bool,
    pub last_login_at: Option<DateTime<Utc>>,
}

#[derive(Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl TokenResponse {
    pub fn new(pair: TokenPair, state: &AppState) -> Self {
        Self {
            access_token: pair.access_token,
            refresh_token: pair.refresh_token,
            token_type: "Bearer".to_string(),
            expires_in: state.tokens.keys().access_ttl().num_seconds(),
        }
    }
}

impl LoginResponse {
    pub fn new(pair: TokenPair, account: &Account, state: &AppState) -> Self {
        Self {
            access_token: pair.access_token,
            refresh_token: pair.refresh_token,
            token_type: "Bearer".to_string(),
            expires_in: state.tokens.keys().access_ttl().num_seconds(),
            must_change_password: account.must_change_password,
            user: UserSummary {
                id: account.id,
                email: account.email.clone(),
                role: account.role,
            },
        }
    }
}

impl From<Account> for AccountResponse {
    fn from(account: Account) -> Self {
        Self {
            id: account.id,
            email: account.email,
            role: account.role,
            is_active: account.is_active,
            must_change_password: account.must_change_password,
            last_login_at: account.last_login_at,
        }
    }
}

/// Resolve an account from login credentials
///
/// Unknown email, wrong password and a disabled account all surface as the
/// same client response; only the log line tells them apart.
pub(crate) async fn authenticate(state: &AppState, form: &LoginRequest) -> Result<Account, AppError> {
    let email = normalize_email(&form.email)?;
    let password = require_non_empty("password", &form.password)?;

    let account = state
        .accounts
        .find_by_email(&email)
        .await?
        .ok_or(AuthError::InvalidCredentials)?;

    let verified = state
        .hasher
        .verify_async(account.password_hash.clone(), password.to_string())
        .await?;
    if !verified {
        return Err(AuthError::InvalidCredentials.into());
    }

    if !account.is_active {
        return Err(AuthError::AccountDisabled.into());
    }

    Ok(account)
}

/// Start a session: new family, recorded login time
pub(crate) async fn open_session(
    state: &AppState,
    account: &Account,
    principal: PrincipalType,
) -> Result<TokenPair, AppError> {
    let pair = state
        .tokens
        .create_token_pair(account.id, &account.email, account.role, principal)
        .await?;
    state.accounts.set_last_login(account.id, Utc::now()).await?;
    Ok(pair)
}

/// POST /auth/login
///
/// # Errors
/// - 400: Malformed email
/// - 401: Invalid credentials (unknown email, wrong password, disabled account)
/// - 503: Store unavailable
pub async fn login(
    form: web::Json<LoginRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let context = ErrorContext::new("player_login");

    let account = authenticate(&state, &form).await?;
    let pair = open_session(&state, &account, PrincipalType::Player).await?;

    tracing::info!(
        request_id = %context.request_id,
        user_id = %account.id,
        "Player logged in"
    );

    Ok(HttpResponse::Ok().json(LoginResponse::new(pair, &account, &state)))
}

/// POST /auth/refresh
///
/// Rotates the presented refresh token. Every lifecycle failure, reuse
/// detection included, is reported as the same generic 401.
pub async fn refresh(
    form: web::Json<RefreshRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let token = require_non_empty("refresh_token", &form.refresh_token)?;
    let pair = state
        .tokens
        .refresh_token_pair(token, PrincipalType::Player)
        .await?;

    Ok(HttpResponse::Ok().json(TokenResponse::new(pair, &state)))
}

/// POST /auth/logout
///
/// Revokes the family of the presented refresh token. The access token stays
/// valid until it expires.
pub async fn logout(
    user: web::ReqData<AuthenticatedUser>,
    form: web::Json<RefreshRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    state.tokens.revoke_family_by_token(&form.refresh_token).await?;

    tracing::info!(user_id = %user.id, "Player logged out");

    Ok(HttpResponse::Ok().json(MessageResponse {
        message: "Logged out successfully".to_string(),
    }))
}

/// POST /auth/change-password
///
/// Verifies the current password, stores the new one, revokes every session
/// and returns a fresh pair. Clears a pending `must_change_password`.
///
/// # Errors
/// - 400: Current password wrong, new password equal to it, or too weak
/// - 401: Missing/invalid access token
pub async fn change_password(
    user: web::ReqData<AuthenticatedUser>,
    form: web::Json<ChangePasswordRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let context = ErrorContext::new("change_password").with_user_id(user.id);

    let account = state
        .accounts
        .find_by_id(user.id)
        .await?
        .ok_or(AuthError::AccountNotFound)?;

    let verified = state
        .hasher
        .verify_async(account.password_hash.clone(), form.current_password.clone())
        .await?;
    if !verified {
        return Err(ValidationError::Rejected("current password is incorrect".to_string()).into());
    }

    if form.current_password == form.new_password {
        return Err(ValidationError::Rejected(
            "new password must be different from current password".to_string(),
        )
        .into());
    }

    validate_password_strength(&form.new_password)?;

    let password_hash = state.hasher.hash_async(form.new_password.clone()).await?;
    if !state.accounts.update_password(user.id, &password_hash, false).await? {
        return Err(AuthError::AccountNotFound.into());
    }

    let revoked = state.tokens.revoke_all_for_subject(user.id).await?;
    let pair = state
        .tokens
        .create_token_pair(user.id, &user.email, user.role, PrincipalType::Player)
        .await?;

    tracing::info!(
        request_id = %context.request_id,
        user_id = %user.id,
        revoked_sessions = revoked,
        "Password changed"
    );

    Ok(HttpResponse::Ok().json(TokenResponse::new(pair, &state)))
}

/// GET /api/me
///
/// Requires a completed password change.
pub async fn current_user(
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
