//! User account routes: signup, login, session and verification lifecycle

use axum::{
    extract::{rejection::JsonRejection, Extension, Multipart, Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::{
    auth::{
        hash_password, verify_password, AuthUser, VerificationError, VerificationManager,
        MIN_PASSWORD_LENGTH,
    },
    avatar,
    error::{ApiError, ApiResult},
    routes::require_json,
    state::AppState,
};
use contactbook_shared::SubscriptionTier;

// =============================================================================
// Request/Response Types
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct SignupRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct ResendVerificationRequest {
    pub email: String,
}

#[derive(Debug, Serialize)]
pub struct SignupResponse {
    pub user: SignupUserResponse,
}

#[derive(Debug, Serialize)]
pub struct SignupUserResponse {
    pub email: String,
    pub subscription: SubscriptionTier,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    pub verification_token: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub expires_in: i64,
    pub user: UserResponse,
}

#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub email: String,
    pub subscription: SubscriptionTier,
}

#[derive(Debug, Serialize)]
pub struct AvatarResponse {
    pub avatar_url: String,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

// =============================================================================
// Database Row Types
// =============================================================================

#[derive(Debug, FromRow)]
struct CredentialRow {
    id: Uuid,
    email: String,
    password_hash: String,
    subscription: SubscriptionTier,
    verified: bool,
}

// =============================================================================
// Handlers
// =============================================================================

/// Register a new user
///
/// The account starts unverified with a fresh verification token; login is
/// refused until the token is consumed. The verification mail is sent after
/// the row is committed, so a send failure leaves a resendable token behind.
pub async fn signup(
    State(state): State<AppState>,
    payload: Result<Json<SignupRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<SignupResponse>)> {
    let req = require_json(payload)?;

    if !is_valid_email(&req.email) {
        return Err(ApiError::Validation("Invalid email format".to_string()));
    }
    if req.password.len() < MIN_PASSWORD_LENGTH {
        return Err(ApiError::Validation(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LENGTH
        )));
    }

    // Check if email already exists
    let exists: Option<(bool,)> =
        sqlx::query_as("SELECT EXISTS(SELECT 1 FROM users WHERE email = $1)")
            .bind(&req.email)
            .fetch_optional(&state.pool)
            .await?;

    if exists.map(|r| r.0).unwrap_or(false) {
        return Err(ApiError::EmailAlreadyExists);
    }

    let password_hash = hash_password(&req.password).map_err(|e| {
        tracing::error!(error = %e, "signup: password hashing failed");
        ApiError::Internal
    })?;

    let user_id = Uuid::new_v4();
    let verification_token = VerificationManager::generate_token();

    // The unique index on email still backstops the EXISTS check above;
    // a concurrent duplicate insert surfaces as 409 via the 23505 mapping.
    sqlx::query(
        r#"
        INSERT INTO users (id, email, password_hash, subscription, verified, verification_token)
        VALUES ($1, $2, $3, 'starter', FALSE, $4)
        "#,
    )
    .bind(user_id)
    .bind(&req.email)
    .bind(&password_hash)
    .bind(&verification_token)
    .execute(&state.pool)
    .await?;

    tracing::info!(user_id = %user_id, "signup: user created");

    // Send verification email (fire and forget)
    let mailer = state.mailer.clone();
    let to = req.email.clone();
    let token = verification_token.clone();
    tokio::spawn(async move {
        mailer.send_verification(&to, &token).await;
    });

    Ok((
        StatusCode::CREATED,
        Json(SignupResponse {
            user: SignupUserResponse {
                email: req.email,
                subscription: SubscriptionTier::Starter,
                avatar_url: None,
                verification_token,
            },
        }),
    ))
}

/// Login with email and password
///
/// Unknown email and wrong password produce the same response. A successful
/// login overwrites any previously stored session token in one UPDATE, so
/// only the newest session stays valid.
pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> ApiResult<Json<LoginResponse>> {
    let req = require_json(payload)?;

    if !is_valid_email(&req.email) || req.password.is_empty() {
        return Err(ApiError::Validation(
            "Email and password are required".to_string(),
        ));
    }

    let user: Option<CredentialRow> = sqlx::query_as(
        "SELECT id, email, password_hash, subscription, verified FROM users WHERE email = $1",
    )
    .bind(&req.email)
    .fetch_optional(&state.pool)
    .await?;

    let user = user.ok_or_else(|| {
        tracing::debug!("login: unknown email");
        ApiError::InvalidCredentials
    })?;

    let valid = verify_password(&req.password, &user.password_hash).map_err(|e| {
        tracing::error!(user_id = %user.id, error = %e, "login: stored digest is malformed");
        ApiError::Internal
    })?;

    if !valid {
        tracing::debug!(user_id = %user.id, "login: invalid password");
        return Err(ApiError::InvalidCredentials);
    }

    if !user.verified {
        tracing::debug!(user_id = %user.id, "login: email not verified");
        return Err(ApiError::EmailNotVerified);
    }

    let token = state.jwt_manager.issue_for(user.id).map_err(|e| {
        tracing::error!(user_id = %user.id, error = %e, "login: token issuance failed");
        ApiError::Internal
    })?;

    // Single active session: the stored token is the one source of truth,
    // overwritten atomically on every login.
    sqlx::query("UPDATE users SET token = $1 WHERE id = $2")
        .bind(&token)
        .bind(user.id)
        .execute(&state.pool)
        .await?;

    tracing::info!(user_id = %user.id, "login: session issued");

    Ok(Json(LoginResponse {
        token,
        expires_in: state.jwt_manager.expiry_seconds(),
        user: UserResponse {
            email: user.email,
            subscription: user.subscription,
        },
    }))
}

/// Logout: revoke the current session immediately
///
/// Clearing the stored token makes the bearer token unusable even though its
/// signature stays valid until natural expiry.
pub async fn logout(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
) -> ApiResult<StatusCode> {
    sqlx::query("UPDATE users SET token = NULL WHERE id = $1")
        .bind(auth_user.user_id)
        .execute(&state.pool)
        .await?;

    tracing::info!(user_id = %auth_user.user_id, "logout: session revoked");

    Ok(StatusCode::NO_CONTENT)
}

/// Return the authenticated identity
pub async fn current(
    Extension(auth_user): Extension<AuthUser>,
) -> ApiResult<Json<UserResponse>> {
    Ok(Json(UserResponse {
        email: auth_user.email,
        subscription: auth_user.subscription,
    }))
}

/// Verification link target
#[derive(Debug, Deserialize)]
pub struct VerifyPath {
    pub verification_token: String,
}

/// Consume a verification token from the emailed link
pub async fn verify_email(
    State(state): State<AppState>,
    Path(params): Path<VerifyPath>,
) -> ApiResult<Json<MessageResponse>> {
    let manager = VerificationManager::new(state.pool.clone());

    let user = manager
        .consume(&params.verification_token)
        .await
        .map_err(|e| match e {
            VerificationError::NotFound => ApiError::NotFound,
            VerificationError::AlreadyVerified => ApiError::AlreadyVerified,
            VerificationError::Database => ApiError::Internal,
        })?;

    tracing::info!(user_id = %user.id, "verify_email: user verified");

    Ok(Json(MessageResponse {
        message: "Verification successful".to_string(),
    }))
}

/// Resend the verification email
///
/// Reuses the token already stored for the user rather than rotating it;
/// every mail sent for an account carries the same link until it is consumed.
pub async fn resend_verification(
    State(state): State<AppState>,
    payload: Result<Json<ResendVerificationRequest>, JsonRejection>,
) -> ApiResult<Json<MessageResponse>> {
    let req = require_json(payload)?;

    if !is_valid_email(&req.email) {
        return Err(ApiError::Validation(
            "missing required field email".to_string(),
        ));
    }

    let manager = VerificationManager::new(state.pool.clone());

    let (user_id, token) = manager
        .token_for_resend(&req.email)
        .await
        .map_err(|e| match e {
            VerificationError::NotFound => ApiError::NotFound,
            VerificationError::AlreadyVerified => ApiError::AlreadyVerified,
            VerificationError::Database => ApiError::Internal,
        })?;

    let mailer = state.mailer.clone();
    let to = req.email.clone();
    tokio::spawn(async move {
        mailer.send_verification(&to, &token).await;
    });

    tracing::info!(user_id = %user_id, "resend_verification: email queued");

    Ok(Json(MessageResponse {
        message: "Verification email sent".to_string(),
    }))
}

/// Replace the authenticated user's avatar
///
/// Accepts a multipart upload, resizes it to the fixed avatar dimensions and
/// stores the result under the configured avatar directory.
pub async fn update_avatar(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    mut multipart: Multipart,
) -> ApiResult<Json<AvatarResponse>> {
    let mut file_bytes: Option<Vec<u8>> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(e.to_string()))?
    {
        if field.name() == Some("avatar") {
            let bytes = field
                .bytes()
                .await
                .map_err(|e| ApiError::BadRequest(e.to_string()))?;
            file_bytes = Some(bytes.to_vec());
            break;
        }
    }

    let bytes = file_bytes.ok_or_else(|| ApiError::BadRequest("No file uploaded".to_string()))?;

    let avatar_url = avatar::store_avatar(&state.config.avatar_dir, auth_user.user_id, bytes)
        .await
        .map_err(|e| match e {
            avatar::AvatarError::InvalidImage(msg) => ApiError::BadRequest(msg),
            _ => {
                tracing::error!(user_id = %auth_user.user_id, error = %e, "update_avatar: storage failed");
                ApiError::Internal
            }
        })?;

    sqlx::query("UPDATE users SET avatar_url = $1 WHERE id = $2")
        .bind(&avatar_url)
        .bind(auth_user.user_id)
        .execute(&state.pool)
        .await?;

    tracing::info!(user_id = %auth_user.user_id, "update_avatar: avatar replaced");

    Ok(Json(AvatarResponse { avatar_url }))
}

// =============================================================================
// Helpers
// =============================================================================

/// Validates email address format (simplified RFC 5322)
pub(crate) fn is_valid_email(email: &str) -> bool {
    let email = email.trim();

    // Length checks per RFC 5321
    if email.len() > 254 || email.is_empty() {
        return false;
    }

    let parts: Vec<&str> = email.split('@').collect();
    if parts.len() != 2 {
        return false;
    }

    let local = parts[0];
    let domain = parts[1];

    // Local part validation
    if local.is_empty() || local.len() > 64 {
        return false;
    }
    if local.starts_with('.') || local.ends_with('.') || local.contains("..") {
        return false;
    }
    if !local
        .chars()
        .all(|c| c.is_alphanumeric() || ".+-_".contains(c))
    {
        return false;
    }

    // Domain validation
    if domain.is_empty() || domain.len() > 255 {
        return false;
    }
    if domain.starts_with('-') || domain.ends_with('-') {
        return false;
    }
    if domain.starts_with('.') || domain.ends_with('.') || domain.contains("..") {
        return false;
    }

    let domain_parts: Vec<&str> = domain.split('.').collect();
    if domain_parts.len() < 2 {
        return false;
    }
    if let Some(tld) = domain_parts.last() {
        if tld.len() < 2 || !tld.chars().all(|c| c.is_alphabetic()) {
            return false;
        }
    }

    domain
        .chars()
        .all(|c| c.is_alphanumeric() || c == '.' || c == '-')
}
