//! Request authentication middleware
//!
//! The gate every protected route passes through: extract the bearer token,
//! validate signature and expiry, resolve the user, and require the
//! presented token to match the one stored on the user row. The stored-token
//! check is what makes logout an immediate revocation and enforces the
//! single-active-session policy.

use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

use crate::{
    auth::jwt::JwtError,
    error::{ApiError, ApiResult},
    state::AppState,
};
use contactbook_shared::{SubscriptionTier, User};

/// Authenticated identity attached to the request as an extension.
///
/// Lives only for the duration of one request; downstream handlers and the
/// ownership checks read it instead of any ambient state.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub email: String,
    pub subscription: SubscriptionTier,
}

/// Extract the bearer credential from the Authorization header
pub fn extract_bearer(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Require a valid, unrevoked session token
pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> ApiResult<Response> {
    let token = extract_bearer(req.headers()).ok_or(ApiError::Unauthorized)?;

    // Cryptographic validity and expiry
    let claims = state.jwt_manager.validate(token).map_err(|e| {
        match e {
            JwtError::Expired => tracing::debug!("require_auth: expired session token"),
            _ => tracing::warn!(error = %e, "require_auth: invalid session token"),
        }
        ApiError::Unauthorized
    })?;

    // Resolve the identity and require the presented token to be the one
    // currently stored for this user (logout clears it, a newer login
    // replaces it; either way the old token stops working here).
    let user: Option<User> = sqlx::query_as(
        r#"
        SELECT id, email, password_hash, subscription, token,
               verification_token, verified, avatar_url, created_at
        FROM users
        WHERE id = $1
        "#,
    )
    .bind(claims.sub)
    .fetch_optional(&state.pool)
    .await?;

    let user = user.ok_or(ApiError::Unauthorized)?;

    match user.token.as_deref() {
        Some(stored) if stored == token => {}
        _ => {
            tracing::debug!(user_id = %user.id, "require_auth: token revoked or superseded");
            return Err(ApiError::Unauthorized);
        }
    }

    req.extensions_mut().insert(AuthUser {
        user_id: user.id,
        email: user.email,
        subscription: user.subscription,
    });

    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers_with(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("authorization", HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn test_extract_bearer() {
        assert_eq!(
            extract_bearer(&headers_with("Bearer abc.def.ghi")),
            Some("abc.def.ghi")
        );
    }

    #[test]
    fn test_extract_bearer_rejects_other_schemes() {
        assert_eq!(extract_bearer(&headers_with("Basic dXNlcjpwYXNz")), None);
        assert_eq!(extract_bearer(&headers_with("Bearer ")), None);
        assert_eq!(extract_bearer(&HeaderMap::new()), None);
    }
}
