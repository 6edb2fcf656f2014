//! Email verification tokens
//!
//! Opaque single-use tokens proving control of an email address. The token
//! lives on the user row; consuming it is one conditional UPDATE so two
//! concurrent requests for the same token can never both succeed.

use sqlx::PgPool;
use uuid::Uuid;

/// Manages the verification token lifecycle against the user store
pub struct VerificationManager {
    pool: PgPool,
}

/// User identity returned by a successful consume
#[derive(Debug, sqlx::FromRow)]
pub struct VerifiedUser {
    pub id: Uuid,
    pub email: String,
}

impl VerificationManager {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Generate a secure random token
    ///
    /// Returns a 32-byte hex-encoded token (64 characters)
    pub fn generate_token() -> String {
        use rand::Rng;
        let mut rng = rand::thread_rng();
        let bytes: [u8; 32] = rng.gen();
        hex::encode(bytes)
    }

    /// Atomically consume a verification token
    ///
    /// Check-and-clear in a single statement: the row is matched on the
    /// token while still unverified, so at most one caller wins. An unknown
    /// or already-consumed token is indistinguishable by design (the token
    /// is cleared on consumption) and reported as `NotFound`.
    pub async fn consume(&self, token: &str) -> Result<VerifiedUser, VerificationError> {
        let user: Option<VerifiedUser> = sqlx::query_as(
            r#"
            UPDATE users
            SET verification_token = NULL, verified = TRUE
            WHERE verification_token = $1 AND verified = FALSE
            RETURNING id, email
            "#,
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "consume: token update failed");
            VerificationError::Database
        })?;

        let user = user.ok_or(VerificationError::NotFound)?;

        tracing::info!(user_id = %user.id, email = %user.email, "Verification token consumed");

        Ok(user)
    }

    /// Look up the pending verification token for a resend
    ///
    /// The stored token value is reused rather than rotated, so a user who
    /// requests several emails can follow any of them.
    pub async fn token_for_resend(
        &self,
        email: &str,
    ) -> Result<(Uuid, String), VerificationError> {
        let row: Option<(Uuid, bool, Option<String>)> = sqlx::query_as(
            "SELECT id, verified, verification_token FROM users WHERE email = $1",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "token_for_resend: lookup failed");
            VerificationError::Database
        })?;

        let (user_id, verified, token) = row.ok_or(VerificationError::NotFound)?;

        if verified {
            return Err(VerificationError::AlreadyVerified);
        }

        // Invariant: an unverified user always carries a token
        let token = token.ok_or(VerificationError::Database)?;

        Ok((user_id, token))
    }
}

/// Verification token errors
#[derive(Debug, thiserror::Error)]
pub enum VerificationError {
    #[error("Invalid or unknown token")]
    NotFound,
    #[error("Verification has already been passed")]
    AlreadyVerified,
    #[error("Database error")]
    Database,
}
