//! Common types used across contactbook

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

// =============================================================================
// Enums
// =============================================================================

/// Subscription tier for a user account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "VARCHAR", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionTier {
    Starter,
    Pro,
    Business,
}

impl Default for SubscriptionTier {
    fn default() -> Self {
        Self::Starter
    }
}

// =============================================================================
// Models
// =============================================================================

/// User model
///
/// A user is either unverified (verification token present, verified=false)
/// or verified (token cleared, verified=true). `token` holds the single
/// active session token between login and logout, null otherwise.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub subscription: SubscriptionTier,
    #[serde(skip_serializing)]
    pub token: Option<String>,
    #[serde(skip_serializing)]
    pub verification_token: Option<String>,
    pub verified: bool,
    pub avatar_url: Option<String>,
    pub created_at: OffsetDateTime,
}

/// Contact model
///
/// Owned resource: `owner` is assigned at creation from the authenticated
/// identity and never reassigned.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Contact {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub favorite: bool,
    pub owner: Uuid,
    pub created_at: OffsetDateTime,
}
