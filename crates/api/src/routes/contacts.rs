//! Contact routes: owner-scoped CRUD and favorite toggle
//!
//! Every operation runs against the authenticated owner. Single-resource
//! operations go through the ownership guard first; list queries are scoped
//! by owner in SQL and never post-filter.

use axum::{
    extract::{rejection::JsonRejection, Extension, Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    auth::AuthUser,
    error::{ApiError, ApiResult},
    routes::{require_json, users::is_valid_email},
    state::AppState,
};
use contactbook_shared::Contact;

// =============================================================================
// Request Types
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct ContactRequest {
    pub name: String,
    pub email: String,
    pub phone: String,
    #[serde(default)]
    pub favorite: bool,
}

#[derive(Debug, Deserialize)]
pub struct FavoriteRequest {
    pub favorite: bool,
}

#[derive(Debug, Deserialize)]
pub struct ContactPath {
    pub id: Uuid,
}

// =============================================================================
// Ownership Guard
// =============================================================================

/// Confirm the resource exists and belongs to the given user
///
/// Absent resource is NotFound; present but foreign is Forbidden. Called
/// before every single-resource read or mutation.
async fn check_owner(pool: &PgPool, contact_id: Uuid, user_id: Uuid) -> ApiResult<()> {
    let owner: Option<(Uuid,)> = sqlx::query_as("SELECT owner FROM contacts WHERE id = $1")
        .bind(contact_id)
        .fetch_optional(pool)
        .await?;

    match owner {
        None => Err(ApiError::NotFound),
        Some((owner,)) if owner != user_id => {
            tracing::debug!(contact_id = %contact_id, user_id = %user_id, "check_owner: foreign resource");
            Err(ApiError::Forbidden)
        }
        Some(_) => Ok(()),
    }
}

fn validate_contact(req: &ContactRequest) -> ApiResult<()> {
    if req.name.trim().is_empty() {
        return Err(ApiError::Validation("Name is required".to_string()));
    }
    if !is_valid_email(&req.email) {
        return Err(ApiError::Validation("Invalid email format".to_string()));
    }
    if req.phone.trim().is_empty() {
        return Err(ApiError::Validation("Phone number is required".to_string()));
    }
    Ok(())
}

// =============================================================================
// Handlers
// =============================================================================

/// List the authenticated user's contacts
pub async fn list_contacts(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
) -> ApiResult<Json<Vec<Contact>>> {
    let contacts: Vec<Contact> = sqlx::query_as(
        r#"
        SELECT id, name, email, phone, favorite, owner, created_at
        FROM contacts
        WHERE owner = $1
        ORDER BY created_at
        "#,
    )
    .bind(auth_user.user_id)
    .fetch_all(&state.pool)
    .await?;

    Ok(Json(contacts))
}

/// Create a contact owned by the authenticated user
pub async fn create_contact(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    payload: Result<Json<ContactRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Contact>)> {
    let req = require_json(payload)?;
    validate_contact(&req)?;

    let contact: Contact = sqlx::query_as(
        r#"
        INSERT INTO contacts (id, name, email, phone, favorite, owner)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING id, name, email, phone, favorite, owner, created_at
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(req.name.trim())
    .bind(&req.email)
    .bind(req.phone.trim())
    .bind(req.favorite)
    .bind(auth_user.user_id)
    .fetch_one(&state.pool)
    .await?;

    tracing::info!(contact_id = %contact.id, owner = %auth_user.user_id, "contact created");

    Ok((StatusCode::CREATED, Json(contact)))
}

/// Fetch one contact by id
pub async fn get_contact(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(params): Path<ContactPath>,
) -> ApiResult<Json<Contact>> {
    check_owner(&state.pool, params.id, auth_user.user_id).await?;

    let contact: Contact = sqlx::query_as(
        r#"
        SELECT id, name, email, phone, favorite, owner, created_at
        FROM contacts
        WHERE id = $1 AND owner = $2
        "#,
    )
    .bind(params.id)
    .bind(auth_user.user_id)
    .fetch_one(&state.pool)
    .await?;

    Ok(Json(contact))
}

/// Replace a contact's fields
pub async fn update_contact(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(params): Path<ContactPath>,
    payload: Result<Json<ContactRequest>, JsonRejection>,
) -> ApiResult<Json<Contact>> {
    let req = require_json(payload)?;
    validate_contact(&req)?;

    check_owner(&state.pool, params.id, auth_user.user_id).await?;

    // Owner stays in the WHERE clause: the guard and the mutation are two
    // statements, and the scoped UPDATE keeps the mutation itself atomic.
    let contact: Option<Contact> = sqlx::query_as(
        r#"
        UPDATE contacts
        SET name = $1, email = $2, phone = $3, favorite = $4
        WHERE id = $5 AND owner = $6
        RETURNING id, name, email, phone, favorite, owner, created_at
        "#,
    )
    .bind(req.name.trim())
    .bind(&req.email)
    .bind(req.phone.trim())
    .bind(req.favorite)
    .bind(params.id)
    .bind(auth_user.user_id)
    .fetch_optional(&state.pool)
    .await?;

    let contact = contact.ok_or(ApiError::NotFound)?;

    tracing::info!(contact_id = %contact.id, "contact updated");

    Ok(Json(contact))
}

/// Delete a contact
pub async fn delete_contact(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(params): Path<ContactPath>,
) -> ApiResult<Json<serde_json::Value>> {
    check_owner(&state.pool, params.id, auth_user.user_id).await?;

    let result = sqlx::query("DELETE FROM contacts WHERE id = $1 AND owner = $2")
        .bind(params.id)
        .bind(auth_user.user_id)
        .execute(&state.pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::NotFound);
    }

    tracing::info!(contact_id = %params.id, "contact deleted");

    Ok(Json(serde_json::json!({ "message": "Contact deleted" })))
}

/// Toggle the favorite flag
pub async fn set_favorite(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(params): Path<ContactPath>,
    payload: Result<Json<FavoriteRequest>, JsonRejection>,
) -> ApiResult<Json<Contact>> {
    let req = require_json(payload)?;

    check_owner(&state.pool, params.id, auth_user.user_id).await?;

    let contact: Option<Contact> = sqlx::query_as(
        r#"
        UPDATE contacts
        SET favorite = $1
        WHERE id = $2 AND owner = $3
        RETURNING id, name, email, phone, favorite, owner, created_at
        "#,
    )
    .bind(req.favorite)
    .bind(params.id)
    .bind(auth_user.user_id)
    .fetch_optional(&state.pool)
    .await?;

    let contact = contact.ok_or(ApiError::NotFound)?;

    Ok(Json(contact))
}
