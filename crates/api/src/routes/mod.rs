//! API routes

pub mod contacts;
pub mod health;
pub mod users;

use axum::{
    extract::rejection::JsonRejection,
    middleware,
    routing::{delete, get, patch, post, put},
    Json, Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    auth::require_auth,
    error::{ApiError, ApiResult},
    state::AppState,
};

/// Unwrap a JSON body, surfacing any rejection as a 400
///
/// axum's own rejection for a body that parses but misses a field is 422;
/// the API contract is 400 for every malformed body, so handlers take the
/// `Result` and route it through here.
pub(crate) fn require_json<T>(payload: Result<Json<T>, JsonRejection>) -> ApiResult<T> {
    match payload {
        Ok(Json(value)) => Ok(value),
        Err(rejection) => Err(ApiError::BadRequest(rejection.body_text())),
    }
}

/// Create all API routes
pub fn create_router(state: AppState) -> Router {
    // Health check routes (at root level for infrastructure monitoring)
    let health_routes = Router::new()
        .route("/health", get(health::health))
        .route("/health/live", get(health::liveness));

    // Public API routes (no auth required)
    let public_routes = Router::new()
        .route("/users/signup", post(users::signup))
        .route("/users/login", post(users::login))
        .route("/users/verify/:verification_token", get(users::verify_email))
        .route("/users/verify", post(users::resend_verification));

    // Protected API routes: every one of these passes the auth gate
    let protected_routes = Router::new()
        .route("/users/logout", get(users::logout))
        .route("/users/current", get(users::current))
        .route("/users/avatars", patch(users::update_avatar))
        .route("/contacts", get(contacts::list_contacts))
        .route("/contacts", post(contacts::create_contact))
        .route("/contacts/:id", get(contacts::get_contact))
        .route("/contacts/:id", put(contacts::update_contact))
        .route("/contacts/:id", delete(contacts::delete_contact))
        .route("/contacts/:id/favorite", patch(contacts::set_favorite))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth));

    Router::new()
        .merge(health_routes)
        .nest("/api", public_routes.merge(protected_routes))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
