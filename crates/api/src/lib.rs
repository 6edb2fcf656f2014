//! Contactbook API Library
//!
//! This crate contains the API server components for contactbook.

pub mod auth;
pub mod avatar;
pub mod config;
pub mod email;
pub mod error;
pub mod routes;
pub mod state;

pub use config::Config;
pub use error::{ApiError, ApiResult};
pub use state::AppState;
