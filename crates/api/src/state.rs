//! Shared application state

use std::sync::Arc;

use sqlx::PgPool;

use crate::{auth::JwtManager, config::Config, email::MailerService};

/// Application state shared by all request handlers
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Arc<Config>,
    pub jwt_manager: JwtManager,
    pub mailer: MailerService,
}

impl AppState {
    pub fn new(pool: PgPool, config: Config) -> Self {
        let jwt_manager = JwtManager::new(&config.jwt_secret, config.jwt_expiry_hours);
        let mailer = MailerService::new(
            config.resend_api_key.clone(),
            config.email_from.clone(),
            config.public_url.clone(),
        );

        Self {
            pool,
            config: Arc::new(config),
            jwt_manager,
            mailer,
        }
    }
}
