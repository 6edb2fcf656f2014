//! Authentication module for contactbook

pub mod jwt;
pub mod middleware;
pub mod password;
pub mod verification;

pub use jwt::{Claims, JwtManager};
pub use middleware::{extract_bearer, require_auth, AuthUser};
pub use password::{hash_password, verify_password, MIN_PASSWORD_LENGTH};
pub use verification::{VerificationError, VerificationManager};
