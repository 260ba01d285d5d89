//! # campusdesk Auth
//!
//! Bearer token types for the campusdesk API.
//!
//! Access tokens only identify the caller. They deliberately carry no roles
//! or permissions: authorization is decided per request by the access
//! resolver against the current role and grant associations, so a revoked
//! grant takes effect immediately instead of when the token expires.
//!
//! # Example
//!
//! ```ignore
//! use campusdesk_auth::{create_access_token, verify_token};
//! use campusdesk_config::JwtConfig;
//!
//! let config = JwtConfig::from_env();
//! let token = create_access_token(user_id, "registrar", &config)?;
//! let claims = verify_token(&token, &config)?;
//! assert_eq!(claims.username, "registrar");
//! ```

pub mod claims;
pub mod jwt;

// Re-export commonly used types at crate root
pub use claims::Claims;
pub use jwt::{create_access_token, verify_token};
