//! # campusdesk Config
//!
//! Configuration types for the campusdesk API, loaded from environment
//! variables:
//!
//! - [`cors`]: CORS (Cross-Origin Resource Sharing) configuration
//! - [`database`]: PostgreSQL connection settings
//! - [`jwt`]: JWT verification configuration
//! - [`server`]: Listener, metrics and log directory settings
//!
//! # Example
//!
//! ```ignore
//! use campusdesk_config::{CorsConfig, JwtConfig, ServerConfig};
//!
//! let jwt_config = JwtConfig::from_env();
//! let cors_config = CorsConfig::from_env();
//! let server_config = ServerConfig::from_env();
//! ```

pub mod cors;
pub mod database;
pub mod jwt;
pub mod server;

// Re-export commonly used types at crate root
pub use cors::CorsConfig;
pub use database::DatabaseConfig;
pub use jwt::JwtConfig;
pub use server::ServerConfig;
