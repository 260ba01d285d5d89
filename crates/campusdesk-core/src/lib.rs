//! # campusdesk Core
//!
//! Core types shared by every campusdesk crate:
//!
//! - [`errors`]: Application error type with HTTP response conversion
//! - [`permissions`]: The closed permission catalog
//!
//! # Example
//!
//! ```ignore
//! use campusdesk_core::errors::AppError;
//! use campusdesk_core::permissions;
//!
//! let error = AppError::not_found(anyhow::anyhow!("Session not found"));
//! assert!(permissions::is_known(permissions::VIEW_AUDIT_LOG));
//! ```

pub mod errors;
pub mod permissions;

// Re-export commonly used types at crate root
pub use errors::AppError;
pub use permissions::PermissionDef;
