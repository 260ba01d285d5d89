//! Request extractors for authentication and authorization.
//!
//! 1. `AuthUser` validates the `Authorization: Bearer <token>` header
//! 2. `Actor` loads the caller's roles and custom permissions from the store
//! 3. `Require*` extractors run the resolver gate for one permission
//!
//! ```ignore
//! use crate::middleware::auth::RequireViewAuditLog;
//!
//! async fn list_audit_logs(RequireViewAuditLog(actor): RequireViewAuditLog) -> impl IntoResponse {
//!     // only runs if the caller holds `view_audit_log`
//! }
//! ```

pub mod auth;
