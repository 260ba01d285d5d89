//! # campusdesk models
//!
//! Identifiers, entities and request/response DTOs shared by the campusdesk
//! server and CLI.
//!
//! - [`ids`]: typed `Uuid` identifiers
//! - [`access`]: roles, permissions and user access profiles
//! - [`audit`]: audit trail entries and filters
//! - [`schedules`]: weekly sessions and conflict descriptions
//! - [`grades`]: assessments, grades and final grades
//! - [`academics`]: students, classes and subjects

pub mod academics;
pub mod access;
pub mod audit;
pub mod grades;
pub mod ids;
pub mod schedules;
mod value_types;

pub use value_types::UnknownVariant;
