//! Audit trail models.
//!
//! Entries are append-only: nothing in the system updates or deletes them.
//! Retrieval is a bounded, newest-first view; see [`AUDIT_PAGE_SIZE`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};

use crate::ids::{AuditLogId, UserId};
use crate::value_types::text_enum;

/// Maximum number of entries a single audit query returns.
pub const AUDIT_PAGE_SIZE: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum ActionKind {
    Create,
    Update,
    Delete,
    Login,
    Logout,
    View,
    Export,
}

text_enum!(ActionKind, "audit action", {
    Create => "CREATE",
    Update => "UPDATE",
    Delete => "DELETE",
    Login => "LOGIN",
    Logout => "LOGOUT",
    View => "VIEW",
    Export => "EXPORT",
});

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct AuditLogEntry {
    pub id: AuditLogId,
    /// `None` for anonymous or pre-authentication events
    pub user_id: Option<UserId>,
    pub username: Option<String>,
    #[sqlx(try_from = "String")]
    pub action: ActionKind,
    pub model_name: String,
    pub object_id: Option<String>,
    pub details: String,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// An entry about to be appended. The store assigns the id.
#[derive(Debug, Clone, PartialEq)]
pub struct NewAuditLogEntry {
    pub user_id: Option<UserId>,
    pub username: Option<String>,
    pub action: ActionKind,
    pub model_name: String,
    pub object_id: Option<String>,
    pub details: String,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl NewAuditLogEntry {
    pub fn into_entry(self, id: AuditLogId) -> AuditLogEntry {
        AuditLogEntry {
            id,
            user_id: self.user_id,
            username: self.username,
            action: self.action,
            model_name: self.model_name,
            object_id: self.object_id,
            details: self.details,
            ip_address: self.ip_address,
            user_agent: self.user_agent,
            timestamp: self.timestamp,
        }
    }
}

/// Filters for the recent-activity view. All bounds are inclusive.
#[derive(Debug, Clone, Default, Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct AuditLogFilter {
    /// Case-insensitive substring of the actor's username
    pub user: Option<String>,
    /// Exact action kind
    pub action: Option<ActionKind>,
    pub date_from: Option<DateTime<Utc>>,
    pub date_to: Option<DateTime<Utc>>,
}

impl AuditLogFilter {
    pub fn matches(&self, entry: &AuditLogEntry) -> bool {
        if let Some(needle) = self.user.as_deref().filter(|u| !u.is_empty()) {
            let needle = needle.to_lowercase();
            match entry.username.as_deref() {
                Some(name) if name.to_lowercase().contains(&needle) => {}
                _ => return false,
            }
        }
        if self.action.is_some_and(|action| action != entry.action) {
            return false;
        }
        if self.date_from.is_some_and(|from| entry.timestamp < from) {
            return false;
        }
        if self.date_to.is_some_and(|to| entry.timestamp > to) {
            return false;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn entry(username: Option<&str>, action: ActionKind, hour: u32) -> AuditLogEntry {
        AuditLogEntry {
            id: AuditLogId::new(),
            user_id: username.map(|_| UserId::new()),
            username: username.map(str::to_string),
            action,
            model_name: "Schedule".to_string(),
            object_id: None,
            details: String::new(),
            ip_address: None,
            user_agent: None,
            timestamp: Utc.with_ymd_and_hms(2026, 3, 2, hour, 0, 0).unwrap(),
        }
    }

    #[test]
    fn test_action_kind_text() {
        assert_eq!(ActionKind::Login.as_str(), "LOGIN");
        assert_eq!("EXPORT".parse::<ActionKind>().unwrap(), ActionKind::Export);
        assert!("login".parse::<ActionKind>().is_err());
        assert_eq!(
            serde_json::to_string(&ActionKind::Delete).unwrap(),
            r#""DELETE""#
        );
    }

    #[test]
    fn test_empty_filter_matches_everything() {
        let filter = AuditLogFilter::default();
        assert!(filter.matches(&entry(None, ActionKind::Login, 8)));
        assert!(filter.matches(&entry(Some("dean"), ActionKind::View, 9)));
    }

    #[test]
    fn test_user_filter_is_case_insensitive_substring() {
        let filter = AuditLogFilter {
            user: Some("REG".to_string()),
            ..Default::default()
        };
        assert!(filter.matches(&entry(Some("registrar"), ActionKind::Update, 8)));
        assert!(!filter.matches(&entry(Some("dean"), ActionKind::Update, 8)));
        assert!(!filter.matches(&entry(None, ActionKind::Login, 8)));
    }

    #[test]
    fn test_date_range_is_inclusive() {
        let filter = AuditLogFilter {
            date_from: Some(Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap()),
            date_to: Some(Utc.with_ymd_and_hms(2026, 3, 2, 11, 0, 0).unwrap()),
            ..Default::default()
        };
        assert!(!filter.matches(&entry(None, ActionKind::Login, 8)));
        assert!(filter.matches(&entry(None, ActionKind::Login, 9)));
        assert!(filter.matches(&entry(None, ActionKind::Login, 11)));
        assert!(!filter.matches(&entry(None, ActionKind::Login, 12)));
    }

    #[test]
    fn test_action_filter_is_exact() {
        let filter = AuditLogFilter {
            action: Some(ActionKind::Delete),
            ..Default::default()
        };
        assert!(filter.matches(&entry(None, ActionKind::Delete, 8)));
        assert!(!filter.matches(&entry(None, ActionKind::Update, 8)));
    }
}
