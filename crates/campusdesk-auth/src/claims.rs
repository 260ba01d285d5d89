//! Access token claims.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identity carried by an access token. `exp` and `iat` are Unix seconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User id
    pub sub: String,
    /// Login name, copied into audit entries
    pub username: String,
    pub exp: usize,
    pub iat: usize,
}

impl Claims {
    pub fn new(user_id: Uuid, username: &str, issued_at: usize, ttl_secs: usize) -> Self {
        Self {
            sub: user_id.to_string(),
            username: username.to_string(),
            exp: issued_at + ttl_secs,
            iat: issued_at,
        }
    }

    pub fn user_id(&self) -> Option<Uuid> {
        self.sub.parse().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_claims_carry_identity_only() {
        let id = Uuid::new_v4();
        let claims = Claims::new(id, "registrar", 1_700_000_000, 60);
        assert_eq!(claims.exp, 1_700_000_060);
        assert_eq!(claims.user_id(), Some(id));

        let json = serde_json::to_string(&claims).unwrap();
        assert!(json.contains(r#""username":"registrar""#));
        assert!(!json.contains("permissions"));
        assert!(!json.contains("role"));
    }

    #[test]
    fn test_malformed_subject() {
        let json = r#"{"sub":"not-a-uuid","username":"dean","exp":9999999999,"iat":9999999900}"#;
        let claims: Claims = serde_json::from_str(json).unwrap();
        assert_eq!(claims.username, "dean");
        assert_eq!(claims.user_id(), None);
    }
}
