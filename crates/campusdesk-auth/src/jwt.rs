//! Access token creation and verification.

use anyhow::anyhow;
use chrono::Utc;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use uuid::Uuid;

use campusdesk_config::JwtConfig;
use campusdesk_core::AppError;

use crate::claims::Claims;

/// Creates a signed access token identifying `user_id`.
///
/// Used by the CLI to mint operator tokens; interactive sign-in lives outside
/// this service.
pub fn create_access_token(
    user_id: Uuid,
    username: &str,
    jwt_config: &JwtConfig,
) -> Result<String, AppError> {
    let now = Utc::now().timestamp() as usize;
    let claims = Claims::new(user_id, username, now, jwt_config.access_token_expiry as usize);

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(jwt_config.secret.as_bytes()),
    )
    .map_err(|e| AppError::internal(anyhow!("Failed to create token: {}", e)))
}

/// Verifies an access token's signature and expiry and returns its claims.
pub fn verify_token(token: &str, jwt_config: &JwtConfig) -> Result<Claims, AppError> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(jwt_config.secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|_| AppError::unauthorized("Invalid or expired token".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> JwtConfig {
        JwtConfig {
            secret: "test-secret".to_string(),
            access_token_expiry: 3600,
        }
    }

    #[test]
    fn test_token_roundtrip_keeps_identity() {
        let user_id = Uuid::new_v4();
        let token = create_access_token(user_id, "registrar", &config()).unwrap();
        let claims = verify_token(&token, &config()).unwrap();
        assert_eq!(claims.sub, user_id.to_string());
        assert_eq!(claims.username, "registrar");
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn test_token_signed_with_other_secret_is_rejected() {
        let token = create_access_token(Uuid::new_v4(), "x", &config()).unwrap();
        let other = JwtConfig {
            secret: "other".to_string(),
            access_token_expiry: 3600,
        };
        let err = verify_token(&token, &other).unwrap_err();
        assert_eq!(err.status.as_u16(), 401);
    }

    #[test]
    fn test_garbage_token_is_rejected() {
        assert!(verify_token("not-a-jwt", &config()).is_err());
    }
}
