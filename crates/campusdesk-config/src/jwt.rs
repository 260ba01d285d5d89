use std::env;

const DEV_SECRET: &str = "campusdesk-dev-secret-change-me";

/// Signing settings for operator access tokens.
#[derive(Clone, Debug)]
pub struct JwtConfig {
    pub secret: String,
    /// Lifetime in seconds
    pub access_token_expiry: i64,
}

impl JwtConfig {
    pub fn from_env() -> Self {
        let secret = env::var("JWT_SECRET").unwrap_or_else(|_| {
            tracing::warn!("JWT_SECRET is not set, using the development secret");
            DEV_SECRET.to_string()
        });

        Self {
            secret,
            access_token_expiry: env::var("JWT_ACCESS_EXPIRY")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|secs: &i64| *secs > 0)
                .unwrap_or(8 * 3600),
        }
    }
}
