#![allow(dead_code)]

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use campusdesk::campusdesk_auth::create_access_token;
use campusdesk::campusdesk_config::{CorsConfig, JwtConfig};
use campusdesk::campusdesk_models::access::UserAccess;
use campusdesk::cli::create_user;
use campusdesk::modules::access::service::seed_access;
use campusdesk::router::init_router;
use campusdesk::state::AppState;
use campusdesk::store::memory::MemoryStore;
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

pub struct TestApp {
    pub store: Arc<MemoryStore>,
    pub router: Router,
    pub jwt_config: JwtConfig,
}

pub fn jwt_config() -> JwtConfig {
    JwtConfig {
        secret: "integration-test-secret".to_string(),
        access_token_expiry: 3600,
    }
}

/// Router over a fresh in-memory store with the default roles seeded.
pub async fn setup_test_app() -> TestApp {
    let store = Arc::new(MemoryStore::new());
    seed_access(store.as_ref()).await.unwrap();

    let state = AppState::new(
        store.clone(),
        jwt_config(),
        CorsConfig::from_origins("http://localhost:3000"),
    );

    TestApp {
        store,
        router: init_router(state),
        jwt_config: jwt_config(),
    }
}

impl TestApp {
    /// Creates a user holding `role` (by name) and returns a bearer token.
    pub async fn login_as(&self, username: &str, role: Option<&str>) -> (UserAccess, String) {
        let user = create_user(self.store.as_ref(), username, role)
            .await
            .unwrap();
        let token =
            create_access_token(user.user_id.into_inner(), &user.username, &self.jwt_config)
                .unwrap();
        (user, token)
    }

    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header("user-agent", "integration-tests")
            .header("x-forwarded-for", "198.51.100.23");
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(serde_json::to_vec(&body).unwrap()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| {
                panic!(
                    "Non-JSON response. Status: {}, Body: {:?}",
                    status,
                    String::from_utf8_lossy(&bytes)
                )
            })
        };
        (status, value)
    }

    pub async fn get(&self, uri: &str, token: &str) -> (StatusCode, Value) {
        self.request(Method::GET, uri, Some(token), None).await
    }

    pub async fn post(&self, uri: &str, token: &str, body: Value) -> (StatusCode, Value) {
        self.request(Method::POST, uri, Some(token), Some(body)).await
    }

    pub async fn put(&self, uri: &str, token: &str, body: Value) -> (StatusCode, Value) {
        self.request(Method::PUT, uri, Some(token), Some(body)).await
    }

    pub async fn delete(&self, uri: &str, token: &str) -> (StatusCode, Value) {
        self.request(Method::DELETE, uri, Some(token), None).await
    }
}
