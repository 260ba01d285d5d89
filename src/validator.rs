use anyhow::anyhow;
use axum::{
    Json,
    extract::{FromRequest, Request, rejection::JsonRejection},
};
use campusdesk_core::AppError;
use serde::de::DeserializeOwned;
use validator::{Validate, ValidationErrors};

fn format_errors(errors: &ValidationErrors) -> String {
    let mut messages: Vec<String> = errors
        .field_errors()
        .iter()
        .flat_map(|(field, errors)| {
            errors.iter().map(move |error| {
                error
                    .message
                    .as_ref()
                    .map(|msg| msg.to_string())
                    .unwrap_or_else(|| format!("{} is invalid", field))
            })
        })
        .collect();
    messages.sort();
    messages.join(", ")
}

fn rejection_error(rejection: JsonRejection) -> AppError {
    if matches!(rejection, JsonRejection::MissingJsonContentType(_)) {
        return AppError::bad_request(anyhow!(
            "Missing 'Content-Type: application/json' header"
        ));
    }

    let body = rejection.body_text();
    if let Some(field) = body
        .split("missing field `")
        .nth(1)
        .and_then(|rest| rest.split('`').next())
    {
        return AppError::bad_request(anyhow!("{} is required", field));
    }
    if body.contains("unknown variant") || body.contains("invalid type") {
        return AppError::bad_request(anyhow!("Invalid field value in request"));
    }

    AppError::bad_request(anyhow!("Invalid request body"))
}

/// `Json<T>` that also runs `validator` rules.
///
/// Malformed bodies are 400, rule violations are 422.
#[derive(Debug, Clone, Copy, Default)]
pub struct ValidatedJson<T>(pub T);

impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(rejection_error)?;

        value
            .validate()
            .map_err(|errors| AppError::unprocessable(anyhow!("{}", format_errors(&errors))))?;

        Ok(ValidatedJson(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::header::CONTENT_TYPE;
    use campusdesk_models::access::CreateRoleDto;

    fn json_request(body: &str) -> Request {
        Request::builder()
            .method("POST")
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_valid_body_passes() {
        let req = json_request(r#"{"name":"Registrar","permissions":["view_student"]}"#);
        let ValidatedJson(dto) = ValidatedJson::<CreateRoleDto>::from_request(req, &())
            .await
            .unwrap();
        assert_eq!(dto.name, "Registrar");
    }

    #[tokio::test]
    async fn test_missing_field_is_bad_request() {
        let req = json_request(r#"{"permissions":[]}"#);
        let err = ValidatedJson::<CreateRoleDto>::from_request(req, &())
            .await
            .unwrap_err();
        assert_eq!(err.status.as_u16(), 400);
        assert_eq!(err.error.to_string(), "name is required");
    }

    #[tokio::test]
    async fn test_rule_violation_is_unprocessable() {
        let req = json_request(r#"{"name":"Registrar","permissions":["fly"]}"#);
        let err = ValidatedJson::<CreateRoleDto>::from_request(req, &())
            .await
            .unwrap_err();
        assert_eq!(err.status.as_u16(), 422);
        assert_eq!(err.error.to_string(), "Unknown permission: fly");
    }

    #[tokio::test]
    async fn test_missing_content_type() {
        let req = Request::builder()
            .method("POST")
            .body(Body::from("{}"))
            .unwrap();
        let err = ValidatedJson::<CreateRoleDto>::from_request(req, &())
            .await
            .unwrap_err();
        assert_eq!(err.status.as_u16(), 400);
    }
}
