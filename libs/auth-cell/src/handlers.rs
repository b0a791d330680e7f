// libs/auth-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Json, State},
    http::HeaderMap,
};
use serde_json::json;
use tracing::debug;

use shared_config::AppConfig;
use shared_models::auth::TokenResponse;
use shared_models::error::AppError;
use shared_utils::jwt::validate_token as check_token;

fn extract_bearer_token(headers: &HeaderMap) -> Result<String, AppError> {
    let auth_header = headers
        .get("Authorization")
        .ok_or_else(|| AppError::Auth("Missing authorization header".to_string()))?;

    let auth_value = auth_header
        .to_str()
        .map_err(|_| AppError::Auth("Invalid authorization header format".to_string()))?;

    if !auth_value.starts_with("Bearer ") {
        return Err(AppError::Auth("Invalid authorization header format".to_string()));
    }

    Ok(auth_value[7..].to_string())
}

/// Full token check: 401 on a bad token, the decoded identity otherwise.
pub async fn validate_token(
    State(config): State<Arc<AppConfig>>,
    headers: HeaderMap,
) -> Result<Json<TokenResponse>, AppError> {
    debug!("Validating token");

    let token = extract_bearer_token(&headers)?;

    match check_token(&token, &config.supabase_jwt_secret) {
        Ok(user) => Ok(Json(TokenResponse {
            valid: true,
            user_id: user.id,
            email: user.email,
            role: user.role,
        })),
        Err(err) => Err(AppError::Auth(err)),
    }
}

/// Boolean probe for frontends: always 200, body says valid or not.
pub async fn verify_token(
    State(config): State<Arc<AppConfig>>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, AppError> {
    debug!("Verifying token");

    let token = extract_bearer_token(&headers)?;

    match check_token(&token, &config.supabase_jwt_secret) {
        Ok(_) => Ok(Json(json!({ "valid": true }))),
        Err(_) => Ok(Json(json!({ "valid": false }))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_models::auth::UserRole;
    use shared_utils::test_utils::{JwtTestUtils, TestConfig, TestUser};

    fn bearer_headers(token: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("Authorization", format!("Bearer {}", token).parse().unwrap());
        headers
    }

    #[tokio::test]
    async fn validate_returns_the_decoded_identity() {
        let config = TestConfig::default();
        let user = TestUser::staff("reception@example.com");
        let token = JwtTestUtils::create_test_token(&user, &config.jwt_secret, None);

        let response = validate_token(State(config.to_arc()), bearer_headers(&token))
            .await
            .expect("valid token should pass");
        assert!(response.0.valid);
        assert_eq!(response.0.user_id, user.id);
        assert_eq!(response.0.role, Some(UserRole::Staff));
    }

    #[tokio::test]
    async fn validate_rejects_a_tampered_token() {
        let config = TestConfig::default();
        let user = TestUser::default();
        let token = JwtTestUtils::create_test_token(&user, "some-other-secret", None);

        let result = validate_token(State(config.to_arc()), bearer_headers(&token)).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn verify_reports_invalid_without_failing() {
        let config = TestConfig::default();

        let response = verify_token(State(config.to_arc()), bearer_headers("not-a-jwt"))
            .await
            .expect("verify should not error on bad tokens");
        assert_eq!(response.0["valid"], false);
    }

    #[tokio::test]
    async fn missing_header_is_an_auth_error() {
        let config = TestConfig::default();

        let result = validate_token(State(config.to_arc()), HeaderMap::new()).await;
        assert!(matches!(result, Err(AppError::Auth(_))));
    }
}
