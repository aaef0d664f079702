use std::sync::Arc;

use assert_matches::assert_matches;
use axum::{
    body::Body,
    http::{Request, StatusCode},
    middleware,
    routing::get,
    Router,
};
use tower::ServiceExt;

use shared_database::AppState;
use shared_models::auth::{CallerContext, Role};
use shared_utils::extractor::auth_middleware;
use shared_utils::test_utils::{JwtTestUtils, TestConfig, TestUser};

async fn whoami(caller: CallerContext) -> String {
    format!("{}:{}", caller.id, caller.role)
}

fn app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/whoami", get(whoami))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
        .with_state(state)
}

#[tokio::test]
async fn valid_token_reaches_handler_with_caller() {
    let config = TestConfig::default();
    let user = TestUser::staff("desk@example.com");

    let response = app(config.to_state())
        .oneshot(
            Request::builder()
                .uri("/whoami")
                .header("Authorization", JwtTestUtils::bearer(&user, &config.jwt_secret))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(String::from_utf8(body.to_vec()).unwrap(), format!("{}:staff", user.id));
}

#[tokio::test]
async fn missing_or_bad_tokens_are_unauthorized() {
    let config = TestConfig::default();
    let user = TestUser::default();

    for header in [
        None,
        Some("Basic abc".to_string()),
        Some(format!("Bearer {}", JwtTestUtils::create_expired_token(&user, &config.jwt_secret))),
        Some(format!("Bearer {}", JwtTestUtils::create_invalid_signature_token(&user))),
    ] {
        let mut request = Request::builder().uri("/whoami");
        if let Some(value) = header {
            request = request.header("Authorization", value);
        }

        let response = app(config.to_state())
            .oneshot(request.body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}

#[tokio::test]
async fn unknown_role_is_forbidden() {
    let config = TestConfig::default();
    let user = TestUser::new("odd@example.com", "janitor");

    let response = app(config.to_state())
        .oneshot(
            Request::builder()
                .uri("/whoami")
                .header("Authorization", JwtTestUtils::bearer(&user, &config.jwt_secret))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[test]
fn test_user_maps_to_caller_role() {
    assert_matches!(TestUser::nurse("n@example.com").to_caller().role, Role::Nurse);
}
