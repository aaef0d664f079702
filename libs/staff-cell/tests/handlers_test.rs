use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use serde_json::{json, Value};
use tower::ServiceExt;

use shared_utils::test_utils::{JwtTestUtils, TestConfig, TestUser};
use staff_cell::router::{department_routes, staff_routes};

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn department_crud_over_http() {
    let config = TestConfig::default();
    let state = config.to_state();
    let admin = TestUser::admin("admin@example.com");
    let auth = JwtTestUtils::bearer(&admin, &config.jwt_secret);

    let response = department_routes(state.clone())
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/")
                .header("Authorization", &auth)
                .header("Content-Type", "application/json")
                .body(Body::from(json!({ "name": "Radiology" }).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let created = body_json(response).await;
    let id = created["department"]["id"].as_str().unwrap().to_string();

    let response = department_routes(state.clone())
        .oneshot(
            Request::builder()
                .uri(format!("/{}", id))
                .header("Authorization", &auth)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["name"], "Radiology");

    let response = department_routes(state.clone())
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/")
                .header("Authorization", &auth)
                .header("Content-Type", "application/json")
                .body(Body::from(json!({ "name": "radiology" }).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn nurse_cannot_create_staff() {
    let config = TestConfig::default();
    let nurse = TestUser::nurse("nurse@example.com");

    let response = staff_routes(config.to_state())
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/")
                .header("Authorization", JwtTestUtils::bearer(&nurse, &config.jwt_secret))
                .header("Content-Type", "application/json")
                .body(Body::from(
                    json!({
                        "first_name": "Ann",
                        "last_name": "Lee",
                        "email": "ann@example.com",
                        "role": "nurse"
                    })
                    .to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert!(body_json(response).await["error"].as_str().unwrap().contains("nurse"));
}

#[tokio::test]
async fn unknown_staff_member_is_not_found() {
    let config = TestConfig::default();
    let user = TestUser::patient("p@example.com");

    let response = staff_routes(config.to_state())
        .oneshot(
            Request::builder()
                .uri("/missing")
                .header("Authorization", JwtTestUtils::bearer(&user, &config.jwt_secret))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
