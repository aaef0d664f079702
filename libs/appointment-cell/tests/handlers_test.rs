use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;

use appointment_cell::router::appointment_routes;
use shared_utils::test_utils::{JwtTestUtils, TestConfig, TestUser};

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn json_request(method: &str, uri: &str, auth: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("Authorization", auth)
        .header("Content-Type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn empty_request(method: &str, uri: &str, auth: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("Authorization", auth)
        .body(Body::empty())
        .unwrap()
}

async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    (status, body_json(response).await)
}

#[tokio::test]
async fn booking_conflict_cancel_restore_over_http() {
    let config = TestConfig::default();
    let router = appointment_routes(config.to_state());
    let patient = JwtTestUtils::bearer(&TestUser::with_id("patient-p", "patient"), &config.jwt_secret);
    let other_patient = JwtTestUtils::bearer(&TestUser::with_id("patient-p2", "patient"), &config.jwt_secret);
    let doctor = JwtTestUtils::bearer(&TestUser::with_id("doctor-d", "doctor"), &config.jwt_secret);
    let staff = JwtTestUtils::bearer(&TestUser::staff("desk@example.com"), &config.jwt_secret);

    let (status, body) = send(
        &router,
        json_request(
            "POST",
            "/",
            &patient,
            json!({
                "patient_id": "patient-p",
                "doctor_id": "doctor-d",
                "appointment_date": "2025-01-10T09:00:00Z",
                "duration_minutes": 30,
                "appointment_type": "consultation"
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["appointment"]["status"], "scheduled");
    let appointment_id = body["appointment"]["id"].as_str().unwrap().to_string();

    let (status, body) = send(
        &router,
        json_request(
            "POST",
            "/",
            &other_patient,
            json!({
                "patient_id": "patient-p2",
                "doctor_id": "doctor-d",
                "appointment_date": "2025-01-10T09:15:00Z",
                "duration_minutes": 30
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["error"].as_str().unwrap().contains("not available"));

    let (status, body) = send(
        &router,
        empty_request(
            "GET",
            "/availability?doctor_id=doctor-d&start=2025-01-10T09:30:00Z&duration_minutes=30",
            &other_patient,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["available"], true);

    let (status, _) = send(&router, empty_request("DELETE", &format!("/{}", appointment_id), &staff)).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(&router, empty_request("GET", "/?date=2025-01-10", &doctor)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 0);

    let (status, body) = send(&router, empty_request("GET", "/deleted", &staff)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 1);

    let (status, body) = send(&router, empty_request("POST", &format!("/{}/restore", appointment_id), &staff)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["appointment"]["status"], "scheduled");

    let (status, body) = send(&router, empty_request("GET", "/?date=2025-01-10", &doctor)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 1);
    assert_eq!(body["appointments"][0]["id"], appointment_id.as_str());
}

#[tokio::test]
async fn status_changes_and_permissions_over_http() {
    let config = TestConfig::default();
    let router = appointment_routes(config.to_state());
    let doctor = JwtTestUtils::bearer(&TestUser::with_id("doctor-d", "doctor"), &config.jwt_secret);
    let other_doctor = JwtTestUtils::bearer(&TestUser::with_id("doctor-x", "doctor"), &config.jwt_secret);
    let nurse = JwtTestUtils::bearer(&TestUser::nurse("nurse@example.com"), &config.jwt_secret);
    let admin = JwtTestUtils::bearer(&TestUser::admin("admin@example.com"), &config.jwt_secret);

    let (status, body) = send(
        &router,
        json_request(
            "POST",
            "/",
            &nurse,
            json!({
                "patient_id": "patient-1",
                "doctor_id": "doctor-d",
                "appointment_date": "2025-03-01T14:00:00Z",
                "appointment_type": "FollowUp"
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["appointment"]["appointment_type"], "follow_up");
    assert_eq!(body["appointment"]["duration_minutes"], 30);
    let appointment_id = body["appointment"]["id"].as_str().unwrap().to_string();
    let status_uri = format!("/{}/status", appointment_id);

    let (status, _) = send(&router, json_request("PATCH", &status_uri, &nurse, json!({ "status": "confirmed" }))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) =
        send(&router, json_request("PATCH", &status_uri, &doctor, json!({ "status": "Confirmed" }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["appointment"]["status"], "confirmed");

    let (status, _) = send(&router, json_request("PATCH", &status_uri, &doctor, json!({ "status": "completed" }))).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(&router, json_request("PATCH", &status_uri, &doctor, json!({ "status": "scheduled" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let permanent = format!("/{}/permanent", appointment_id);
    let (status, _) = send(&router, empty_request("DELETE", &permanent, &other_doctor)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(&router, empty_request("DELETE", &permanent, &admin)).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(&router, empty_request("GET", &format!("/{}", appointment_id), &admin)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn requests_without_a_token_are_rejected() {
    let config = TestConfig::default();
    let router = appointment_routes(config.to_state());

    let response = router
        .oneshot(Request::builder().uri("/upcoming").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}
