use serde_json::{json, Map, Value};
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use shared_database::{DocumentStore, Filter, FindOptions, SortOrder, StoreError, SupabaseClient, SupabaseStore};

fn store_for(server: &MockServer) -> SupabaseStore {
    SupabaseStore::from_client(SupabaseClient::with_base_url(&server.uri(), "service-key"))
}

#[tokio::test]
async fn find_sends_postgrest_filters() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("doctor_id", "eq.doctor-1"))
        .and(query_param("deleted_at", "is.null"))
        .and(query_param("order", "appointment_date.asc.nullslast"))
        .and(header("apikey", "service-key"))
        .and(header("Authorization", "Bearer service-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "id": "a-1", "doctor_id": "doctor-1" }
        ])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let store = store_for(&mock_server);
    let filter = Filter::new().eq("doctor_id", "doctor-1").live();
    let options = FindOptions::new().sort_by("appointment_date", SortOrder::Asc);

    let found = store.find("appointments", &filter, &options).await.unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0]["id"], "a-1");
}

#[tokio::test]
async fn insert_asks_for_representation() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/patients"))
        .and(header("Prefer", "return=representation"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([
            { "id": "p-1", "first_name": "Ada" }
        ])))
        .mount(&mock_server)
        .await;

    let store = store_for(&mock_server);
    let inserted = store
        .insert_one("patients", json!({ "id": "p-1", "first_name": "Ada" }))
        .await
        .unwrap();
    assert_eq!(inserted["first_name"], "Ada");
}

#[tokio::test]
async fn update_returns_none_when_no_row_matches() {
    let mock_server = MockServer::start().await;

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/medicines"))
        .and(query_param("id", "eq.missing"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    let store = store_for(&mock_server);
    let mut fields = Map::new();
    fields.insert("stock_quantity".to_string(), Value::from(3));

    let updated = store.update_one("medicines", "missing", fields).await.unwrap();
    assert!(updated.is_none());
}

#[tokio::test]
async fn count_uses_id_projection() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/patients"))
        .and(query_param("select", "id"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{ "id": "1" }, { "id": "2" }])))
        .mount(&mock_server)
        .await;

    let store = store_for(&mock_server);
    assert_eq!(store.count("patients", &Filter::new().live()).await.unwrap(), 2);
}

#[tokio::test]
async fn backend_errors_surface_as_store_errors() {
    let mock_server = MockServer::start().await;

    Mock::given(method("DELETE"))
        .and(path("/rest/v1/departments"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&mock_server)
        .await;

    let store = store_for(&mock_server);
    let result = store.delete_one("departments", "d-1").await;
    assert!(matches!(result, Err(StoreError::Backend(message)) if message.contains("boom")));
}
