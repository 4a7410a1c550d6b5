//! End-to-end tests for the HTTP API.
//!
//! Each test boots the real router on an ephemeral port, backed by a
//! throwaway SQLite database and a wiremock stand-in for the external
//! weather provider.

use citytemp::{create_router, AppState, Store, WeatherClient};
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tempfile::{tempdir, TempDir};
use wiremock::matchers::{method, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

struct TestServer {
    base: String,
    _dir: TempDir,
}

/// Boot the service against the given provider endpoint.
async fn spawn_server(provider_uri: &str) -> TestServer {
    let dir = tempdir().unwrap();
    let db_path: PathBuf = dir.path().join("api.db");
    let store = Store::open(&db_path).unwrap();

    let state = AppState {
        store: Arc::new(Mutex::new(store)),
        db_path,
        weather: Arc::new(WeatherClient::new(provider_uri, "TESTKEY").unwrap()),
    };

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, create_router(state)).await.unwrap();
    });

    TestServer {
        base: format!("http://{}", addr),
        _dir: dir,
    }
}

async fn mock_city_weather(server: &MockServer, city: &str, temp_c: f64) {
    Mock::given(method("GET"))
        .and(query_param("q", city))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "current": { "temp_c": temp_c } })),
        )
        .mount(server)
        .await;
}

async fn create_city(http: &reqwest::Client, base: &str, name: &str) -> Value {
    http.post(format!("{}/api/cities/", base))
        .json(&json!({ "name": name }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap()
}

#[tokio::test]
async fn welcome_message() {
    let provider = MockServer::start().await;
    let server = spawn_server(&provider.uri()).await;

    let body: Value = reqwest::get(&server.base).await.unwrap().json().await.unwrap();
    assert_eq!(
        body["message"],
        "Welcome to the City Temperature Management API"
    );
}

#[tokio::test]
async fn city_crud_roundtrip() {
    let provider = MockServer::start().await;
    let server = spawn_server(&provider.uri()).await;
    let http = reqwest::Client::new();

    // Create: id is store-assigned, additional_info defaults to null
    let created = create_city(&http, &server.base, "Paris").await;
    assert_eq!(created, json!({ "id": 1, "name": "Paris", "additional_info": null }));

    // Get by id returns the same record
    let fetched: Value = http
        .get(format!("{}/api/cities/1", server.base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(fetched, created);

    // Update overwrites both fields
    let updated: Value = http
        .put(format!("{}/api/cities/1", server.base))
        .json(&json!({ "name": "Paris", "additional_info": "capital of France" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(updated["additional_info"], "capital of France");

    // List shows the one city
    let all: Value = http
        .get(format!("{}/api/cities/", server.base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(all.as_array().unwrap().len(), 1);

    // Delete returns the removed record; a second delete is a 404
    let deleted = http
        .delete(format!("{}/api/cities/1", server.base))
        .send()
        .await
        .unwrap();
    assert_eq!(deleted.status(), 200);
    let second = http
        .delete(format!("{}/api/cities/1", server.base))
        .send()
        .await
        .unwrap();
    assert_eq!(second.status(), 404);
    let detail: Value = second.json().await.unwrap();
    assert_eq!(detail["detail"], "City not found");
}

#[tokio::test]
async fn lookup_of_absent_city_is_404_and_update_creates_nothing() {
    let provider = MockServer::start().await;
    let server = spawn_server(&provider.uri()).await;
    let http = reqwest::Client::new();

    let missing = http
        .get(format!("{}/api/cities/99", server.base))
        .send()
        .await
        .unwrap();
    assert_eq!(missing.status(), 404);

    let update = http
        .put(format!("{}/api/cities/99", server.base))
        .json(&json!({ "name": "Nowhere" }))
        .send()
        .await
        .unwrap();
    assert_eq!(update.status(), 404);

    // The failed update must not have created a record
    let all: Value = http
        .get(format!("{}/api/cities/", server.base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(all.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn malformed_city_body_is_rejected_before_the_store() {
    let provider = MockServer::start().await;
    let server = spawn_server(&provider.uri()).await;
    let http = reqwest::Client::new();

    // Missing the required `name` field
    let response = http
        .post(format!("{}/api/cities/", server.base))
        .json(&json!({ "additional_info": "no name" }))
        .send()
        .await
        .unwrap();
    assert!(response.status().is_client_error());

    // Not JSON at all
    let response = http
        .post(format!("{}/api/cities/", server.base))
        .header("content-type", "application/json")
        .body("not json")
        .send()
        .await
        .unwrap();
    assert!(response.status().is_client_error());
}

#[tokio::test]
async fn empty_temperature_list_is_404_not_empty_array() {
    let provider = MockServer::start().await;
    let server = spawn_server(&provider.uri()).await;
    let http = reqwest::Client::new();

    let all = http
        .get(format!("{}/api/temperatures", server.base))
        .send()
        .await
        .unwrap();
    assert_eq!(all.status(), 404);
    let detail: Value = all.json().await.unwrap();
    assert_eq!(detail["detail"], "No temperatures found");

    let by_city = http
        .get(format!("{}/api/temperatures/5", server.base))
        .send()
        .await
        .unwrap();
    assert_eq!(by_city.status(), 404);
    let detail: Value = by_city.json().await.unwrap();
    assert_eq!(detail["detail"], "No temperatures found for city ID 5");
}

#[tokio::test]
async fn refresh_persists_a_reading_for_the_created_city() {
    let provider = MockServer::start().await;
    mock_city_weather(&provider, "Paris", 21.5).await;

    let server = spawn_server(&provider.uri()).await;
    let http = reqwest::Client::new();

    let created = create_city(&http, &server.base, "Paris").await;
    assert_eq!(created["id"], 1);

    let update: Value = http
        .post(format!("{}/api/temperatures/update/", server.base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(update, json!({ "status": "success" }));

    let readings: Value = http
        .get(format!("{}/api/temperatures/1", server.base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let readings = readings.as_array().unwrap().clone();
    assert_eq!(readings.len(), 1);
    assert_eq!(readings[0]["city_id"], 1);
    assert_eq!(readings[0]["temperature"], 21.5);
}

#[tokio::test]
async fn refresh_with_a_failing_city_still_reports_success() {
    let provider = MockServer::start().await;
    mock_city_weather(&provider, "Paris", 21.5).await;
    mock_city_weather(&provider, "Kyiv", 14.0).await;
    // Every other request (all attempts for the third city) errors.
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&provider)
        .await;

    let server = spawn_server(&provider.uri()).await;
    let http = reqwest::Client::new();

    create_city(&http, &server.base, "Paris").await;
    create_city(&http, &server.base, "Kyiv").await;
    let mordor = create_city(&http, &server.base, "Mordor").await;

    let update: Value = http
        .post(format!("{}/api/temperatures/update/", server.base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(update, json!({ "status": "success" }));

    // Two new rows, none for the failing city
    let readings: Value = http
        .get(format!("{}/api/temperatures", server.base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(readings.as_array().unwrap().len(), 2);

    let failed = http
        .get(format!("{}/api/temperatures/{}", server.base, mordor["id"]))
        .send()
        .await
        .unwrap();
    assert_eq!(failed.status(), 404);
}
