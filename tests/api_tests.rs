use axum::http::{header::AUTHORIZATION, HeaderName, HeaderValue, StatusCode};
use axum_test::TestServer;
use serde_json::{json, Value};

use watchlist_api::{
    routes::{create_router, AppState},
    services::accounts,
};

const ADMIN: &str = "admin";
const ADMIN_PASSWORD: &str = "admin-pass";

async fn create_test_server() -> TestServer {
    let state = AppState::in_memory();
    accounts::ensure_admin(state.store.as_ref(), ADMIN, ADMIN_PASSWORD)
        .await
        .unwrap();
    let app = create_router(state);
    TestServer::new(app).unwrap()
}

fn token_header(token: &str) -> HeaderValue {
    HeaderValue::from_str(&format!("Token {}", token)).unwrap()
}

async fn login(server: &TestServer, username: &str, password: &str) -> String {
    let response = server
        .post("/api/v1/account/login")
        .json(&json!({ "username": username, "password": password }))
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    body["token"].as_str().unwrap().to_string()
}

async fn register(server: &TestServer, username: &str) -> String {
    let response = server
        .post("/api/v1/account/register")
        .json(&json!({
            "username": username,
            "email": format!("{}@example.com", username),
            "password": "hunter22",
            "password2": "hunter22"
        }))
        .await;
    response.assert_status(StatusCode::CREATED);
    let body: Value = response.json();
    body["token"].as_str().unwrap().to_string()
}

/// Creates a platform and one title on it, returning the title id
async fn seed_title(server: &TestServer, admin: &str) -> i64 {
    let response = server
        .post("/api/v1/platforms")
        .add_header(AUTHORIZATION, token_header(admin))
        .json(&json!({
            "name": "Netflix",
            "about": "Streaming service",
            "website": "https://www.netflix.com"
        }))
        .await;
    response.assert_status(StatusCode::CREATED);
    let platform: Value = response.json();

    let response = server
        .post("/api/v1/titles")
        .add_header(AUTHORIZATION, token_header(admin))
        .json(&json!({
            "platform_id": platform["id"],
            "name": "Mindhunter",
            "description": "FBI agents interview serial killers",
            "release_year": 2017
        }))
        .await;
    response.assert_status(StatusCode::CREATED);
    let title: Value = response.json();
    assert_eq!(title["active"], true);
    assert_eq!(title["number_rating"], 0);
    title["id"].as_i64().unwrap()
}

async fn review(server: &TestServer, token: &str, title_id: i64, rating: i64) -> axum_test::TestResponse {
    server
        .post(&format!("/api/v1/titles/{}/reviews", title_id))
        .add_header(AUTHORIZATION, token_header(token))
        .json(&json!({ "rating": rating, "comment": "Gripping" }))
        .await
}

async fn aggregate(server: &TestServer, title_id: i64) -> (f64, i64) {
    let title: Value = server
        .get(&format!("/api/v1/titles/{}", title_id))
        .await
        .json();
    (
        title["avg_rating"].as_f64().unwrap(),
        title["number_rating"].as_i64().unwrap(),
    )
}

#[tokio::test]
async fn test_health_check() {
    let server = create_test_server().await;
    let response = server.get("/health").await;
    response.assert_status_ok();
    assert!(response.headers().contains_key("x-request-id"));
}

#[tokio::test]
async fn test_request_id_is_echoed() {
    let server = create_test_server().await;
    let response = server
        .get("/health")
        .add_header(
            HeaderName::from_static("x-request-id"),
            HeaderValue::from_static("trace-me-42"),
        )
        .await;
    assert_eq!(response.headers()["x-request-id"], "trace-me-42");
}

#[tokio::test]
async fn test_review_scenario_over_http() {
    let server = create_test_server().await;
    let admin = login(&server, ADMIN, ADMIN_PASSWORD).await;
    let title_id = seed_title(&server, &admin).await;
    let alice = register(&server, "alice").await;
    let bob = register(&server, "bob").await;

    let response = review(&server, &alice, title_id, 4).await;
    response.assert_status(StatusCode::CREATED);
    let created: Value = response.json();
    assert_eq!(created["reviewer"], "alice");
    assert_eq!(created["rating"], 4);
    assert_eq!(aggregate(&server, title_id).await, (4.0, 1));

    review(&server, &bob, title_id, 2)
        .await
        .assert_status(StatusCode::CREATED);
    assert_eq!(aggregate(&server, title_id).await, (3.0, 2));

    let response = review(&server, &alice, title_id, 5).await;
    response.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(aggregate(&server, title_id).await, (3.0, 2));

    let reviews: Vec<Value> = server
        .get(&format!("/api/v1/titles/{}/reviews", title_id))
        .await
        .json();
    assert_eq!(reviews.len(), 2);
}

#[tokio::test]
async fn test_review_rejections() {
    let server = create_test_server().await;
    let admin = login(&server, ADMIN, ADMIN_PASSWORD).await;
    let title_id = seed_title(&server, &admin).await;
    let alice = register(&server, "alice").await;

    let response = server
        .post(&format!("/api/v1/titles/{}/reviews", title_id))
        .json(&json!({ "rating": 3 }))
        .await;
    response.assert_status(StatusCode::UNAUTHORIZED);

    for rating in [0, 6] {
        let response = review(&server, &alice, title_id, rating).await;
        response.assert_status(StatusCode::BAD_REQUEST);
        let body: Value = response.json();
        assert!(body["fields"]["rating"].is_array());
    }

    review(&server, &alice, 999, 3)
        .await
        .assert_status(StatusCode::NOT_FOUND);

    assert_eq!(aggregate(&server, title_id).await, (0.0, 0));
}

#[tokio::test]
async fn test_bad_review_bodies_are_field_errors() {
    let server = create_test_server().await;
    let admin = login(&server, ADMIN, ADMIN_PASSWORD).await;
    let title_id = seed_title(&server, &admin).await;
    let alice = register(&server, "alice").await;
    let path = format!("/api/v1/titles/{}/reviews", title_id);

    let bodies = [
        json!({ "comment": "no rating" }),
        json!({ "rating": "4" }),
        json!({ "rating": 4.5 }),
        json!({ "rating": null }),
    ];
    for body in bodies {
        let response = server
            .post(&path)
            .add_header(AUTHORIZATION, token_header(&alice))
            .json(&body)
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
        let body: Value = response.json();
        assert!(body["fields"]["rating"].is_array());
    }

    let response = server
        .post(&path)
        .add_header(AUTHORIZATION, token_header(&alice))
        .json(&json!({ "rating": 4, "comment": 7 }))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert!(body["fields"]["non_field_errors"].is_array());

    // Authentication is checked before the body
    server
        .post(&path)
        .json(&json!({ "comment": "x" }))
        .await
        .assert_status(StatusCode::UNAUTHORIZED);

    assert_eq!(aggregate(&server, title_id).await, (0.0, 0));
}

#[tokio::test]
async fn test_catalog_writes_require_staff() {
    let server = create_test_server().await;
    let alice = register(&server, "alice").await;
    let platform = json!({
        "name": "Hulu",
        "about": "Streaming service",
        "website": "https://www.hulu.com"
    });

    server
        .post("/api/v1/platforms")
        .json(&platform)
        .await
        .assert_status(StatusCode::UNAUTHORIZED);

    server
        .post("/api/v1/platforms")
        .add_header(AUTHORIZATION, token_header(&alice))
        .json(&platform)
        .await
        .assert_status(StatusCode::FORBIDDEN);

    let platforms: Vec<Value> = server.get("/api/v1/platforms").await.json();
    assert!(platforms.is_empty());
}

#[tokio::test]
async fn test_platform_crud_and_cascade() {
    let server = create_test_server().await;
    let admin = login(&server, ADMIN, ADMIN_PASSWORD).await;
    let title_id = seed_title(&server, &admin).await;
    let alice = register(&server, "alice").await;
    review(&server, &alice, title_id, 5)
        .await
        .assert_status(StatusCode::CREATED);

    let platforms: Vec<Value> = server.get("/api/v1/platforms").await.json();
    let platform_id = platforms[0]["id"].as_i64().unwrap();

    let detail: Value = server
        .get(&format!("/api/v1/platforms/{}", platform_id))
        .await
        .json();
    assert_eq!(detail["watchlist"].as_array().unwrap().len(), 1);

    let response = server
        .put(&format!("/api/v1/platforms/{}", platform_id))
        .add_header(AUTHORIZATION, token_header(&admin))
        .json(&json!({
            "name": "Netflix US",
            "about": "Streaming service",
            "website": "not-a-url"
        }))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert!(body["fields"]["website"].is_array());

    server
        .delete(&format!("/api/v1/platforms/{}", platform_id))
        .add_header(AUTHORIZATION, token_header(&admin))
        .await
        .assert_status(StatusCode::NO_CONTENT);

    server
        .get(&format!("/api/v1/titles/{}", title_id))
        .await
        .assert_status(StatusCode::NOT_FOUND);
    let reviews: Vec<Value> = server.get("/api/v1/reviews").await.json();
    assert!(reviews.is_empty());
}

#[tokio::test]
async fn test_title_validation() {
    let server = create_test_server().await;
    let admin = login(&server, ADMIN, ADMIN_PASSWORD).await;

    let response = server
        .post("/api/v1/titles")
        .add_header(AUTHORIZATION, token_header(&admin))
        .json(&json!({
            "platform_id": 42,
            "name": "X",
            "description": "X",
            "release_year": 2020
        }))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert!(body["fields"]["name"].is_array());
    assert!(body["fields"]["platform_id"].is_array());

    let response = server
        .post("/api/v1/titles")
        .add_header(AUTHORIZATION, token_header(&admin))
        .json(&json!({ "name": "Dark" }))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert!(body["fields"]["non_field_errors"].is_array());
}

#[tokio::test]
async fn test_review_edit_permissions() {
    let server = create_test_server().await;
    let admin = login(&server, ADMIN, ADMIN_PASSWORD).await;
    let title_id = seed_title(&server, &admin).await;
    let alice = register(&server, "alice").await;
    let mallory = register(&server, "mallory").await;

    let created: Value = review(&server, &alice, title_id, 4).await.json();
    let path = format!("/api/v1/reviews/{}", created["id"]);

    server
        .put(&path)
        .add_header(AUTHORIZATION, token_header(&mallory))
        .json(&json!({ "comment": "Vandalised" }))
        .await
        .assert_status(StatusCode::FORBIDDEN);

    let response = server
        .put(&path)
        .add_header(AUTHORIZATION, token_header(&alice))
        .json(&json!({ "comment": "Even better on rewatch" }))
        .await;
    response.assert_status_ok();
    let updated: Value = response.json();
    assert_eq!(updated["comment"], "Even better on rewatch");

    server
        .delete(&path)
        .add_header(AUTHORIZATION, token_header(&admin))
        .await
        .assert_status(StatusCode::NO_CONTENT);

    let review: Value = server.get(&path).await.json();
    assert_eq!(review["active"], false);
    assert_eq!(aggregate(&server, title_id).await, (4.0, 1));

    let by_alice: Vec<Value> = server.get("/api/v1/reviews?username=alice").await.json();
    assert_eq!(by_alice.len(), 1);
    let by_bob: Vec<Value> = server.get("/api/v1/reviews?username=bob").await.json();
    assert!(by_bob.is_empty());
}

#[tokio::test]
async fn test_logout_revokes_token() {
    let server = create_test_server().await;
    let alice = register(&server, "alice").await;

    server
        .post("/api/v1/account/logout")
        .add_header(AUTHORIZATION, token_header(&alice))
        .await
        .assert_status_ok();

    server
        .post("/api/v1/account/logout")
        .add_header(AUTHORIZATION, token_header(&alice))
        .await
        .assert_status(StatusCode::UNAUTHORIZED);

    let fresh = login(&server, "alice", "hunter22").await;
    assert_ne!(fresh, alice);
}
