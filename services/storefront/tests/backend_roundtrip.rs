//! Exercises the storefront client end to end against a stub of the REST
//! backend served by axum on an ephemeral port.

use axum::{
    extract::{Path, Query, State},
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    routing::{delete, get, post},
    Json, Router,
};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use storefront_core::ports::{ClientError, SessionStore};
use storefront_lib::{
    adapters::{FileSessionStore, ReqwestTransport},
    app::Storefront,
    config::Config,
    error::AppError,
};
use tracing::Level;

//=========================================================================================
// Stub Backend
//=========================================================================================

const CATALOG_SIZE: usize = 5;

#[derive(Default)]
struct Stub {
    product_pages: Vec<u32>,
    wishlist: Vec<Value>,
    logout_fails: bool,
    logout_calls: usize,
    /// Serve an empty first page that still reports more to come.
    empty_first_page: bool,
}

type Shared = Arc<Mutex<Stub>>;

fn user_json() -> Value {
    json!({"id": "u1", "name": "Ada", "email": "ada@example.com", "phone": "5550001"})
}

fn product_json(n: usize) -> Value {
    json!({
        "id": format!("p-{}", n),
        "name": format!("Product {}", n),
        "price": 10.0 * n as f64,
        "category": "Home",
        "variations": [{"name": "Size", "options": ["S", "M"]}]
    })
}

fn bearer(headers: &HeaderMap) -> Option<String> {
    headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::to_string)
}

fn unauthorized() -> (StatusCode, Json<Value>) {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({"error": {"message": "Authentication required"}})),
    )
}

async fn health() -> Json<Value> {
    Json(json!({"success": true, "data": null}))
}

async fn login(Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
    if body["otp"] == "123456" {
        (
            StatusCode::OK,
            Json(json!({"data": {"token": "t1", "user": user_json()}})),
        )
    } else {
        (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": {"message": "Invalid OTP"}})),
        )
    }
}

async fn profile(headers: HeaderMap) -> (StatusCode, Json<Value>) {
    match bearer(&headers).as_deref() {
        Some("t1") => (StatusCode::OK, Json(json!({"data": {"user": user_json()}}))),
        _ => unauthorized(),
    }
}

async fn logout(State(stub): State<Shared>) -> StatusCode {
    let mut stub = stub.lock().unwrap();
    stub.logout_calls += 1;
    if stub.logout_fails {
        StatusCode::INTERNAL_SERVER_ERROR
    } else {
        StatusCode::OK
    }
}

async fn products(
    State(stub): State<Shared>,
    Query(query): Query<HashMap<String, String>>,
) -> Json<Value> {
    let page: usize = query.get("page").and_then(|p| p.parse().ok()).unwrap_or(1);
    let limit: usize = query.get("limit").and_then(|l| l.parse().ok()).unwrap_or(10);
    let empty_first_page = {
        let mut stub = stub.lock().unwrap();
        stub.product_pages.push(page as u32);
        stub.empty_first_page
    };
    let page = if empty_first_page { page - 1 } else { page };
    if page == 0 {
        return Json(json!({"data": {"data": [], "hasMore": true}}));
    }

    let start = (page - 1) * limit;
    let end = (start + limit).min(CATALOG_SIZE);
    let data: Vec<Value> = (start..end).map(|i| product_json(i + 1)).collect();
    Json(json!({"data": {"data": data, "hasMore": end < CATALOG_SIZE}}))
}

async fn wishlist_list(State(stub): State<Shared>, headers: HeaderMap) -> (StatusCode, Json<Value>) {
    if bearer(&headers).is_none() {
        return unauthorized();
    }
    let items = stub.lock().unwrap().wishlist.clone();
    (StatusCode::OK, Json(json!({"data": items})))
}

async fn wishlist_add(
    State(stub): State<Shared>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    if bearer(&headers).is_none() {
        return unauthorized();
    }
    let n: usize = body["productId"]
        .as_str()
        .and_then(|id| id.strip_prefix("p-"))
        .and_then(|n| n.parse().ok())
        .unwrap_or(0);
    let item = json!({"product": product_json(n), "addedAt": "2024-03-01T12:00:00Z"});
    stub.lock().unwrap().wishlist.push(item.clone());
    (StatusCode::CREATED, Json(json!({"data": item})))
}

async fn wishlist_remove(
    State(stub): State<Shared>,
    headers: HeaderMap,
    Path(product_id): Path<String>,
) -> StatusCode {
    if bearer(&headers).is_none() {
        return StatusCode::UNAUTHORIZED;
    }
    stub.lock()
        .unwrap()
        .wishlist
        .retain(|item| item["product"]["id"] != product_id.as_str());
    StatusCode::NO_CONTENT
}

async fn spawn_backend(stub: Shared) -> String {
    let app = Router::new()
        .route("/api/health", get(health))
        .route("/api/auth/login", post(login))
        .route("/api/auth/profile", get(profile))
        .route("/api/auth/logout", post(logout))
        .route("/api/products", get(products))
        .route("/api/wishlist", get(wishlist_list).post(wishlist_add))
        .route("/api/wishlist/{product_id}", delete(wishlist_remove))
        .with_state(stub);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

//=========================================================================================
// Helpers
//=========================================================================================

fn config(api_url: &str, token_path: PathBuf, page_size: u32) -> Arc<Config> {
    Arc::new(Config {
        api_url: api_url.to_string(),
        token_path,
        log_level: Level::INFO,
        page_size,
        scroll_threshold: 100.0,
    })
}

fn storefront(config: &Arc<Config>) -> Storefront {
    Storefront::new(config.clone())
}

//=========================================================================================
// Tests
//=========================================================================================

#[tokio::test]
async fn login_persists_session_for_the_next_start() {
    let stub = Shared::default();
    let url = spawn_backend(stub.clone()).await;
    let dir = tempfile::tempdir().unwrap();
    let config = config(&url, dir.path().join("token"), 2);

    let first = storefront(&config);
    first.restore_session().await.unwrap();
    assert!(!first.auth.session().is_authenticated);
    first.login("5550001", "123456").await.unwrap();
    assert_eq!(
        FileSessionStore::new(&config.token_path).get().unwrap().as_deref(),
        Some("t1")
    );

    let second = storefront(&config);
    assert!(second.auth.session().is_loading);
    second.restore_session().await.unwrap();
    let session = second.auth.session();
    assert!(session.is_authenticated);
    assert_eq!(session.user.unwrap().id, "u1");
    assert!(second.whoami().message.contains("Ada"));
}

#[tokio::test]
async fn rejected_login_surfaces_backend_message() {
    let url = spawn_backend(Shared::default()).await;
    let dir = tempfile::tempdir().unwrap();
    let app = storefront(&config(&url, dir.path().join("token"), 2));

    let err = app.login("5550001", "000000").await.unwrap_err();

    match err {
        AppError::Client(ClientError::Validation { status, message, .. }) => {
            assert_eq!(status, 400);
            assert_eq!(message, "Invalid OTP");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(app.auth.session().error.as_deref(), Some("Invalid OTP"));
    assert!(!dir.path().join("token").exists());
}

#[tokio::test]
async fn expired_token_is_discarded_on_start() {
    let url = spawn_backend(Shared::default()).await;
    let dir = tempfile::tempdir().unwrap();
    let token_path = dir.path().join("token");
    std::fs::write(&token_path, "stale").unwrap();
    let app = storefront(&config(&url, token_path.clone(), 2));

    app.restore_session().await.unwrap();

    let session = app.auth.session();
    assert!(!session.is_authenticated);
    assert_eq!(session.user, None);
    assert_eq!(session.error, None);
    assert!(!token_path.exists());
}

#[tokio::test]
async fn browse_pages_through_the_whole_catalog() {
    let stub = Shared::default();
    let url = spawn_backend(stub.clone()).await;
    let dir = tempfile::tempdir().unwrap();
    let app = storefront(&config(&url, dir.path().join("token"), 2));

    let mut out = Vec::new();
    let rendered = app.browse(10, &mut out).await.unwrap();

    assert_eq!(rendered, CATALOG_SIZE);
    assert_eq!(stub.lock().unwrap().product_pages, vec![1, 2, 3]);
    let text = String::from_utf8(out).unwrap();
    let first = text.find("Product 1").unwrap();
    let last = text.find("Product 5").unwrap();
    assert!(first < last);
    assert!(text.contains("End of catalog: 5 products"));
}

#[tokio::test]
async fn browse_stops_at_the_requested_page_count() {
    let stub = Shared::default();
    let url = spawn_backend(stub.clone()).await;
    let dir = tempfile::tempdir().unwrap();
    let app = storefront(&config(&url, dir.path().join("token"), 2));

    let mut out = Vec::new();
    let rendered = app.browse(1, &mut out).await.unwrap();

    assert_eq!(rendered, 2);
    assert_eq!(stub.lock().unwrap().product_pages, vec![1]);
    assert!(String::from_utf8(out).unwrap().contains("more available"));
}

#[tokio::test]
async fn browse_continues_past_an_empty_page() {
    let stub = Shared::default();
    stub.lock().unwrap().empty_first_page = true;
    let url = spawn_backend(stub.clone()).await;
    let dir = tempfile::tempdir().unwrap();
    let app = storefront(&config(&url, dir.path().join("token"), 2));

    let mut out = Vec::new();
    let rendered = app.browse(2, &mut out).await.unwrap();

    assert_eq!(rendered, 2);
    assert_eq!(stub.lock().unwrap().product_pages, vec![1, 2]);
    let text = String::from_utf8(out).unwrap();
    assert!(text.contains("Product 1"));
    assert!(text.contains("Product 2"));
    assert!(text.contains("Showing 2 products, more available"));
}

#[tokio::test]
async fn wishlist_requires_a_session() {
    let url = spawn_backend(Shared::default()).await;
    let dir = tempfile::tempdir().unwrap();
    let app = storefront(&config(&url, dir.path().join("token"), 2));

    let err = app.wishlist().await.unwrap_err();

    assert!(matches!(err, AppError::Client(ref e) if e.is_unauthorized()));
}

#[tokio::test]
async fn wishlist_add_list_remove() {
    let url = spawn_backend(Shared::default()).await;
    let dir = tempfile::tempdir().unwrap();
    let app = storefront(&config(&url, dir.path().join("token"), 2));
    app.login("5550001", "123456").await.unwrap();

    let added = app.add_to_wishlist("p-3").await.unwrap();
    assert!(added.message.contains("Product 3"));
    let listing = app.wishlist().await.unwrap();
    assert!(listing.contains("Product 3  $30.00  (saved 2024-03-01)"));

    app.remove_from_wishlist("p-3").await.unwrap();
    assert_eq!(app.wishlist().await.unwrap(), "Your wishlist is empty.");
}

#[tokio::test]
async fn logout_clears_session_when_backend_fails() {
    let stub = Shared::default();
    stub.lock().unwrap().logout_fails = true;
    let url = spawn_backend(stub.clone()).await;
    let dir = tempfile::tempdir().unwrap();
    let token_path = dir.path().join("token");
    let app = storefront(&config(&url, token_path.clone(), 2));
    app.login("5550001", "123456").await.unwrap();

    app.logout().await.unwrap();

    assert_eq!(stub.lock().unwrap().logout_calls, 1);
    assert!(!app.auth.session().is_authenticated);
    assert!(!token_path.exists());
}

#[tokio::test]
async fn unreachable_backend_reports_status_zero() {
    // Bind then drop to get a port nothing listens on.
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    let dir = tempfile::tempdir().unwrap();
    let transport = Arc::new(ReqwestTransport::new(format!("http://{}", addr)));
    let tokens = Arc::new(FileSessionStore::new(dir.path().join("token")));
    let app = Storefront::with_ports(
        config(&format!("http://{}", addr), dir.path().join("token"), 2),
        transport,
        tokens,
    );

    let err = app.health().await.unwrap_err();

    match err {
        AppError::Client(e) => {
            assert!(matches!(e, ClientError::Network { .. }));
            assert_eq!(e.status(), 0);
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn health_probe_succeeds() {
    let url = spawn_backend(Shared::default()).await;
    let dir = tempfile::tempdir().unwrap();
    let app = storefront(&config(&url, dir.path().join("token"), 2));

    let toast = app.health().await.unwrap();
    assert!(toast.message.ends_with("is up"));
}
