#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::response::Response;
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use tower::ServiceExt;

use printwatch::config::Config;
use printwatch::db::{CreatePrint, CreatePrinter, Print, PrintRepository, Printer, PrinterRepository, User, UserRepository};
use printwatch::routes::auth::create_jwt;
use printwatch::services::init::run_migrations;
use printwatch::{build_router, AppState};

pub struct TestApp {
    pub router: Router,
    pub state: Arc<AppState>,
}

impl TestApp {
    pub fn pool(&self) -> &SqlitePool {
        &self.state.db
    }
}

pub fn test_config() -> Config {
    let mut config = Config::default();
    config.jwt.secret = "integration-test-secret".to_string();
    config.database.url = "sqlite::memory:".to_string();
    config
}

/// Single-connection in-memory database; the connection is never recycled so
/// the schema lives for the whole test.
pub async fn test_pool() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await
        .expect("in-memory database should open");
    run_migrations(&pool).await.expect("migrations should apply");
    pool
}

/// File-backed database with several connections, for tests that need
/// transactions to actually overlap. The file lives as long as `dir`.
pub async fn file_pool(dir: &tempfile::TempDir) -> SqlitePool {
    let options = SqliteConnectOptions::new()
        .filename(dir.path().join("printwatch-test.db"))
        .create_if_missing(true)
        .foreign_keys(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(4)
        .connect_with(options)
        .await
        .expect("file database should open");
    run_migrations(&pool).await.expect("migrations should apply");
    pool
}

pub async fn spawn_app() -> TestApp {
    spawn_app_with_pool(test_pool().await)
}

pub fn spawn_app_with_pool(pool: SqlitePool) -> TestApp {
    let state = Arc::new(AppState::new(pool, test_config()));
    let router = build_router(state.clone()).expect("router should build");
    TestApp { router, state }
}

/// Create a user and a bearer token for it.
pub async fn create_user(app: &TestApp, email: &str) -> (User, String) {
    let user = UserRepository::create(app.pool(), email)
        .await
        .expect("user should be created");
    let token = create_jwt(&app.state.config.jwt, user.id).expect("token should sign");
    (user, token)
}

pub async fn create_printer(app: &TestApp, user_id: i64, name: &str) -> Printer {
    PrinterRepository::create(
        app.pool(),
        user_id,
        CreatePrinter {
            name: name.to_string(),
            watching_enabled: None,
            action_on_failure: None,
        },
    )
    .await
    .expect("printer should be created")
}

pub async fn create_print(app: &TestApp, user_id: i64, filename: &str) -> Print {
    PrintRepository::create(
        app.pool(),
        user_id,
        CreatePrint {
            filename: filename.to_string(),
            printer_id: None,
            video_url: Some(format!("https://cdn.example.com/{filename}.mp4")),
            tagged_video_url: None,
            poster_url: None,
        },
    )
    .await
    .expect("print should be created")
}

/// Start `print` on `printer`, the way the device channel does.
pub async fn start_print_on(app: &TestApp, printer: &Printer, print: &Print) {
    sqlx::query("UPDATE prints SET printer_id = ? WHERE id = ?")
        .bind(printer.id)
        .bind(print.id)
        .execute(app.pool())
        .await
        .unwrap();
    PrinterRepository::set_current_print(app.pool(), printer.id, Some(print.id))
        .await
        .unwrap();
}

pub async fn raise_alert(app: &TestApp, print_id: i64) {
    sqlx::query("UPDATE prints SET alerted_at = CURRENT_TIMESTAMP WHERE id = ?")
        .bind(print_id)
        .execute(app.pool())
        .await
        .unwrap();
}

pub async fn task_count(app: &TestApp, task_name: &str) -> i64 {
    sqlx::query_scalar("SELECT COUNT(*) FROM task_queue WHERE task_name = ?")
        .bind(task_name)
        .fetch_one(app.pool())
        .await
        .unwrap()
}

// ---------------------------------------------------------------------------
// Request helpers
// ---------------------------------------------------------------------------

pub async fn send(
    app: &TestApp,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> Response {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let request = match body {
        Some(json) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    app.router.clone().oneshot(request).await.unwrap()
}

pub async fn get(app: &TestApp, uri: &str, token: &str) -> Response {
    send(app, Method::GET, uri, Some(token), None).await
}

pub async fn post_json(app: &TestApp, uri: &str, token: &str, body: Value) -> Response {
    send(app, Method::POST, uri, Some(token), Some(body)).await
}

pub async fn put_json(app: &TestApp, uri: &str, token: &str, body: Value) -> Response {
    send(app, Method::PUT, uri, Some(token), Some(body)).await
}

pub async fn patch_json(app: &TestApp, uri: &str, token: &str, body: Value) -> Response {
    send(app, Method::PATCH, uri, Some(token), Some(body)).await
}

pub async fn delete(app: &TestApp, uri: &str, token: &str) -> Response {
    send(app, Method::DELETE, uri, Some(token), None).await
}

pub async fn body_json(response: Response) -> Value {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body should be readable")
        .to_bytes();
    serde_json::from_slice(&bytes).expect("body should be JSON")
}

pub async fn expect_json(response: Response, status: StatusCode) -> Value {
    assert_eq!(response.status(), status);
    body_json(response).await
}
