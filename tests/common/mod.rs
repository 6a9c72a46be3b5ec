#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use serde_json::{json, Value};
use sqlx::{postgres::PgPoolOptions, PgPool};
use std::{
    sync::{Arc, Mutex},
    time::Duration,
};
use tower::ServiceExt;
use uuid::Uuid;
use webdiary::{
    config::{StorageConfig, DEFAULT_MAX_UPLOAD_BYTES},
    create_router,
    storage::{BlobStorage, StorageError, StoredBlob},
    AppState, Config,
};

pub const BOUNDARY: &str = "webdiary-test-boundary";

pub struct TestApp {
    pub router: axum::Router,
    pub db: PgPool,
    pub state: Arc<AppState>,
    pub storage: Arc<MemoryStorage>,
}

/// In-memory blob store. Uploads whose file name contains "fail" are rejected.
#[derive(Default)]
pub struct MemoryStorage {
    pub stored: Mutex<Vec<String>>,
    pub deleted: Mutex<Vec<String>>,
}

#[async_trait]
impl BlobStorage for MemoryStorage {
    async fn upload(
        &self,
        _bytes: Vec<u8>,
        original_name: &str,
        _mime_type: &str,
    ) -> Result<StoredBlob, StorageError> {
        if original_name.contains("fail") {
            return Err(StorageError::Rejected {
                status: 500,
                body: "storage backend unavailable".into(),
            });
        }
        let key = webdiary::storage::generate_key(original_name);
        self.stored.lock().unwrap().push(key.clone());
        Ok(StoredBlob {
            public_url: format!("http://blobs.test/{key}"),
            external_ref: key,
        })
    }

    async fn delete(&self, external_ref: &str) -> Result<(), StorageError> {
        self.deleted.lock().unwrap().push(external_ref.to_string());
        Ok(())
    }
}

pub async fn spawn_app(pool: PgPool) -> TestApp {
    // the share cache is optional; TEST_REDIS_URL turns it on
    let redis = match std::env::var("TEST_REDIS_URL") {
        Ok(url) => webdiary::create_redis_client(&url).await.ok(),
        Err(_) => None,
    };

    let config = Config {
        database_url: "postgres://unused".to_string(),
        redis_url: None,
        jwt_secret: "test_secret".to_string(),
        jwt_expiry_hours: 24,
        server_address: "127.0.0.1:0".to_string(),
        storage: StorageConfig::Local {
            root: std::env::temp_dir().join("webdiary-test-uploads"),
            public_url: "/uploads".to_string(),
        },
        max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
    };

    let storage = Arc::new(MemoryStorage::default());

    let state = Arc::new(AppState {
        db: pool.clone(),
        redis,
        config,
        storage: storage.clone(),
    });

    let router = create_router(state.clone());

    TestApp {
        router,
        db: pool,
        state,
        storage,
    }
}

pub async fn setup_test_app() -> Result<TestApp, String> {
    let database_url = std::env::var("TEST_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
        .map_err(|_| "TEST_DATABASE_URL or DATABASE_URL must be set for integration tests".to_string())?;

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .acquire_timeout(Duration::from_secs(5))
        .connect(&database_url)
        .await
        .map_err(|e| format!("Failed to connect to database: {e}"))?;

    sqlx::migrate!()
        .run(&pool)
        .await
        .map_err(|e| format!("Failed to run migrations: {e}"))?;

    Ok(spawn_app(pool).await)
}

/// Sends a request and decodes the body as JSON (`Null` when empty).
pub async fn send(app: &axum::Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&body).into()))
    };
    (status, value)
}

pub fn json_request(method: &str, uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .uri(uri)
        .method(method)
        .header("Content-Type", "application/json");
    if let Some(token) = token {
        builder = builder.header("Authorization", format!("Bearer {token}"));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

pub fn get(uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().uri(uri).method("GET");
    if let Some(token) = token {
        builder = builder.header("Authorization", format!("Bearer {token}"));
    }
    builder.body(Body::empty()).unwrap()
}

pub fn empty_request(method: &str, uri: &str, token: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .method(method)
        .header("Authorization", format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap()
}

/// Registers a fresh user and returns `(token, username)`.
pub async fn register_user(app: &axum::Router) -> (String, String) {
    let username = format!("user_{}", Uuid::new_v4().simple());
    let (status, body) = send(
        app,
        json_request(
            "POST",
            "/register",
            None,
            json!({
                "username": username,
                "email": format!("{username}@example.com"),
                "password": "password123",
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "register failed: {body}");
    (body["token"].as_str().unwrap().to_string(), username)
}

/// A file part for [`multipart_request`].
pub struct FilePart<'a> {
    pub name: &'a str,
    pub mime: &'a str,
    pub bytes: &'a [u8],
}

pub fn multipart_body(fields: &[(&str, &str)], files: &[FilePart<'_>]) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
    }
    for file in files {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"attachments\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
                file.name, file.mime
            )
            .as_bytes(),
        );
        body.extend_from_slice(file.bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

pub fn multipart_request(
    method: &str,
    uri: &str,
    token: &str,
    fields: &[(&str, &str)],
    files: &[FilePart<'_>],
) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .method(method)
        .header("Authorization", format!("Bearer {token}"))
        .header(
            "Content-Type",
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(multipart_body(fields, files)))
        .unwrap()
}

/// Creates an entry without attachments and returns its JSON.
pub async fn create_entry(app: &axum::Router, token: &str, fields: &[(&str, &str)]) -> Value {
    let (status, body) = send(app, multipart_request("POST", "/diary", token, fields, &[])).await;
    assert_eq!(status, StatusCode::CREATED, "create failed: {body}");
    body["entry"].clone()
}
