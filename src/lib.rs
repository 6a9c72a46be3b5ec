pub mod auth;
pub mod cache;
pub mod categories;
pub mod config;
pub mod database;
pub mod diary;
pub mod error;
pub mod logging;
pub mod search;
pub mod storage;
pub mod tasks;
pub mod views;

pub use config::Config;
pub use database::{create_pool, create_redis_client, run_migrations};
use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, patch, post},
    Router,
};
use config::StorageConfig;
use redis::aio::ConnectionManager;
use sqlx::PgPool;
use std::sync::Arc;
use storage::BlobStorage;
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};
use crate::auth::security::auth_middleware;

/// Room for the non-file form fields on top of the attachments themselves.
const FORM_OVERHEAD_BYTES: usize = 1024 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    /// Share-link cache; the app runs without it.
    pub redis: Option<ConnectionManager>,
    pub config: Config,
    pub storage: Arc<dyn BlobStorage>,
}

pub fn create_router(state: Arc<AppState>) -> Router {
    // public routes (no authentication required)
    let public_routes = Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/register", post(auth::login::register))
        .route("/login", post(auth::login::login))
        .route(
            "/public/share/{token}",
            get(diary::handlers::get_shared_entry),
        );

    // protected routes (authentication required)
    let protected_routes = Router::new()
        .route("/me", get(auth::login::get_me))
        .route(
            "/diary",
            get(views::handlers::get_entries_for_view).post(diary::handlers::create_entry),
        )
        .route("/diary/search", get(search::handlers::search_entries))
        .route("/diary/timeline", get(views::handlers::get_timeline))
        .route("/diary/stats", get(views::handlers::get_stats))
        .route("/diary/reindex", post(diary::handlers::reindex))
        .route(
            "/diary/{id}",
            get(diary::handlers::get_entry)
                .put(diary::handlers::update_entry)
                .delete(diary::handlers::delete_entry),
        )
        .route("/diary/{id}/favorite", patch(diary::handlers::toggle_favorite))
        .route(
            "/diary/{id}/attachments/{attachment_id}",
            patch(diary::handlers::rename_attachment).delete(diary::handlers::delete_attachment),
        )
        .route(
            "/categories",
            get(categories::handlers::list_categories).post(categories::handlers::create_category),
        )
        .route(
            "/categories/{id}",
            patch(categories::handlers::rename_category)
                .delete(categories::handlers::delete_category),
        )
        .route(
            "/tasks",
            get(tasks::handlers::list_tasks).post(tasks::handlers::create_task),
        )
        .route(
            "/tasks/{id}",
            get(tasks::handlers::get_task)
                .put(tasks::handlers::update_task)
                .delete(tasks::handlers::delete_task),
        )
        .route("/tasks/{id}/toggle", patch(tasks::handlers::toggle_task))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    let body_limit = state
        .config
        .max_upload_bytes
        .saturating_mul(diary::multipart::MAX_FILES)
        .saturating_add(FORM_OVERHEAD_BYTES);

    let mut router = Router::new()
        .merge(public_routes)
        .merge(protected_routes);

    // local blobs are served by the app itself
    if let StorageConfig::Local { root, public_url } = &state.config.storage {
        let mount = public_url.trim_end_matches('/');
        if mount.starts_with('/') && mount.len() > 1 {
            router = router.nest_service(mount, ServeDir::new(root));
        }
    }

    router
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn root() -> &'static str {
    "Webdiary API - v0.1.0"
}

async fn health() -> &'static str {
    "ok"
}
