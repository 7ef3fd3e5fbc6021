//! Portfolio Backend Server
//!
//! A personal-site backend using:
//! - Plain JSON array files for article/event/gallery/book persistence
//! - A rolling 30-day visit counter for lightweight metrics
//! - WebP re-encoding for uploaded images
//! - Axum with mirrored CORS for the credentialed admin frontend

use axum::{
    extract::{
        rejection::JsonRejection,
        DefaultBodyLimit, Multipart, Path, Query, State,
    },
    handler::HandlerWithoutStateExt,
    http::{header::AUTHORIZATION, HeaderMap, Method},
    routing::{delete, get, post},
    Json, Router,
};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tower_http::{
    cors::{AllowHeaders, AllowOrigin, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};
use tracing::{error, info, warn};

mod analytics;
mod auth;
mod config;
mod error;
mod metrics;
mod storage;
mod upload;

use analytics::{AnalyticsConfig, AnalyticsError, AnalyticsService};
use auth::{AdminAuth, AdminConfig};
use config::Config;
use error::ApiError;
use metrics::HitCounter;
use storage::{CollectionStore, JsonCollectionStore, Record};
use upload::{UploadError, UploadService};

// ============================================================================
// APPLICATION STATE
// ============================================================================

/// Content collections exposed under `/api`
const COLLECTIONS: [&str; 4] = ["articles", "events", "gallery", "books"];

/// Request body cap, generous enough for base64-embedded article media
const BODY_LIMIT_BYTES: usize = 50 * 1024 * 1024;

/// Shared application state
pub struct AppState {
    /// Collection persistence
    store: Arc<dyn CollectionStore>,
    /// Daily visit counter
    hits: HitCounter,
    /// Upload validation and WebP conversion
    uploads: Arc<UploadService>,
    /// Admin session service
    auth: AdminAuth,
    /// Google Analytics report proxy
    analytics: AnalyticsService,
}

impl AppState {
    pub fn new(config: &Config) -> Self {
        let store: Arc<dyn CollectionStore> = Arc::new(JsonCollectionStore::new(&config.data_dir));
        let hits = HitCounter::new(store.clone());
        let uploads = Arc::new(UploadService::new(&config.upload_dir));

        // Try to configure admin login from environment
        let auth = match AdminConfig::from_settings(
            config.admin_username.clone(),
            config.admin_password.clone(),
        ) {
            Ok(admin) => {
                info!("Admin login enabled for user {}", admin.username);
                AdminAuth::new(admin)
            }
            Err(_) => {
                warn!("ADMIN_USERNAME/ADMIN_PASSWORD not set - admin login disabled");
                AdminAuth::unconfigured()
            }
        };

        // Try to configure the analytics proxy from environment
        let analytics = match AnalyticsConfig::load(
            config.ga_property_id.clone(),
            config.ga_credentials.as_deref(),
        ) {
            Ok(ga) => {
                info!("Google Analytics configured for property {}", ga.property_id);
                AnalyticsService::new(ga)
            }
            Err(AnalyticsError::NotConfigured) => {
                warn!("Google Analytics not configured - /api/analytics serves mock data");
                AnalyticsService::unconfigured()
            }
            Err(e) => {
                error!("Failed to load Google Analytics credentials: {}", e);
                AnalyticsService::unconfigured()
            }
        };

        Self {
            store,
            hits,
            uploads,
            auth,
            analytics,
        }
    }
}

// ============================================================================
// API TYPES
// ============================================================================

#[derive(Debug, Serialize)]
struct UpsertResponse {
    success: bool,
    record: Record,
}

#[derive(Debug, Serialize)]
struct OkResponse {
    success: bool,
}

impl OkResponse {
    fn ok() -> Json<Self> {
        Json(Self { success: true })
    }
}

#[derive(Debug, Deserialize)]
struct DeleteParams {
    id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LoginRequest {
    username: String,
    password: String,
}

#[derive(Debug, Serialize)]
struct LoginResponse {
    success: bool,
    token: String,
}

#[derive(Debug, Serialize)]
struct SessionResponse {
    success: bool,
    username: String,
    created_at: i64,
}

#[derive(Debug, Serialize)]
struct UploadResponse {
    url: String,
}

// ============================================================================
// COLLECTION HANDLERS
// ============================================================================

fn known_collection(name: &str) -> Result<(), ApiError> {
    if COLLECTIONS.contains(&name) {
        Ok(())
    } else {
        Err(ApiError::NotFound)
    }
}

/// List every record of a collection, oldest first
async fn list_records(
    State(state): State<Arc<AppState>>,
    Path(collection): Path<String>,
) -> Result<Json<Vec<Record>>, ApiError> {
    known_collection(&collection)?;
    Ok(Json(state.store.list(&collection)))
}

/// Create or update a record, matched by id and replaced wholesale
async fn upsert_record(
    State(state): State<Arc<AppState>>,
    Path(collection): Path<String>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<UpsertResponse>, ApiError> {
    known_collection(&collection)?;

    let Json(value) = body.map_err(|e| ApiError::BadRequest(format!("Invalid JSON input: {}", e)))?;
    let record = match value {
        Value::Object(record) => record,
        _ => return Err(ApiError::BadRequest("Expected a JSON object".to_string())),
    };

    let stored = state.store.upsert(&collection, record)?;
    Ok(Json(UpsertResponse {
        success: true,
        record: stored,
    }))
}

/// Delete a record by `?id=` query parameter
async fn delete_record(
    State(state): State<Arc<AppState>>,
    Path(collection): Path<String>,
    Query(params): Query<DeleteParams>,
) -> Result<Json<OkResponse>, ApiError> {
    known_collection(&collection)?;

    let id = params
        .id
        .filter(|id| !id.is_empty())
        .ok_or_else(|| ApiError::BadRequest("Missing ID".to_string()))?;

    state.store.delete(&collection, &id)?;
    Ok(OkResponse::ok())
}

/// Delete a record by trailing path segment
async fn delete_record_by_path(
    State(state): State<Arc<AppState>>,
    Path((collection, id)): Path<(String, String)>,
) -> Result<Json<OkResponse>, ApiError> {
    known_collection(&collection)?;
    state.store.delete(&collection, &id)?;
    Ok(OkResponse::ok())
}

// ============================================================================
// METRICS HANDLERS
// ============================================================================

/// Count one visit against today's date
async fn record_visit(State(state): State<Arc<AppState>>) -> Result<Json<OkResponse>, ApiError> {
    state.hits.record_visit()?;
    Ok(OkResponse::ok())
}

/// Daily hit counts, oldest first
async fn list_visits(State(state): State<Arc<AppState>>) -> Json<Vec<Record>> {
    Json(state.hits.list())
}

// ============================================================================
// UPLOAD HANDLER
// ============================================================================

/// Accept one multipart file under the `image` field
async fn upload_file(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Invalid multipart body: {}", e)))?
    {
        if field.name() != Some("image") {
            continue;
        }

        let original_name = field.file_name().unwrap_or_default().to_string();
        let data = field
            .bytes()
            .await
            .map_err(|e| ApiError::BadRequest(format!("Failed to read upload: {}", e)))?;

        // Image decoding and WebP encoding are CPU-bound
        let uploads = state.uploads.clone();
        let file_name = tokio::task::spawn_blocking(move || uploads.save(&original_name, &data))
            .await
            .map_err(|e| ApiError::Internal(format!("Upload task failed: {}", e)))??;

        return Ok(Json(UploadResponse {
            url: format!("/uploads/{}", file_name),
        }));
    }

    Err(UploadError::MissingFile.into())
}

// ============================================================================
// AUTH HANDLERS
// ============================================================================

/// Verify the admin credential pair and mint a session token
async fn login(
    State(state): State<Arc<AppState>>,
    body: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<LoginResponse>, ApiError> {
    let Json(request) =
        body.map_err(|e| ApiError::BadRequest(format!("Invalid JSON input: {}", e)))?;

    let token = state.auth.login(&request.username, &request.password)?;
    Ok(Json(LoginResponse {
        success: true,
        token,
    }))
}

/// Report the session behind the bearer token
async fn session_info(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<SessionResponse>, ApiError> {
    let token = bearer_token(&headers)
        .ok_or_else(|| ApiError::Unauthorized("Missing bearer token".to_string()))?;

    let session = state.auth.session(token)?;
    Ok(Json(SessionResponse {
        success: true,
        username: session.username,
        created_at: session.created_at,
    }))
}

/// Drop the session behind the bearer token, if any
async fn logout(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Json<OkResponse> {
    if let Some(token) = bearer_token(&headers) {
        state.auth.logout(token);
    }
    OkResponse::ok()
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}

// ============================================================================
// ANALYTICS HANDLER
// ============================================================================

/// Proxy the 30-day GA4 report, or a mock payload when unconfigured
async fn analytics_report(State(state): State<Arc<AppState>>) -> Result<Json<Value>, ApiError> {
    if !state.analytics.is_configured() {
        return Ok(Json(AnalyticsService::mock_report()));
    }

    match state.analytics.fetch_report().await {
        Ok(report) => Ok(Json(report)),
        Err(e) => {
            error!("Analytics report failed: {}", e);
            Err(e.into())
        }
    }
}

// ============================================================================
// FALLBACKS
// ============================================================================

/// 405 for known paths hit with an unsupported method
async fn method_not_allowed() -> ApiError {
    ApiError::MethodNotAllowed
}

/// JSON 404 for everything unmatched
async fn not_found() -> ApiError {
    ApiError::NotFound
}

// ============================================================================
// ROUTER
// ============================================================================

/// Build the HTTP surface over the shared state
fn build_router(state: Arc<AppState>, config: &Config) -> Router {
    // The admin frontend sends credentialed requests, so the browser's origin
    // and requested headers are mirrored back instead of wildcarded
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::mirror_request())
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers(AllowHeaders::mirror_request())
        .max_age(Duration::from_secs(86400));

    Router::new()
        // Visit metrics
        .route(
            "/api/metrics",
            get(list_visits)
                .post(record_visit)
                .fallback(method_not_allowed),
        )
        // Image uploads
        .route("/api/upload", post(upload_file).fallback(method_not_allowed))
        // Admin sessions
        .route("/api/login", post(login).fallback(method_not_allowed))
        .route("/api/logout", post(logout).fallback(method_not_allowed))
        .route("/api/session", get(session_info).fallback(method_not_allowed))
        // Analytics proxy
        .route(
            "/api/analytics",
            get(analytics_report).fallback(method_not_allowed),
        )
        // Content collections
        .route(
            "/api/:collection",
            get(list_records)
                .post(upsert_record)
                .delete(delete_record)
                .fallback(method_not_allowed),
        )
        .route(
            "/api/:collection/:id",
            delete(delete_record_by_path).fallback(method_not_allowed),
        )
        // Stored uploads, with the JSON 404 kept for misses
        .nest_service(
            "/uploads",
            ServeDir::new(&config.upload_dir).not_found_service(not_found.into_service()),
        )
        .fallback(not_found)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(DefaultBodyLimit::max(BODY_LIMIT_BYTES))
}

// ============================================================================
// MAIN ENTRY POINT
// ============================================================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "portfolio_server=info,tower_http=info".into()),
        )
        .init();

    // Load environment variables
    dotenvy::dotenv().ok();

    let config = Config::load();

    info!("Data directory: {}", config.data_dir.display());
    info!("Upload directory: {}", config.upload_dir.display());

    // Create application state
    let state = Arc::new(AppState::new(&config));
    let app = build_router(state, &config);

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));

    info!("🚀 Portfolio server v{} starting", env!("CARGO_PKG_VERSION"));
    info!("   Listening on: http://{}", addr);
    info!("   API root: http://{}/api", addr);
    info!("   Uploads: http://{}/uploads", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    Ok(())
}

/// Resolve on Ctrl+C or SIGTERM so in-flight writes can finish
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
    }
}

// ============================================================================
// TESTS
// ============================================================================
