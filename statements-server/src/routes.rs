//! HTTP surface.

use axum::extract::{DefaultBodyLimit, Multipart, Path, Query, Request, State};
use axum::http::header;
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{Datelike, Utc};
use serde::Deserialize;
use serde_json::{Value, json};
use statements_core::{
    Account, FileKind, MAX_UPLOAD_BYTES, MonthKey, account, supported_formats, validate_registry,
};
use statements_store::{DocumentStore, TrackingLedger};
use std::sync::Arc;

use crate::config::ServerConfig;
use crate::coordinator::ParseCoordinator;
use crate::error::{ApiError, ApiResult};
use crate::inventory::InventoryManager;
use crate::loader::DataLoader;
use crate::parser::StatementParser;
use crate::scanner::InventoryScanner;
use crate::sessions::SessionRegistry;
use crate::upload::{UploadHandler, validate_filename};

pub struct AppState {
    pub config: ServerConfig,
    pub store: Arc<dyn DocumentStore>,
    pub inventory: Arc<InventoryManager>,
    pub loader: DataLoader,
    pub uploads: UploadHandler,
    pub coordinator: Arc<ParseCoordinator>,
    pub sessions: Arc<SessionRegistry>,
}

impl AppState {
    pub fn new(
        config: ServerConfig,
        store: Arc<dyn DocumentStore>,
        parser: Arc<dyn StatementParser>,
    ) -> Arc<Self> {
        let inventory = Arc::new(InventoryManager::new(Arc::clone(&store)));
        let sessions = Arc::new(SessionRegistry::new(
            config.session_ttl_secs,
            config.batch_session_ttl_secs,
        ));
        let scanner = InventoryScanner::new(Arc::clone(&store), Arc::clone(&inventory));
        let tracking = Arc::new(TrackingLedger::new(Arc::clone(&store)));
        let coordinator = Arc::new(ParseCoordinator::new(
            Arc::clone(&store),
            Arc::clone(&parser),
            scanner.clone(),
            Arc::clone(&sessions),
            Arc::clone(&tracking),
        ));
        Arc::new(Self {
            loader: DataLoader::new(Arc::clone(&inventory)),
            uploads: UploadHandler::new(
                Arc::clone(&store),
                parser,
                Arc::clone(&inventory),
                scanner,
                tracking,
            ),
            config,
            store,
            inventory,
            coordinator,
            sessions,
        })
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    let protected = Router::new()
        .route("/api/statements/upload", post(upload))
        .route("/api/statements/upload/validate", post(validate_upload_name))
        .route("/api/statements/upload/formats", get(upload_formats))
        .route("/api/statements/parse/{account_id}", post(parse_account))
        .route("/api/statements/parse-all", post(parse_all))
        .route("/api/statements/parse-progress/{session_id}", get(session_progress))
        .route("/api/statements/refresh-inventory/{account_id}", post(refresh_inventory))
        .route("/api/statements/refresh-all-inventories", post(refresh_all))
        .route("/api/statements/inventory-progress/{session_id}", get(session_progress))
        .route("/api/statements/inventory/clear-cache", post(clear_cache))
        .route("/api/statements/load-account-data/{account_id}", get(load_account_data))
        .route("/api/statements/ui-data/{year}", get(ui_data))
        .route("/api/statements/data/{year}", get(year_data))
        .route("/api/statements/config", get(config))
        .route("/statements/download/{account_id}/{month}/{file_type}", get(download))
        .route(
            "/api/statements/download-file/{account_id}/{month}/{file_type}",
            get(download),
        )
        .route_layer(middleware::from_fn_with_state(Arc::clone(&state), require_token));

    Router::new()
        .merge(protected)
        .route("/api/statements/health", get(health))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES as usize * 10))
        .with_state(state)
}

async fn require_token(
    State(state): State<Arc<AppState>>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if let Some(expected) = state.config.api_token.as_deref() {
        let presented = req
            .headers()
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "));
        if presented != Some(expected) {
            return Err(ApiError::Unauthorized);
        }
    }
    Ok(next.run(req).await)
}

fn known_account(id: &str) -> ApiResult<&'static Account> {
    account::by_id(id).ok_or_else(|| ApiError::BadRequest("Invalid account ID".to_string()))
}

#[derive(Debug, Deserialize)]
struct YearQuery {
    year: Option<i32>,
}

#[derive(Debug, Deserialize)]
struct DownloadQuery {
    year: i32,
}

#[derive(Debug, Deserialize)]
struct ValidateBody {
    filename: String,
}

async fn upload(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> ApiResult<Json<Value>> {
    let mut files = Vec::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Invalid upload: {e}")))?
    {
        if field.name() != Some("files") {
            continue;
        }
        let name = field.file_name().unwrap_or_default().to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::BadRequest(format!("Failed to read {name}: {e}")))?;
        files.push((name, bytes.to_vec()));
    }
    if files.is_empty() {
        return Err(ApiError::BadRequest("No files provided".to_string()));
    }

    tracing::info!(count = files.len(), "upload received");
    let response = state.uploads.process_all(files).await;
    Ok(Json(json!(response)))
}

async fn validate_upload_name(Json(body): Json<ValidateBody>) -> Json<Value> {
    Json(json!({ "success": true, "validation": validate_filename(&body.filename) }))
}

async fn upload_formats() -> Json<Value> {
    Json(json!({
        "success": true,
        "formats": supported_formats(),
        "max_file_size": MAX_UPLOAD_BYTES,
    }))
}

async fn parse_account(
    State(state): State<Arc<AppState>>,
    Path(account_id): Path<String>,
) -> ApiResult<Json<Value>> {
    let account = known_account(&account_id)?;
    let session_id = state.coordinator.start_parse(account).await;
    Ok(Json(json!({
        "success": true,
        "session_id": session_id,
        "message": format!("Parsing started for {}", account.name),
    })))
}

async fn parse_all(State(state): State<Arc<AppState>>) -> Json<Value> {
    let session_id = state.coordinator.start_parse_all().await;
    Json(json!({
        "success": true,
        "session_id": session_id,
        "message": "Batch parsing started for all accounts",
    }))
}

async fn session_progress(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> ApiResult<Json<Value>> {
    let progress = state
        .sessions
        .get(&session_id)
        .await
        .ok_or_else(|| ApiError::NotFound("Invalid session ID".to_string()))?;
    Ok(Json(json!({ "success": true, "progress": progress })))
}

async fn refresh_inventory(
    State(state): State<Arc<AppState>>,
    Path(account_id): Path<String>,
) -> ApiResult<Json<Value>> {
    let account = known_account(&account_id)?;
    let session_id = state.coordinator.start_refresh(account).await;
    Ok(Json(json!({ "success": true, "session_id": session_id })))
}

async fn refresh_all(State(state): State<Arc<AppState>>) -> Json<Value> {
    let session_id = state.coordinator.start_refresh_all().await;
    Json(json!({ "success": true, "session_id": session_id }))
}

async fn clear_cache(State(state): State<Arc<AppState>>) -> Json<Value> {
    state.inventory.clear_cache().await;
    Json(json!({ "success": true, "message": "Inventory cache cleared" }))
}

async fn load_account_data(
    State(state): State<Arc<AppState>>,
    Path(account_id): Path<String>,
    Query(q): Query<YearQuery>,
) -> ApiResult<Json<Value>> {
    let account = known_account(&account_id)?;
    let year = q.year.unwrap_or_else(|| Utc::now().year());
    let data = state.loader.account_data(account, year).await;
    Ok(Json(json!({ "success": true, "account_data": data })))
}

async fn ui_data(State(state): State<Arc<AppState>>, Path(year): Path<i32>) -> Json<Value> {
    let data = state.loader.ui_data(year).await;
    Json(json!({ "success": true, "ui_data": data, "year": year }))
}

async fn year_data(State(state): State<Arc<AppState>>, Path(year): Path<i32>) -> Json<Value> {
    let data = state.loader.year_data(year).await;
    Json(json!({ "success": true, "data": data }))
}

async fn config() -> Json<Value> {
    Json(json!({
        "success": true,
        "accounts": account::all(),
        "formats": supported_formats(),
        "max_file_size": MAX_UPLOAD_BYTES,
        "registry": validate_registry(),
    }))
}

async fn health(State(state): State<Arc<AppState>>) -> Json<Value> {
    let registry = validate_registry();
    Json(json!({
        "success": true,
        "status": if registry.is_ok() { "healthy" } else { "degraded" },
        "accounts": account::all().len(),
        "registry": registry,
        "inventory_cached": state.inventory.is_cached().await,
        "active_sessions": state.sessions.count().await,
    }))
}

async fn download(
    State(state): State<Arc<AppState>>,
    Path((account_id, month, file_type)): Path<(String, u32, String)>,
    Query(q): Query<DownloadQuery>,
) -> ApiResult<Response> {
    let account = known_account(&account_id)?;
    let kind = match file_type.as_str() {
        "pdf" => FileKind::Pdf,
        "xlsx" => FileKind::Xlsx,
        other => return Err(ApiError::BadRequest(format!("Invalid file type: {other}"))),
    };
    let key = MonthKey::new(q.year, month)
        .map_err(|_| ApiError::BadRequest(format!("Invalid month: {month}")))?;

    let not_found = || {
        ApiError::NotFound(format!("No {} file for {} {}", kind.extension(), account.name, key))
    };
    let inventory = state.inventory.load().await?.ok_or_else(not_found)?;
    let file_id = inventory
        .accounts
        .get(account.id)
        .and_then(|months| months.get(&key))
        .and_then(|record| record.file(kind))
        .and_then(|info| info.file_id.clone())
        .ok_or_else(not_found)?;

    // The xlsx slot also holds .xls spreadsheets; serve what is stored.
    let stored = FileKind::from_filename(&file_id).unwrap_or(kind);
    let bytes = state.store.read(&file_id).await?;
    let filename = format!("{}_{}_{}.{}", account.id, key.year(), key.abbr(), stored.extension());
    tracing::info!(account = account.id, %filename, "download");
    Ok((
        [
            (header::CONTENT_TYPE, stored.content_type().to_string()),
            (header::CONTENT_DISPOSITION, format!("attachment; filename=\"{filename}\"")),
        ],
        bytes,
    )
        .into_response())
}
