use std::sync::Arc;

use axum::extract::{Path, Query, Request, State};
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::{get, post};
use axum::{Extension, Json, Router};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use syncreads_core::article::{clear_url, ArticleRenderer};
use syncreads_core::models::{
    LogLine, OutcomeStatus, SyncId, SyncJob, SyncOutcome, SyncSettings, SyncStatus, SyncTrigger,
    User,
};
use syncreads_core::remote::DeviceConnector;
use syncreads_core::services::DatabaseService;
use syncreads_core::sync::SyncRunner;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::auth::{extract_api_key, AuthenticatedUser};
use crate::config::ApiConfig;
use crate::error::AppError;
use crate::rate_limit::{RateLimitMetricsSnapshot, SyncRateLimiter};

pub type ApiRunner = SyncRunner<Arc<dyn DeviceConnector>, Arc<dyn ArticleRenderer>>;

const DEFAULT_LIST_LIMIT: usize = 10;
const MAX_LIST_LIMIT: usize = 100;
const MAX_BATCH_URLS: usize = 50;

#[derive(Clone)]
pub struct AppState {
    db: DatabaseService,
    runner: Arc<ApiRunner>,
    sync_rate_limiter: Arc<SyncRateLimiter>,
    shutdown: CancellationToken,
}

impl AppState {
    pub fn new(
        config: &ApiConfig,
        db: DatabaseService,
        runner: ApiRunner,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            sync_rate_limiter: Arc::new(SyncRateLimiter::from_config(config)),
            runner: Arc::new(runner),
            db,
            shutdown,
        }
    }
}

pub fn app_router(state: AppState) -> Router {
    let protected_routes = Router::new()
        .route("/sync/article", post(sync_article))
        .route("/sync/articles", post(sync_articles))
        .route("/sync/{id}", get(get_sync))
        .route("/sync/{id}/log", get(get_sync_log))
        .route("/syncs", get(list_syncs))
        .route(
            "/user/sync-options",
            get(get_sync_options).put(put_sync_options),
        )
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth));

    Router::new()
        .route("/healthz", get(healthz))
        .nest("/api", protected_routes)
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_headers(Any)
                .allow_methods(Any),
        )
        .with_state(state)
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    timestamp: i64,
    rate_limit: RateLimitMetricsSnapshot,
}

async fn healthz(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        timestamp: Utc::now().timestamp(),
        rate_limit: state.sync_rate_limiter.metrics_snapshot(),
    })
}

async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let key = extract_api_key(request.headers())?;
    let user = state
        .db
        .get_user_by_api_key(key)
        .await?
        .ok_or_else(|| AppError::unauthorized("Invalid API key"))?;
    request.extensions_mut().insert(AuthenticatedUser(user));
    Ok(next.run(request).await)
}

#[derive(Debug, Deserialize)]
struct SyncArticleRequest {
    url: String,
    #[serde(default)]
    folder: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SyncArticleResponse {
    status: OutcomeStatus,
    message: String,
    url: String,
    sync_id: SyncId,
}

async fn sync_article(
    State(state): State<AppState>,
    Extension(AuthenticatedUser(user)): Extension<AuthenticatedUser>,
    Json(request): Json<SyncArticleRequest>,
) -> Result<Json<SyncArticleResponse>, AppError> {
    let url = clear_url(&request.url).map_err(|err| AppError::bad_request(err.to_string()))?;
    let settings = SyncSettings {
        folder: request.folder,
    };
    admit_sync(&state, &user, &settings).await?;

    // The job runs detached so a dropped connection cannot strand it in PENDING.
    let runner = state.runner.clone();
    let cancel = state.shutdown.child_token();
    let user_id = user.id;
    let handle = tokio::spawn(async move {
        runner
            .sync_article_with(&user_id, &url, SyncTrigger::Manual, &settings, cancel)
            .await
    });
    let report = handle
        .await
        .map_err(|err| AppError::internal(format!("sync task failed: {err}")))??;

    tracing::info!(
        endpoint = "sync_article",
        user = %user.id,
        sync = %report.job.id,
        status = report.job.status.as_str(),
        "Finished article sync"
    );
    Ok(Json(SyncArticleResponse {
        status: report.outcome.status,
        message: report.outcome.message,
        url: report.outcome.url,
        sync_id: report.job.id,
    }))
}

/// Reject requests that cannot start a job before they count against the limit
async fn admit_sync(
    state: &AppState,
    user: &User,
    settings: &SyncSettings,
) -> Result<(), AppError> {
    if let Some(problem) = settings.problem() {
        return Err(AppError::bad_request(problem));
    }
    if state.db.get_device(&user.id).await?.is_none() {
        return Err(AppError::not_found("Device not found, register it first!"));
    }
    state.sync_rate_limiter.check(&user.id).await
}

#[derive(Debug, Deserialize)]
struct SyncArticlesRequest {
    urls: Vec<String>,
    #[serde(default)]
    folder: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SyncArticlesResponse {
    sync_id: SyncId,
    status: SyncStatus,
    synced_articles_count: u32,
    results: Vec<SyncOutcome>,
}

async fn sync_articles(
    State(state): State<AppState>,
    Extension(AuthenticatedUser(user)): Extension<AuthenticatedUser>,
    Json(request): Json<SyncArticlesRequest>,
) -> Result<Json<SyncArticlesResponse>, AppError> {
    if request.urls.is_empty() {
        return Err(AppError::bad_request("at least one url is required"));
    }
    if request.urls.len() > MAX_BATCH_URLS {
        return Err(AppError::bad_request(format!(
            "at most {MAX_BATCH_URLS} urls can be synced at once"
        )));
    }
    let urls = request
        .urls
        .iter()
        .map(|url| clear_url(url).map_err(|err| AppError::bad_request(format!("{url}: {err}"))))
        .collect::<Result<Vec<_>, _>>()?;
    let settings = SyncSettings {
        folder: request.folder,
    };
    admit_sync(&state, &user, &settings).await?;

    let runner = state.runner.clone();
    let cancel = state.shutdown.child_token();
    let user_id = user.id;
    let handle = tokio::spawn(async move {
        runner
            .sync_articles(&user_id, &urls, SyncTrigger::Manual, &settings, cancel)
            .await
    });
    let report = handle
        .await
        .map_err(|err| AppError::internal(format!("sync task failed: {err}")))??;

    tracing::info!(
        endpoint = "sync_articles",
        user = %user.id,
        sync = %report.job.id,
        status = report.job.status.as_str(),
        synced = report.job.synced_articles_count,
        "Finished batch sync"
    );
    Ok(Json(SyncArticlesResponse {
        sync_id: report.job.id,
        status: report.job.status,
        synced_articles_count: report.job.synced_articles_count,
        results: report.outcomes,
    }))
}

async fn get_sync_options(
    State(state): State<AppState>,
    Extension(AuthenticatedUser(user)): Extension<AuthenticatedUser>,
) -> Result<Json<SyncSettings>, AppError> {
    Ok(Json(state.db.get_sync_settings(&user.id).await?))
}

async fn put_sync_options(
    State(state): State<AppState>,
    Extension(AuthenticatedUser(user)): Extension<AuthenticatedUser>,
    Json(settings): Json<SyncSettings>,
) -> Result<Json<SyncSettings>, AppError> {
    let stored = state.db.put_sync_settings(&user.id, &settings).await?;
    tracing::info!(endpoint = "put_sync_options", user = %user.id, "Updated sync options");
    Ok(Json(stored))
}

async fn owned_sync(
    state: &AppState,
    user: &AuthenticatedUser,
    raw_id: &str,
) -> Result<SyncJob, AppError> {
    let not_found = || AppError::not_found("Sync not found!");
    let id: SyncId = raw_id.parse().map_err(|_| not_found())?;
    match state.db.get_sync(&id).await? {
        Some(job) if job.user_id == user.0.id => Ok(job),
        _ => Err(not_found()),
    }
}

async fn get_sync(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(id): Path<String>,
) -> Result<Json<SyncJob>, AppError> {
    Ok(Json(owned_sync(&state, &user, &id).await?))
}

async fn get_sync_log(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(id): Path<String>,
) -> Result<Json<Vec<LogLine>>, AppError> {
    let job = owned_sync(&state, &user, &id).await?;
    Ok(Json(state.db.list_sync_log(&job.id).await?))
}

#[derive(Debug, Deserialize)]
struct ListSyncsQuery {
    limit: Option<usize>,
}

async fn list_syncs(
    State(state): State<AppState>,
    Extension(AuthenticatedUser(user)): Extension<AuthenticatedUser>,
    Query(query): Query<ListSyncsQuery>,
) -> Result<Json<Vec<SyncJob>>, AppError> {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_LIST_LIMIT)
        .clamp(1, MAX_LIST_LIMIT);
    Ok(Json(state.db.list_syncs(&user.id, limit).await?))
}
