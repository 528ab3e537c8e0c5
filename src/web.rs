use crate::entry::{WordEntry, batch_from_value};
use crate::ranking::{SearchConfig, SearchHit, SearchStrategy};
use crate::repository::WordRepository;
use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::compression::CompressionLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::{info, warn};

type SharedState = Arc<AppState>;
pub const ADMIN_KEY_HEADER: &str = "x-admin-key";
const MAX_LIMIT: usize = 100;

pub struct AppState {
    pub repository: Arc<dyn WordRepository>,
    pub search: SearchConfig,
    pub admin_key: Option<String>,
}

#[derive(Clone)]
pub struct WebConfig {
    pub addr: SocketAddr,
    pub admin_key: Option<String>,
    pub search: SearchConfig,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([127, 0, 0, 1], 8080)),
            admin_key: None,
            search: SearchConfig::default(),
        }
    }
}

#[derive(Debug, Error)]
pub enum WebError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub async fn serve(
    config: WebConfig,
    repository: Arc<dyn WordRepository>,
) -> Result<(), WebError> {
    if config.admin_key.is_none() {
        warn!("no admin key configured; POST /api/words will reject every request");
    }
    let state = Arc::new(AppState {
        repository,
        search: config.search,
        admin_key: config.admin_key.clone(),
    });
    let router = build_router(state);
    info!(
        %config.addr,
        mode = %config.search.strategy,
        limit = config.search.limit,
        "Binding HTTP listener"
    );
    let listener = TcpListener::bind(config.addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("HTTP server exited");
    Ok(())
}

#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: message.into(),
        }
    }

    fn unauthorized() -> Self {
        Self {
            status: StatusCode::UNAUTHORIZED,
            message: "Unauthorized".to_string(),
        }
    }

    fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
        }
    }
}

impl From<crate::Error> for ApiError {
    fn from(err: crate::Error) -> Self {
        match err {
            crate::Error::Validation(message) => ApiError::bad_request(message),
            crate::Error::NotFound(message) => ApiError::not_found(message),
            other => {
                warn!(error = %other, code = other.code(), "repository call failed");
                ApiError::internal(other.to_string())
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let payload = json!({ "error": self.message });
        (self.status, Json(payload)).into_response()
    }
}

fn build_router(state: SharedState) -> Router {
    Router::new()
        .route("/healthz", get(health))
        .route("/api/search", get(api_search))
        .route("/api/suggest", get(api_suggest))
        .route("/api/words", get(api_all).post(api_create))
        .route("/api/words/recent", get(api_recent))
        .route("/api/words/lookup", get(api_lookup))
        .route("/api/words/:id", get(api_word))
        .with_state(state)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().include_headers(false))
                .on_response(DefaultOnResponse::new()),
        )
        .layer(CompressionLayer::new())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = signal::ctrl_c().await;
    };
    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        if let Ok(mut stream) = signal(SignalKind::terminate()) {
            let _ = stream.recv().await;
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// Runs a blocking repository call off the async workers.
async fn with_repository<T, F>(state: &SharedState, call: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce(&dyn WordRepository) -> crate::Result<T> + Send + 'static,
{
    let repository = Arc::clone(&state.repository);
    tokio::task::spawn_blocking(move || call(repository.as_ref()))
        .await
        .map_err(|err| ApiError::internal(format!("repository task failed: {err}")))?
        .map_err(ApiError::from)
}

async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok", "service": "wordbook-web" }))
}

async fn api_search(
    State(state): State<SharedState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<SearchResponsePayload>, ApiError> {
    let (query, config) = parse_search_params(&params, &state.search)?;
    let hits = if query.is_empty() {
        Vec::new()
    } else {
        let needle = query.clone();
        with_repository(&state, move |repo| repo.search(&needle, &config)).await?
    };
    Ok(Json(SearchResponsePayload::new(query, config, hits)))
}

async fn api_suggest(
    State(state): State<SharedState>,
    Query(params): Query<SuggestParams>,
) -> Result<Json<SuggestResponsePayload>, ApiError> {
    let query = params.q.unwrap_or_default().trim().to_string();
    let results = if query.is_empty() {
        Vec::new()
    } else {
        let needle = query.clone();
        let config = state.search;
        with_repository(&state, move |repo| repo.search(&needle, &config))
            .await?
            .into_iter()
            .map(|hit| hit.entry)
            .collect()
    };
    Ok(Json(SuggestResponsePayload {
        seq: params.seq,
        query,
        results,
    }))
}

async fn api_all(State(state): State<SharedState>) -> Result<Json<Vec<WordEntry>>, ApiError> {
    let entries = with_repository(&state, |repo| repo.list_all()).await?;
    Ok(Json(entries))
}

async fn api_recent(
    State(state): State<SharedState>,
    Query(params): Query<RecentParams>,
) -> Result<Json<Vec<WordEntry>>, ApiError> {
    let limit = params
        .limit
        .unwrap_or(crate::DEFAULT_LIMIT)
        .clamp(1, MAX_LIMIT);
    let entries = with_repository(&state, move |repo| repo.list_recent(limit)).await?;
    Ok(Json(entries))
}

async fn api_lookup(
    State(state): State<SharedState>,
    Query(params): Query<LookupParams>,
) -> Result<Json<Vec<WordEntry>>, ApiError> {
    let ids: Vec<String> = params
        .ids
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .collect();
    if ids.is_empty() {
        return Ok(Json(Vec::new()));
    }
    let entries = with_repository(&state, move |repo| repo.get_by_ids(&ids)).await?;
    Ok(Json(entries))
}

async fn api_word(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<WordEntry>, ApiError> {
    let lookup = id.clone();
    with_repository(&state, move |repo| repo.get(&lookup))
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("No entry found for id {id:?}")))
}

async fn api_create(
    State(state): State<SharedState>,
    headers: HeaderMap,
    body: String,
) -> Result<Json<CreateResponsePayload>, ApiError> {
    if !admin_key_matches(state.admin_key.as_deref(), &headers) {
        warn!("rejected write with missing or invalid admin key");
        return Err(ApiError::unauthorized());
    }
    let value: serde_json::Value = serde_json::from_str(&body)
        .map_err(|err| ApiError::bad_request(format!("invalid JSON: {err}")))?;
    let entries = batch_from_value(value).map_err(ApiError::from)?;
    let submitted = entries.len();
    let outcome = with_repository(&state, move |repo| repo.create(&entries))
        .await
        .map_err(|err| {
            if err.status.is_server_error() {
                ApiError::internal("Failed to add words")
            } else {
                err
            }
        })?;
    info!(submitted, inserted = outcome.inserted, "added words");
    Ok(Json(CreateResponsePayload {
        inserted: outcome.inserted,
    }))
}

fn admin_key_matches(expected: Option<&str>, headers: &HeaderMap) -> bool {
    let Some(expected) = expected.filter(|key| !key.is_empty()) else {
        return false;
    };
    headers
        .get(ADMIN_KEY_HEADER)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|provided| constant_time_eq(provided, expected))
}

fn constant_time_eq(a: &str, b: &str) -> bool {
    let diff = a
        .bytes()
        .zip(b.bytes())
        .fold(0u8, |acc, (x, y)| acc | (x ^ y));
    diff == 0 && a.len() == b.len()
}

fn parse_search_params(
    params: &SearchParams,
    defaults: &SearchConfig,
) -> Result<(String, SearchConfig), ApiError> {
    let query = params
        .q
        .as_deref()
        .map(str::trim)
        .unwrap_or_default()
        .to_string();
    let strategy = match params.mode.as_deref().map(str::trim) {
        None | Some("") => defaults.strategy,
        Some(raw) => raw.parse::<SearchStrategy>()?,
    };
    let config = SearchConfig {
        strategy,
        limit: params.limit.unwrap_or(defaults.limit).clamp(1, MAX_LIMIT),
    };
    Ok((query, config))
}

#[derive(Debug, Deserialize)]
struct SearchParams {
    q: Option<String>,
    limit: Option<usize>,
    mode: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SuggestParams {
    q: Option<String>,
    seq: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct RecentParams {
    limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct LookupParams {
    ids: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SearchHitPayload {
    #[serde(flatten)]
    entry: WordEntry,
    #[serde(skip_serializing_if = "Option::is_none")]
    score: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SearchResponsePayload {
    query: String,
    mode: SearchStrategy,
    limit: usize,
    results: Vec<SearchHitPayload>,
}

impl SearchResponsePayload {
    fn new(query: String, config: SearchConfig, hits: Vec<SearchHit>) -> Self {
        Self {
            query,
            mode: config.strategy,
            limit: config.limit,
            results: hits
                .into_iter()
                .map(|hit| SearchHitPayload {
                    entry: hit.entry,
                    score: hit.score,
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SuggestResponsePayload {
    seq: Option<u64>,
    query: String,
    results: Vec<WordEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CreateResponsePayload {
    inserted: usize,
}
