use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tower_http::cors::CorsLayer;

use crate::credentials::{AuthError, CredentialProvider};
use crate::ingest::session::{RequestError, SessionReport, SessionRequest, SessionStatus};
use crate::ingest::types::ClassifiedPost;
use crate::ingest::Pipeline;
use crate::store::StoreError;
use crate::summary::{summarize, CollectionSummary, DEFAULT_TOP_POSTS};

#[derive(Clone)]
pub struct AppState {
    pipeline: Pipeline,
    credentials: Arc<dyn CredentialProvider>,
    sessions: Arc<SessionRegistry>,
}

impl AppState {
    pub fn new(pipeline: Pipeline, credentials: Arc<dyn CredentialProvider>) -> Self {
        Self {
            pipeline,
            credentials,
            sessions: Arc::new(SessionRegistry::default()),
        }
    }
}

struct SessionEntry {
    status: watch::Receiver<SessionStatus>,
    report: Option<SessionReport>,
}

/// Sessions started through the API. At most one runs at a time.
#[derive(Default)]
pub struct SessionRegistry {
    inner: Mutex<RegistryInner>,
}

#[derive(Default)]
struct RegistryInner {
    next_id: u64,
    active: Option<u64>,
    entries: HashMap<u64, SessionEntry>,
}

impl SessionRegistry {
    /// Reserve the single capture slot.
    fn reserve(&self) -> Result<u64, ApiError> {
        let mut g = self.inner.lock().map_err(|_| ApiError::internal("registry poisoned"))?;
        if let Some(id) = g.active {
            return Err(ApiError::new(
                StatusCode::CONFLICT,
                format!("session {id} is still running"),
            ));
        }
        g.next_id += 1;
        let id = g.next_id;
        g.active = Some(id);
        Ok(id)
    }

    fn release(&self, id: u64) {
        if let Ok(mut g) = self.inner.lock() {
            if g.active == Some(id) {
                g.active = None;
            }
        }
    }

    fn register(&self, id: u64, status: watch::Receiver<SessionStatus>) {
        if let Ok(mut g) = self.inner.lock() {
            g.entries.insert(
                id,
                SessionEntry {
                    status,
                    report: None,
                },
            );
        }
    }

    fn finish(&self, id: u64, report: Option<SessionReport>) {
        if let Ok(mut g) = self.inner.lock() {
            if let Some(e) = g.entries.get_mut(&id) {
                e.report = report;
            }
            if g.active == Some(id) {
                g.active = None;
            }
        }
    }

    fn view(&self, id: u64) -> Option<SessionView> {
        let g = self.inner.lock().ok()?;
        let e = g.entries.get(&id)?;
        let status = e.status.borrow().clone();
        let report = e.report.clone();
        Some(SessionView {
            id,
            status,
            report,
        })
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/collections", get(list_collections))
        .route("/collections/{name}", get(collection_records))
        .route("/collections/{name}/summary", get(collection_summary))
        .route("/sessions", post(start_session))
        .route("/sessions/{id}", get(session_status))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        #[derive(Serialize)]
        struct Body {
            error: String,
        }
        (self.status, Json(Body { error: self.message })).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        let status = match e {
            StoreError::InvalidCollection(_) => StatusCode::BAD_REQUEST,
            StoreError::NotFound(_) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self::new(status, e.to_string())
    }
}

impl From<RequestError> for ApiError {
    fn from(e: RequestError) -> Self {
        match e {
            RequestError::Store(se) => se.into(),
            RequestError::CollectionExists(_) => Self::new(StatusCode::CONFLICT, e.to_string()),
            _ => Self::new(StatusCode::BAD_REQUEST, e.to_string()),
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(e: AuthError) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, e.to_string())
    }
}

async fn list_collections(State(state): State<AppState>) -> Result<Json<Vec<String>>, ApiError> {
    let names = state.pipeline.store().list_collections().await?;
    Ok(Json(names.into_iter().collect()))
}

async fn collection_records(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<Vec<ClassifiedPost>>, ApiError> {
    Ok(Json(state.pipeline.store().query(&name).await?))
}

#[derive(Deserialize)]
struct SummaryQuery {
    top: Option<usize>,
}

async fn collection_summary(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Query(q): Query<SummaryQuery>,
) -> Result<Json<CollectionSummary>, ApiError> {
    let records = state.pipeline.store().query(&name).await?;
    let top = q.top.unwrap_or(DEFAULT_TOP_POSTS).min(100);
    Ok(Json(summarize(&name, &records, top)))
}

#[derive(Serialize)]
struct Started {
    id: u64,
}

async fn start_session(
    State(state): State<AppState>,
    Json(req): Json<SessionRequest>,
) -> Result<(StatusCode, Json<Started>), ApiError> {
    let registry = state.sessions.clone();
    let id = registry.reserve()?;

    let admitted = req.admit(state.pipeline.store().as_ref()).await;
    let session = match admitted {
        Ok(s) => s,
        Err(e) => {
            registry.release(id);
            return Err(e.into());
        }
    };

    let handle = match state.pipeline.start(state.credentials.as_ref(), session) {
        Ok(h) => h,
        Err(e) => {
            tracing::warn!(target: "stream", error = %e, "session refused: authentication failed");
            registry.release(id);
            return Err(e.into());
        }
    };

    registry.register(id, handle.status.clone());
    let done = registry.clone();
    tokio::spawn(async move {
        let report = match handle.wait().await {
            Ok(r) => Some(r),
            Err(e) => {
                tracing::warn!(target: "stream", error = %e, "session task failed");
                None
            }
        };
        done.finish(id, report);
    });

    Ok((StatusCode::ACCEPTED, Json(Started { id })))
}

#[derive(Serialize)]
struct SessionView {
    id: u64,
    status: SessionStatus,
    report: Option<SessionReport>,
}

async fn session_status(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> Result<Json<SessionView>, ApiError> {
    state
        .sessions
        .view(id)
        .map(Json)
        .ok_or_else(|| ApiError::new(StatusCode::NOT_FOUND, format!("unknown session {id}")))
}
