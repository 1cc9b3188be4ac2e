use anyhow::Context;
use axum::extract::rejection::JsonRejection;
use axum::extract::{DefaultBodyLimit, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Map, Value};
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::error::PipelineError;
use crate::handlers::{analyze, guide, shots};
use crate::models::{
    AnalysisResult, AnalyzeShotRequest, GenerateGuideRequest, GuideResult, ShotsQuery,
    TmdbShotsResponse,
};
use crate::state::AppState;

/// Uploads arrive as base64 data URLs inside the JSON body.
pub const MAX_BODY_BYTES: usize = 50 * 1024 * 1024;

const ANALYZE_SUMMARY: &str = "Failed to analyze image";
const GUIDE_SUMMARY: &str = "Failed to generate guide";
const SHOTS_SUMMARY: &str = "Failed to fetch movie shots";

/// A pipeline failure bound to the route that produced it.
#[derive(Debug)]
pub struct ApiError {
    summary: &'static str,
    // 400 when the caller supplies the credential, 500 when the server should have.
    credential_status: StatusCode,
    error: PipelineError,
}

impl ApiError {
    fn analyze(error: PipelineError) -> Self {
        Self {
            summary: ANALYZE_SUMMARY,
            credential_status: StatusCode::INTERNAL_SERVER_ERROR,
            error,
        }
    }

    fn guide(error: PipelineError) -> Self {
        Self {
            summary: GUIDE_SUMMARY,
            credential_status: StatusCode::BAD_REQUEST,
            error,
        }
    }

    fn shots(error: PipelineError) -> Self {
        Self {
            summary: SHOTS_SUMMARY,
            credential_status: StatusCode::INTERNAL_SERVER_ERROR,
            error,
        }
    }

    pub fn status(&self) -> StatusCode {
        match &self.error {
            PipelineError::MissingInput(_) => StatusCode::BAD_REQUEST,
            PipelineError::MissingCredential(_) => self.credential_status,
            PipelineError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            PipelineError::UpstreamError {
                status: Some(status),
                ..
            } if (400..600).contains(status) => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY)
            }
            PipelineError::UpstreamError { .. } => StatusCode::BAD_GATEWAY,
            PipelineError::MalformedModelOutput { .. } => StatusCode::BAD_GATEWAY,
        }
    }

    fn body(&self) -> Value {
        let mut details = Map::new();
        details.insert("message".to_string(), json!(self.error.user_message()));
        match &self.error {
            PipelineError::UpstreamError {
                status: Some(status),
                ..
            } => {
                details.insert("status".to_string(), json!(status));
            }
            PipelineError::MalformedModelOutput { raw, .. } => {
                details.insert("raw".to_string(), json!(raw));
            }
            _ => {}
        }
        if let Some(raw) = self.error.details() {
            details.insert("raw".to_string(), raw.clone());
        }

        json!({
            "error": self.summary,
            "kind": self.error.kind(),
            "details": details,
        })
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!("{}: {}", self.summary, self.error);
        } else {
            warn!("{}: {}", self.summary, self.error);
        }
        (status, Json(self.body())).into_response()
    }
}

// Malformed bodies are a caller input problem, reported through the same envelope.
fn read_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, PipelineError> {
    payload.map(|Json(body)| body).map_err(|rejection| {
        PipelineError::MissingInput(format!("Invalid request body: {}", rejection.body_text()))
    })
}

async fn ping(State(state): State<AppState>) -> Json<Value> {
    Json(json!({ "message": state.config.ping_message }))
}

async fn analyze_shot(
    State(state): State<AppState>,
    payload: Result<Json<AnalyzeShotRequest>, JsonRejection>,
) -> Result<Json<AnalysisResult>, ApiError> {
    let payload = read_body(payload).map_err(ApiError::analyze)?;
    let api_key =
        analyze::resolve_api_key(payload.api_key.as_deref(), &state.config.gemini_api_key);
    analyze::analyze_shot(&state.config, payload.image_url.as_deref(), api_key.as_deref())
        .await
        .map(Json)
        .map_err(ApiError::analyze)
}

async fn generate_guide(
    State(state): State<AppState>,
    payload: Result<Json<GenerateGuideRequest>, JsonRejection>,
) -> Result<Json<GuideResult>, ApiError> {
    let payload = read_body(payload).map_err(ApiError::guide)?;
    guide::generate_guide(
        &state.config,
        payload.analysis.as_ref(),
        payload.api_key.as_deref(),
        payload.user_equipment.as_deref(),
    )
    .await
    .map(Json)
    .map_err(ApiError::guide)
}

async fn tmdb_shots(
    State(state): State<AppState>,
    Query(params): Query<ShotsQuery>,
) -> Result<Json<TmdbShotsResponse>, ApiError> {
    let movies =
        shots::find_movie_shots(&state.config, params.query.as_deref(), params.page.as_deref())
            .await
            .map_err(ApiError::shots)?;
    Ok(Json(TmdbShotsResponse { movies }))
}

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_routes = Router::new()
        .route("/ping", get(ping))
        .route("/analyze-shot", post(analyze_shot))
        .route("/generate-guide", post(generate_guide))
        .route("/tmdb-shots", get(tmdb_shots));

    Router::new()
        .nest("/api", api_routes)
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {err}");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

pub async fn run_server(config: Config) -> anyhow::Result<()> {
    let host = config.host.clone();
    let port = config.port;
    let app = create_router(AppState::new(config));

    let listener = tokio::net::TcpListener::bind((host.as_str(), port))
        .await
        .with_context(|| format!("Failed to bind {host}:{port}"))?;
    info!("CineMatch API listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}
