mod error;
mod metrics;
mod models;
mod orchestrator;
mod pipeline;

use std::env;
use std::sync::Arc;

use anyhow::Result;
use axum::extract::State;
use axum::http::{StatusCode, Uri};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Local;
use serde_json::{json, Value};
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, instrument, warn};

use error::ApiError;
use metrics::Metrics;
use models::{ConsultaRequest, ConsultaResponse, MetricasResponse};
use orchestrator::OrchestratorHandle;
use pipeline::QueryPipeline;

const DESCRIPTION: &str = "Sistema de Pesquisa Jurídica Inteligente";

#[derive(Clone)]
struct AppState {
    orchestrator: Arc<OrchestratorHandle>,
    metrics: Arc<Metrics>,
    pipeline: Arc<QueryPipeline>,
}

impl AppState {
    fn new(orchestrator: Arc<OrchestratorHandle>, metrics: Arc<Metrics>) -> Self {
        let pipeline = Arc::new(QueryPipeline::new(orchestrator.clone(), metrics.clone()));
        Self {
            orchestrator,
            metrics,
            pipeline,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let debug = env::var("DEBUG")
        .map(|v| v.eq_ignore_ascii_case("true"))
        .unwrap_or(false);
    tracing_subscriber::fmt()
        .with_env_filter(if debug {
            "ia_jur=debug,tower_http=debug,info"
        } else {
            "ia_jur=info,warn"
        })
        .init();

    let state = AppState::new(
        Arc::new(OrchestratorHandle::from_env()),
        Arc::new(Metrics::new()),
    );

    // Startup probe. A failure here is only logged; the lazy handle retries
    // on the first request.
    match state.orchestrator.get().await {
        Ok(_) => info!("orchestrator initialized"),
        Err(err) => warn!("orchestrator unavailable at startup: {err}"),
    }

    let host = env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
    let port: u16 = env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(8000);

    let app = router(state);
    let listener = tokio::net::TcpListener::bind((host.as_str(), port)).await?;
    info!("IA-JUR serving on http://{host}:{port}");
    axum::serve(listener, app).await?;
    Ok(())
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/consulta", post(processar_consulta))
        .route("/api/metricas", get(obter_metricas))
        .route("/api/health", get(health_check))
        .route("/api/info", get(system_info))
        .fallback(not_found)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

#[instrument(skip_all)]
async fn processar_consulta(
    State(state): State<AppState>,
    Json(consulta): Json<ConsultaRequest>,
) -> Result<Json<ConsultaResponse>, ApiError> {
    Ok(Json(state.pipeline.handle(&consulta.pergunta).await?))
}

async fn obter_metricas(State(state): State<AppState>) -> Json<MetricasResponse> {
    Json(state.metrics.snapshot())
}

/// Always 200; the body reports whether the orchestrator can be resolved.
async fn health_check(State(state): State<AppState>) -> Json<Value> {
    let timestamp = Local::now().to_rfc3339();
    match state.orchestrator.get().await {
        Ok(_) => Json(json!({
            "status": "healthy",
            "timestamp": timestamp,
            "orchestrator": "operational",
            "version": env!("CARGO_PKG_VERSION"),
        })),
        Err(err) => Json(json!({
            "status": "unhealthy",
            "timestamp": timestamp,
            "error": err.to_string(),
            "version": env!("CARGO_PKG_VERSION"),
        })),
    }
}

async fn system_info() -> Json<Value> {
    Json(json!({
        "sistema": "IA-JUR",
        "versao": env!("CARGO_PKG_VERSION"),
        "descricao": DESCRIPTION,
        "tecnologia": "Axum + Rust + IA Gemini",
        "integracao": "Agente de Pesquisa Jurídica",
        "timestamp": Local::now().to_rfc3339(),
    }))
}

async fn not_found(uri: Uri) -> (StatusCode, Json<Value>) {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "error": "Página não encontrada",
            "path": uri.path(),
            "message": "A página solicitada não existe no IA-JUR",
        })),
    )
}
