use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::anyhow;
use chrono::{Local, Utc};
use tracing::{info, warn};

use crate::error::ApiError;
use crate::metrics::Metrics;
use crate::models::{ConsultaResponse, QueryOutcome};
use crate::orchestrator::OrchestratorHandle;

/// Upper bound on a single orchestrator invocation; keeps a stuck upstream
/// from pinning a handler forever.
const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(180);

const FALLBACK_SUMMARY: &str = "Resumo não disponível";
const FALLBACK_ANSWER: &str = "Resposta não disponível";

/// Runs one query end to end: validate, time, invoke, normalize, record.
pub struct QueryPipeline {
    orchestrator: Arc<OrchestratorHandle>,
    metrics: Arc<Metrics>,
    query_timeout: Duration,
}

impl QueryPipeline {
    pub fn new(orchestrator: Arc<OrchestratorHandle>, metrics: Arc<Metrics>) -> Self {
        Self {
            orchestrator,
            metrics,
            query_timeout: DEFAULT_QUERY_TIMEOUT,
        }
    }

    pub fn with_query_timeout(mut self, query_timeout: Duration) -> Self {
        self.query_timeout = query_timeout;
        self
    }

    pub async fn handle(&self, pergunta: &str) -> Result<ConsultaResponse, ApiError> {
        let pergunta = pergunta.trim();
        if pergunta.is_empty() {
            return Err(ApiError::EmptyQuestion);
        }

        let started = Instant::now();
        let orchestrator = self.orchestrator.get().await?;

        info!("processing query: {}...", preview(pergunta));

        let outcome = match tokio::time::timeout(
            self.query_timeout,
            orchestrator.process_query(pergunta),
        )
        .await
        {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(err)) => {
                warn!(
                    "query failed after {:.2}s: {err:#}",
                    started.elapsed().as_secs_f64()
                );
                return Err(ApiError::Processing(err));
            }
            Err(_) => {
                warn!(
                    "query timed out after {:.2}s",
                    started.elapsed().as_secs_f64()
                );
                return Err(ApiError::Processing(anyhow!(
                    "tempo limite de {}s excedido",
                    self.query_timeout.as_secs()
                )));
            }
        };

        let duracao = started.elapsed().as_secs_f64();
        let resposta = normalize(outcome, duracao);
        self.metrics.record(duracao, resposta.fontes);

        info!(
            "query answered in {duracao:.2}s with {} sources",
            resposta.fontes
        );
        Ok(resposta)
    }
}

/// Fills the defaults for every field the orchestrator may omit.
fn normalize(outcome: QueryOutcome, duracao: f64) -> ConsultaResponse {
    ConsultaResponse {
        resumo: outcome
            .summary
            .unwrap_or_else(|| FALLBACK_SUMMARY.to_string()),
        resposta_completa: outcome
            .formatted_response
            .unwrap_or_else(|| FALLBACK_ANSWER.to_string()),
        fontes: outcome.sources_found.unwrap_or(0),
        workflow_id: outcome
            .metadata
            .workflow_id
            .unwrap_or_else(|| format!("wf_{}", Utc::now().timestamp())),
        duracao,
        timestamp: Local::now().to_rfc3339(),
    }
}

/// First 100 characters of the question, for request logs.
fn preview(pergunta: &str) -> String {
    pergunta.chars().take(100).collect()
}
