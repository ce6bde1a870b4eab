use serde::{Deserialize, Serialize};

/// Body of `POST /api/consulta`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsultaRequest {
    pub pergunta: String,
}

/// Normalized answer returned to the caller. Field names follow the public
/// API contract (Portuguese).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsultaResponse {
    pub resumo: String,
    pub resposta_completa: String,
    pub fontes: u32,
    pub workflow_id: String,
    pub duracao: f64,
    pub timestamp: String,
}

/// Body of `GET /api/metricas`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricasResponse {
    pub total_consultas: u64,
    pub consultas_pesquisa: u64,
    pub tempo_medio: f64,
    pub fontes_totais: u64,
    pub uptime: String,
}

/// Raw outcome of one orchestrator invocation. Every field the orchestrator
/// may omit is optional here; the pipeline fills the defaults when it
/// normalizes the outcome into a [`ConsultaResponse`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueryOutcome {
    pub summary: Option<String>,
    pub formatted_response: Option<String>,
    pub sources_found: Option<u32>,
    #[serde(default)]
    pub metadata: QueryMetadata,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueryMetadata {
    pub workflow_id: Option<String>,
}
