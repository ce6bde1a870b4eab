use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

/// Failure taxonomy for one query transaction. Validation failures map to
/// 400; initialization and processing failures both map to 500, but stay
/// distinct so the health endpoint and the logs can tell them apart.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Pergunta não pode estar vazia")]
    EmptyQuestion,
    #[error("Erro ao inicializar orquestrador: {0:#}")]
    Initialization(anyhow::Error),
    #[error("Erro interno ao processar consulta: {0:#}")]
    Processing(anyhow::Error),
}

impl ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::EmptyQuestion => StatusCode::BAD_REQUEST,
            ApiError::Initialization(_) | ApiError::Processing(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!("{self}");
        }
        (status, Json(json!({ "detail": self.to_string() }))).into_response()
    }
}
