// HTTP error mapping for the LiteCode API

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use litecode_common::store::StoreError;
use litecode_judge::EvaluationError;
use thiserror::Error;
use tracing::error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    BadRequest(String),

    #[error("missing user identity")]
    Unauthorized,

    #[error(transparent)]
    Evaluation(#[from] EvaluationError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::Evaluation(e) if e.is_client_error() => StatusCode::BAD_REQUEST,
            AppError::Evaluation(EvaluationError::ProblemNotFound(_))
            | AppError::Evaluation(EvaluationError::SubmissionNotFound(_)) => StatusCode::NOT_FOUND,
            AppError::Evaluation(EvaluationError::JudgeUnavailable(_)) => StatusCode::BAD_GATEWAY,
            AppError::Evaluation(_) | AppError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = %self, status = status.as_u16(), "Request failed");
        }

        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}
