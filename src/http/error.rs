use axum::{
  http::StatusCode,
  response::{IntoResponse, Response},
  Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::{error, warn};
use utoipa::ToSchema;

use crate::image_processing::{TransformError, UploadError};

/// Body of every failed request.
#[derive(Serialize, ToSchema)]
pub struct ErrorResponse {
  pub error: String,
}

#[derive(Error, Debug)]
pub enum AppError {
  #[error(transparent)]
  Upload(#[from] UploadError),
  #[error("missing operation.")]
  MissingOperation,
  #[error("unsupported operation.")]
  UnsupportedOperation,
  #[error("wrong options format.")]
  InvalidOptionsFormat,
  /// The inner message is logged, never returned to the client.
  #[error("there has been an unknown error.")]
  Unknown(String),
}

impl From<TransformError> for AppError {
  fn from(err: TransformError) -> Self {
    match err {
      TransformError::UnsupportedOperation(_) => AppError::UnsupportedOperation,
      other => AppError::Unknown(other.to_string()),
    }
  }
}

impl AppError {
  pub fn kind(&self) -> &'static str {
    match self {
      AppError::Upload(UploadError::MissingFile) => "missing_file",
      AppError::Upload(UploadError::MissingOriginalName) => "missing_original_name",
      AppError::Upload(UploadError::InvalidOriginalName) => "invalid_original_name",
      AppError::Upload(UploadError::UnsupportedFileType) => "unsupported_file_type",
      AppError::Upload(UploadError::MissingMimeType) => "missing_mime_type",
      AppError::Upload(UploadError::MimeTypeMismatch) => "mime_type_mismatch",
      AppError::Upload(UploadError::MissingSize) => "missing_size",
      AppError::Upload(UploadError::FileTooLarge) => "file_too_large",
      AppError::MissingOperation => "missing_operation",
      AppError::UnsupportedOperation => "unsupported_operation",
      AppError::InvalidOptionsFormat => "invalid_options_format",
      AppError::Unknown(_) => "unknown",
    }
  }
}

impl IntoResponse for AppError {
  fn into_response(self) -> Response {
    match &self {
      AppError::Unknown(msg) => error!(error = %msg, "image request failed"),
      other => warn!(kind = other.kind(), "image request rejected"),
    }

    // Client mistakes and provider failures share the same status
    let body = ErrorResponse {
      error: self.to_string(),
    };
    (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use http_body_util::BodyExt;

  async fn body_of(err: AppError) -> (StatusCode, serde_json::Value) {
    let response = err.into_response();
    let status = response.status();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    (status, serde_json::from_slice(&body).unwrap())
  }

  #[tokio::test]
  async fn upload_errors_keep_their_message() {
    let (status, body) = body_of(UploadError::FileTooLarge.into()).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, serde_json::json!({ "error": "max image size is 5mb." }));
  }

  #[tokio::test]
  async fn unknown_error_hides_details() {
    let (status, body) = body_of(AppError::Unknown("decoder exploded".to_owned())).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, serde_json::json!({ "error": "there has been an unknown error." }));
  }

  #[test]
  fn transform_errors_collapse_to_unknown() {
    let err: AppError = TransformError::WorkerLost.into();
    assert!(matches!(err, AppError::Unknown(_)));

    let err: AppError = TransformError::UnsupportedOperation("nope".to_owned()).into();
    assert_eq!(err.to_string(), "unsupported operation.");
  }
}
