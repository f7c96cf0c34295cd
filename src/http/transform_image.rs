use axum::{
  extract::{Path, State},
  http::{header, StatusCode},
  response::{IntoResponse, Response},
};
use serde_json::Value;
use tokio::time::Instant;
use tracing::info;
use utoipa::ToSchema;

use crate::http::error::{AppError, ErrorResponse};
use crate::http::upload::UploadForm;
use crate::http::AppState;
use crate::image_processing;

/// Multipart form accepted by the transform endpoint.
#[allow(dead_code)]
#[derive(ToSchema)]
pub struct TransformForm {
  /// Image file, at most 5mb.
  #[schema(value_type = String, format = Binary)]
  image: Vec<u8>,
  /// JSON encoded options handed to the operation, e.g. `{"width":100}` for resize.
  options: Option<String>,
}

#[utoipa::path(
  post,
  path = "/v1/sharp/{operation}",
  params(("operation" = String, Path, description = "Name of the image operation, e.g. resize")),
  request_body(content = TransformForm, content_type = "multipart/form-data"),
  responses(
    (status = 200, description = "Transformed image", content_type = "image/jpeg", body = [u8]),
    (status = 500, description = "Rejected or failed request", body = ErrorResponse)
  )
)]
pub async fn transform_image(
  State(state): State<AppState>,
  Path(operation): Path<String>,
  form: UploadForm,
) -> Result<Response, AppError> {
  transform(state, Some(operation), form).await
}

/// `/v1/sharp` without an operation segment, still validated as an upload first.
pub async fn transform_without_operation(
  State(state): State<AppState>,
  form: UploadForm,
) -> Result<Response, AppError> {
  transform(state, None, form).await
}

async fn transform(
  state: AppState,
  operation: Option<String>,
  form: UploadForm,
) -> Result<Response, AppError> {
  let file = image_processing::validate_upload(form.image.as_ref())?;

  let operation = match operation {
    Some(op) if !op.is_empty() => op,
    _ => return Err(AppError::MissingOperation),
  };

  let image = state.provider.load(file.data.clone());

  if !image.supports(&operation) {
    return Err(AppError::UnsupportedOperation);
  }

  let options = parse_options(form.options.as_deref())?;

  let start = Instant::now();
  let result = async {
    let transformed = image.apply(&operation, options).await?;
    transformed.to_buffer().await
  }
  .await;

  let outcome = if result.is_ok() { "ok" } else { "error" };
  let labels = [("operation", operation.clone()), ("outcome", outcome.to_owned())];
  metrics::counter!("image_transforms_total", &labels).increment(1);
  metrics::histogram!("image_transform_duration_seconds", &labels)
    .record(start.elapsed().as_secs_f64());

  let data = result?;

  info!(
    operation = %operation,
    input_size = file.size,
    output_size = data.len(),
    "image transformed"
  );

  Ok(
    (
      StatusCode::OK,
      [
        (header::CONTENT_TYPE, "image/jpeg"),
        (header::CONTENT_DISPOSITION, "inline"),
      ],
      data,
    )
      .into_response(),
  )
}

/// Empty or absent options mean the operation runs with its defaults.
fn parse_options(raw: Option<&str>) -> Result<Option<Value>, AppError> {
  match raw {
    None | Some("") => Ok(None),
    Some(raw) => serde_json::from_str(raw)
      .map(Some)
      .map_err(|_| AppError::InvalidOptionsFormat),
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn options_are_optional() {
    assert_eq!(parse_options(None).unwrap(), None);
    assert_eq!(parse_options(Some("")).unwrap(), None);
  }

  #[test]
  fn options_accept_any_json_value() {
    assert_eq!(parse_options(Some(r#"{"width":100}"#)).unwrap(), Some(json!({ "width": 100 })));
    assert_eq!(parse_options(Some("[1,2]")).unwrap(), Some(json!([1, 2])));
    assert_eq!(parse_options(Some("90")).unwrap(), Some(json!(90)));
    assert_eq!(parse_options(Some("null")).unwrap(), Some(Value::Null));
  }

  #[test]
  fn malformed_options_are_rejected() {
    for raw in ["{width:100}", "   ", "{\"width\":", "undefined"] {
      let err = parse_options(Some(raw)).unwrap_err();
      assert_eq!(err.to_string(), "wrong options format.");
    }
  }
}
