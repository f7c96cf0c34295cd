use axum::async_trait;
use axum::extract::multipart::{Multipart, MultipartError};
use axum::extract::{FromRequest, Request};
use axum::http::StatusCode;
use tracing::debug;

use crate::http::error::AppError;
use crate::image_processing::{UploadError, UploadedFile};

pub const IMAGE_FIELD: &str = "image";
pub const OPTIONS_FIELD: &str = "options";

#[derive(Debug, Default)]
pub struct UploadForm {
  pub image: Option<UploadedFile>,
  pub options: Option<String>,
}

/// A request that is not multipart at all is treated as one without a file.
#[async_trait]
impl<S> FromRequest<S> for UploadForm
where
  S: Send + Sync,
{
  type Rejection = AppError;

  async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
    match Multipart::from_request(req, state).await {
      Ok(multipart) => read_form(multipart).await,
      Err(rejection) => {
        debug!(reason = %rejection, "request is not multipart");
        Ok(UploadForm::default())
      }
    }
  }
}

fn multipart_error(err: MultipartError) -> AppError {
  // Anything over the body limit is necessarily over the upload limit too
  if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
    return UploadError::FileTooLarge.into();
  }

  AppError::Unknown(format!("failed to read multipart body: {}", err.body_text()))
}

/// Reads the `image` file and the `options` text field, ignoring anything else.
pub async fn read_form(mut multipart: Multipart) -> Result<UploadForm, AppError> {
  let mut form = UploadForm::default();

  while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
    let name = field.name().unwrap_or("").to_owned();

    match name.as_str() {
      IMAGE_FIELD => {
        // Without a filename the part is a plain text field, not a file
        let original_name = match field.file_name() {
          Some(file_name) => file_name.to_owned(),
          None => continue,
        };

        if form.image.is_some() {
          return Err(AppError::Unknown("more than one image uploaded".to_owned()));
        }

        let mime_type = field.content_type().map(str::to_owned);
        let data = field.bytes().await.map_err(multipart_error)?;

        debug!(
          original_name = %original_name,
          mime_type = ?mime_type,
          size = data.len(),
          "received image"
        );

        form.image = Some(UploadedFile {
          original_name,
          mime_type,
          size: data.len(),
          data,
        });
      }
      OPTIONS_FIELD if form.options.is_none() => {
        form.options = Some(field.text().await.map_err(multipart_error)?);
      }
      _ => {}
    }
  }

  Ok(form)
}
