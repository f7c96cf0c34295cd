use bytes::Bytes;
use thiserror::Error;

pub mod provider;

pub use provider::{ImageHandle, ImageProvider, RasterProvider, TransformError};

/// Uploads of this size or more are rejected.
pub const MAX_UPLOAD_SIZE: usize = 5_000_000;

/// Accepted file extensions and the mime type each one must be declared with, in listing order.
pub const FILE_TYPES: [(&str, &str); 7] = [
  ("jpeg", "image/jpeg"),
  ("jpg", "image/jpeg"),
  ("png", "image/png"),
  ("gif", "image/gif"),
  ("svg", "image/svg+xml"),
  ("bmp", "image/bmp"),
  ("ico", "image/vnd.microsoft.icon"),
];

pub fn mime_for_extension(ext: &str) -> Option<&'static str> {
  FILE_TYPES
    .iter()
    .find(|(e, _)| *e == ext)
    .map(|(_, mime)| *mime)
}

pub fn supported_extensions() -> String {
  FILE_TYPES
    .iter()
    .map(|(ext, _)| *ext)
    .collect::<Vec<_>>()
    .join(", ")
}

/// A single file received from a multipart upload, held in memory for one request.
#[derive(Debug, Clone)]
pub struct UploadedFile {
  pub original_name: String,
  pub mime_type: Option<String>,
  pub size: usize,
  pub data: Bytes,
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum UploadError {
  #[error("no image detected.")]
  MissingFile,
  #[error("image missing originalname.")]
  MissingOriginalName,
  #[error("wrong image originalname.")]
  InvalidOriginalName,
  #[error("unsupported file type, only allowed: {}.", supported_extensions())]
  UnsupportedFileType,
  #[error("image missing mimetype.")]
  MissingMimeType,
  #[error("wrong image mimetype.")]
  MimeTypeMismatch,
  #[error("image missing size.")]
  MissingSize,
  #[error("max image size is 5mb.")]
  FileTooLarge,
}

/// Runs the upload guards in order and stops at the first one that fails.
pub fn validate_upload(file: Option<&UploadedFile>) -> Result<&UploadedFile, UploadError> {
  let file = file.ok_or(UploadError::MissingFile)?;

  if file.original_name.is_empty() {
    return Err(UploadError::MissingOriginalName);
  }

  let (_, ext) = file
    .original_name
    .rsplit_once('.')
    .ok_or(UploadError::InvalidOriginalName)?;

  if mime_for_extension(&ext.to_lowercase()).is_none() {
    return Err(UploadError::UnsupportedFileType);
  }

  let mime_type = match file.mime_type.as_deref() {
    Some(m) if !m.is_empty() => m,
    _ => return Err(UploadError::MissingMimeType),
  };

  // The extension is matched exactly here, so `photo.PNG` passes the whitelist but not this check
  if mime_for_extension(ext) != Some(mime_type.to_lowercase().as_str()) {
    return Err(UploadError::MimeTypeMismatch);
  }

  if file.size == 0 {
    return Err(UploadError::MissingSize);
  }

  if file.size >= MAX_UPLOAD_SIZE {
    return Err(UploadError::FileTooLarge);
  }

  Ok(file)
}
