use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

use super::ModifierError;

pub const MAX_DIMENSION: u32 = 16_384;
pub const MAX_PIXELS: u64 = 100_000_000;

/// Decodes operation options, falling back to `T::default()` when none were given.
pub fn options_or_default<T: DeserializeOwned + Default>(
  options: Option<&Value>,
) -> Result<T, ModifierError> {
  match options {
    None | Some(Value::Null) => Ok(T::default()),
    Some(value) => Ok(T::deserialize(value)?),
  }
}

pub fn required_options<T: DeserializeOwned>(
  operation: &str,
  options: Option<&Value>,
) -> Result<T, ModifierError> {
  match options {
    None | Some(Value::Null) => Err(ModifierError::InvalidOptions(format!(
      "{} requires options",
      operation
    ))),
    Some(value) => Ok(T::deserialize(value)?),
  }
}

/// Boolean switch used by operations like `flip` or `negate`, enabled unless `false` is given.
pub fn toggle(options: Option<&Value>) -> Result<bool, ModifierError> {
  match options {
    None | Some(Value::Null) => Ok(true),
    Some(value) => Ok(bool::deserialize(value)?),
  }
}

pub fn aspect(width: u32, height: u32) -> f64 {
  width as f64 / height.max(1) as f64
}

pub fn check_dimension(name: &str, value: u32) -> Result<u32, ModifierError> {
  if value == 0 || value > MAX_DIMENSION {
    return Err(ModifierError::InvalidOptions(format!(
      "{} must be between 1 and {}",
      name, MAX_DIMENSION
    )));
  }

  Ok(value)
}

/// Bounds an output or intermediate image before any pixel buffer is allocated for it.
pub fn check_size(width: u32, height: u32) -> Result<(u32, u32), ModifierError> {
  let width = check_dimension("width", width)?;
  let height = check_dimension("height", height)?;

  if width as u64 * height as u64 > MAX_PIXELS {
    return Err(ModifierError::InvalidOptions(format!(
      "{}x{} exceeds the limit of {} pixels",
      width, height, MAX_PIXELS
    )));
  }

  Ok((width, height))
}
