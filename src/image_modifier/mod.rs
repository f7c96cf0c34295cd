use image::DynamicImage;
use serde_json::Value;
use thiserror::Error;

pub(crate) mod util;

pub mod blur;
pub mod extract;
pub mod flip;
pub mod format;
pub mod grayscale;
pub mod negate;
pub mod resize;
pub mod rotate;
pub mod sharpen;
pub mod threshold;

pub use format::OutputFormat;

#[derive(Error, Debug)]
pub enum ModifierError {
  #[error("invalid options: {0}")]
  InvalidOptions(String),
  #[error("{0}")]
  Processing(String),
}

impl From<serde_json::Error> for ModifierError {
  fn from(err: serde_json::Error) -> Self {
    ModifierError::InvalidOptions(err.to_string())
  }
}

pub trait ImageModifier: Send {
  /// Returns `None` when the image is left untouched.
  fn apply(&self, img: &DynamicImage) -> Result<Option<DynamicImage>, ModifierError>;

  /// Encoding selected for the final buffer, if this modifier changes it.
  fn output_format(&self) -> Option<OutputFormat> {
    None
  }
}

pub type ImageModifierEvaluator = fn(Option<&Value>) -> Result<Box<dyn ImageModifier>, ModifierError>;

/// Every operation that can be dispatched by name. Nothing outside this table is invocable.
const OPERATIONS: &[(&str, ImageModifierEvaluator)] = &[
  ("resize", resize::ResizeModifier::evaluate),
  ("rotate", rotate::RotateModifier::evaluate),
  ("flip", flip::FlipModifier::evaluate_flip),
  ("flop", flip::FlipModifier::evaluate_flop),
  ("blur", blur::BlurModifier::evaluate),
  ("sharpen", sharpen::SharpenModifier::evaluate),
  ("greyscale", grayscale::GrayscaleModifier::evaluate),
  ("grayscale", grayscale::GrayscaleModifier::evaluate),
  ("negate", negate::NegateModifier::evaluate),
  ("extract", extract::ExtractModifier::evaluate),
  ("threshold", threshold::ThresholdModifier::evaluate),
  ("jpeg", format::FormatModifier::evaluate_jpeg),
  ("png", format::FormatModifier::evaluate_png),
  ("webp", format::FormatModifier::evaluate_webp),
  ("gif", format::FormatModifier::evaluate_gif),
  ("toFormat", format::FormatModifier::evaluate_to_format),
];

pub fn lookup(operation: &str) -> Option<ImageModifierEvaluator> {
  OPERATIONS
    .iter()
    .find(|(name, _)| *name == operation)
    .map(|(_, eval)| *eval)
}

pub fn is_supported(operation: &str) -> bool {
  lookup(operation).is_some()
}

pub fn operation_names() -> impl Iterator<Item = &'static str> {
  OPERATIONS.iter().map(|(name, _)| *name)
}
