use image::DynamicImage;
use serde_json::Value;

use super::{ImageModifier, ModifierError};
use crate::image_modifier::util;

pub struct GrayscaleModifier {
  enabled: bool,
}

impl GrayscaleModifier {
  pub fn evaluate(options: Option<&Value>) -> Result<Box<dyn ImageModifier>, ModifierError> {
    Ok(Box::new(GrayscaleModifier {
      enabled: util::toggle(options)?,
    }))
  }
}

impl ImageModifier for GrayscaleModifier {
  fn apply(&self, img: &DynamicImage) -> Result<Option<DynamicImage>, ModifierError> {
    if !self.enabled {
      return Ok(None);
    }

    Ok(Some(img.grayscale()))
  }
}
