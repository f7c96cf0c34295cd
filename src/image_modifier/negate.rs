use image::DynamicImage;
use serde_json::Value;

use super::{ImageModifier, ModifierError};
use crate::image_modifier::util;

pub struct NegateModifier {
  enabled: bool,
}

impl NegateModifier {
  pub fn evaluate(options: Option<&Value>) -> Result<Box<dyn ImageModifier>, ModifierError> {
    Ok(Box::new(NegateModifier {
      enabled: util::toggle(options)?,
    }))
  }
}

impl ImageModifier for NegateModifier {
  fn apply(&self, img: &DynamicImage) -> Result<Option<DynamicImage>, ModifierError> {
    if !self.enabled {
      return Ok(None);
    }

    let mut out = img.clone();
    out.invert();
    Ok(Some(out))
  }
}
