use image::DynamicImage;
use serde_json::Value;

use super::{ImageModifier, ModifierError};
use crate::image_modifier::util;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
  /// Top to bottom (`flip`).
  Vertical,
  /// Left to right (`flop`).
  Horizontal,
}

pub struct FlipModifier {
  axis: Axis,
  enabled: bool,
}

impl FlipModifier {
  pub fn evaluate_flip(options: Option<&Value>) -> Result<Box<dyn ImageModifier>, ModifierError> {
    Ok(Box::new(FlipModifier {
      axis: Axis::Vertical,
      enabled: util::toggle(options)?,
    }))
  }

  pub fn evaluate_flop(options: Option<&Value>) -> Result<Box<dyn ImageModifier>, ModifierError> {
    Ok(Box::new(FlipModifier {
      axis: Axis::Horizontal,
      enabled: util::toggle(options)?,
    }))
  }
}

impl ImageModifier for FlipModifier {
  fn apply(&self, img: &DynamicImage) -> Result<Option<DynamicImage>, ModifierError> {
    if !self.enabled {
      return Ok(None);
    }

    Ok(Some(match self.axis {
      Axis::Vertical => img.flipv(),
      Axis::Horizontal => img.fliph(),
    }))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use image::{GenericImageView, Rgb, RgbImage};
  use serde_json::json;

  fn marked() -> DynamicImage {
    let mut img = RgbImage::new(2, 2);
    img.put_pixel(0, 0, Rgb([255, 0, 0]));
    DynamicImage::ImageRgb8(img)
  }

  #[test]
  fn flip_mirrors_top_to_bottom() {
    let out = FlipModifier::evaluate_flip(None)
      .unwrap()
      .apply(&marked())
      .unwrap()
      .unwrap();
    assert_eq!(out.get_pixel(0, 1).0[0], 255);
  }

  #[test]
  fn flop_mirrors_left_to_right() {
    let out = FlipModifier::evaluate_flop(Some(&json!(true)))
      .unwrap()
      .apply(&marked())
      .unwrap()
      .unwrap();
    assert_eq!(out.get_pixel(1, 0).0[0], 255);
  }

  #[test]
  fn false_disables() {
    let modifier = FlipModifier::evaluate_flip(Some(&json!(false))).unwrap();
    assert!(modifier.apply(&marked()).unwrap().is_none());
  }
}
