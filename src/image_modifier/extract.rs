use image::DynamicImage;
use serde::Deserialize;
use serde_json::Value;

use super::{ImageModifier, ModifierError};
use crate::image_modifier::util;

#[derive(Deserialize)]
struct Region {
  left: u32,
  top: u32,
  width: u32,
  height: u32,
}

pub struct ExtractModifier {
  region: Region,
}

impl ExtractModifier {
  pub fn evaluate(options: Option<&Value>) -> Result<Box<dyn ImageModifier>, ModifierError> {
    let region: Region = util::required_options("extract", options)?;
    util::check_dimension("width", region.width)?;
    util::check_dimension("height", region.height)?;

    Ok(Box::new(ExtractModifier { region }))
  }
}

impl ImageModifier for ExtractModifier {
  fn apply(&self, img: &DynamicImage) -> Result<Option<DynamicImage>, ModifierError> {
    let r = &self.region;
    let right = r.left.checked_add(r.width);
    let bottom = r.top.checked_add(r.height);

    match (right, bottom) {
      (Some(right), Some(bottom)) if right <= img.width() && bottom <= img.height() => {
        Ok(Some(img.crop_imm(r.left, r.top, r.width, r.height)))
      }
      _ => Err(ModifierError::Processing(format!(
        "extract area {}x{}+{}+{} is outside the {}x{} image",
        r.width,
        r.height,
        r.left,
        r.top,
        img.width(),
        img.height()
      ))),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn crops_region() {
    let img = DynamicImage::new_rgb8(100, 80);
    let out = ExtractModifier::evaluate(Some(&json!({ "left": 10, "top": 20, "width": 30, "height": 40 })))
      .unwrap()
      .apply(&img)
      .unwrap()
      .unwrap();
    assert_eq!((out.width(), out.height()), (30, 40));
  }

  #[test]
  fn region_outside_image_fails() {
    let img = DynamicImage::new_rgb8(100, 80);
    let modifier =
      ExtractModifier::evaluate(Some(&json!({ "left": 90, "top": 0, "width": 20, "height": 10 })))
        .unwrap();
    assert!(matches!(modifier.apply(&img), Err(ModifierError::Processing(_))));
  }

  #[test]
  fn incomplete_region_is_rejected() {
    assert!(ExtractModifier::evaluate(None).is_err());
    assert!(ExtractModifier::evaluate(Some(&json!({ "left": 1, "top": 1 }))).is_err());
  }
}
