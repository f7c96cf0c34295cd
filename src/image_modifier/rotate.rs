use image::DynamicImage;
use serde::Deserialize;
use serde_json::Value;

use super::{ImageModifier, ModifierError};
use crate::image_modifier::util;

#[derive(Deserialize)]
#[serde(untagged)]
enum RotateArgs {
  Angle(i64),
  Options { angle: i64 },
}

impl Default for RotateArgs {
  fn default() -> Self {
    RotateArgs::Angle(0)
  }
}

pub struct RotateModifier {
  /// Clockwise quarter turns, 0..=3.
  quarter_turns: u8,
}

impl RotateModifier {
  pub fn evaluate(options: Option<&Value>) -> Result<Box<dyn ImageModifier>, ModifierError> {
    let angle = match util::options_or_default::<RotateArgs>(options)? {
      RotateArgs::Angle(angle) | RotateArgs::Options { angle } => angle,
    };

    let normalized = angle.rem_euclid(360);
    if normalized % 90 != 0 {
      return Err(ModifierError::InvalidOptions(format!(
        "rotation angle {} is not a multiple of 90",
        angle
      )));
    }

    Ok(Box::new(RotateModifier {
      quarter_turns: (normalized / 90) as u8,
    }))
  }
}

impl ImageModifier for RotateModifier {
  fn apply(&self, img: &DynamicImage) -> Result<Option<DynamicImage>, ModifierError> {
    Ok(match self.quarter_turns {
      1 => Some(img.rotate90()),
      2 => Some(img.rotate180()),
      3 => Some(img.rotate270()),
      _ => None,
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn quarter_turn_swaps_dimensions() {
    let img = DynamicImage::new_rgb8(4, 2);
    let out = RotateModifier::evaluate(Some(&json!(90)))
      .unwrap()
      .apply(&img)
      .unwrap()
      .unwrap();
    assert_eq!((out.width(), out.height()), (2, 4));
  }

  #[test]
  fn negative_and_object_angles() {
    let img = DynamicImage::new_rgb8(4, 2);
    let out = RotateModifier::evaluate(Some(&json!({ "angle": -90 })))
      .unwrap()
      .apply(&img)
      .unwrap()
      .unwrap();
    assert_eq!((out.width(), out.height()), (2, 4));
  }

  #[test]
  fn full_turn_is_a_no_op() {
    let img = DynamicImage::new_rgb8(4, 2);
    let modifier = RotateModifier::evaluate(Some(&json!(720))).unwrap();
    assert!(modifier.apply(&img).unwrap().is_none());
    assert!(RotateModifier::evaluate(None).unwrap().apply(&img).unwrap().is_none());
  }

  #[test]
  fn arbitrary_angles_are_rejected() {
    assert!(RotateModifier::evaluate(Some(&json!(45))).is_err());
    assert!(RotateModifier::evaluate(Some(&json!("90"))).is_err());
  }
}
