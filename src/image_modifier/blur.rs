use image::DynamicImage;
use serde::Deserialize;
use serde_json::Value;

use super::{ImageModifier, ModifierError};

const BOX_KERNEL: [f32; 9] = [1.0 / 9.0; 9];

#[derive(Deserialize)]
#[serde(untagged)]
enum BlurArgs {
  Enabled(bool),
  Sigma(f32),
  Options { sigma: f32 },
}

pub enum BlurModifier {
  Disabled,
  /// Fast 3x3 box blur.
  Mild,
  Gaussian(f32),
}

impl BlurModifier {
  pub fn evaluate(options: Option<&Value>) -> Result<Box<dyn ImageModifier>, ModifierError> {
    let args = match options {
      None | Some(Value::Null) => BlurArgs::Enabled(true),
      Some(value) => BlurArgs::deserialize(value)?,
    };

    let modifier = match args {
      BlurArgs::Enabled(true) => BlurModifier::Mild,
      BlurArgs::Enabled(false) => BlurModifier::Disabled,
      BlurArgs::Sigma(sigma) | BlurArgs::Options { sigma } => {
        if !(0.3..=1000.0).contains(&sigma) {
          return Err(ModifierError::InvalidOptions(format!(
            "blur sigma {} must be between 0.3 and 1000",
            sigma
          )));
        }
        BlurModifier::Gaussian(sigma)
      }
    };

    Ok(Box::new(modifier))
  }
}

impl ImageModifier for BlurModifier {
  fn apply(&self, img: &DynamicImage) -> Result<Option<DynamicImage>, ModifierError> {
    Ok(match self {
      BlurModifier::Disabled => None,
      BlurModifier::Mild => Some(img.filter3x3(&BOX_KERNEL)),
      BlurModifier::Gaussian(sigma) => Some(img.blur(*sigma)),
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn accepts_every_argument_shape() {
    let img = DynamicImage::new_rgb8(8, 8);
    for options in [None, Some(json!(true)), Some(json!(2.5)), Some(json!({ "sigma": 1 }))] {
      let modifier = BlurModifier::evaluate(options.as_ref()).unwrap();
      let out = modifier.apply(&img).unwrap().unwrap();
      assert_eq!((out.width(), out.height()), (8, 8));
    }
  }

  #[test]
  fn false_disables() {
    let img = DynamicImage::new_rgb8(8, 8);
    let modifier = BlurModifier::evaluate(Some(&json!(false))).unwrap();
    assert!(modifier.apply(&img).unwrap().is_none());
  }

  #[test]
  fn sigma_out_of_range() {
    assert!(BlurModifier::evaluate(Some(&json!(0.1))).is_err());
    assert!(BlurModifier::evaluate(Some(&json!({ "sigma": 5000 }))).is_err());
  }
}
