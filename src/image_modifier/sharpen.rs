use image::DynamicImage;
use serde::Deserialize;
use serde_json::Value;

use super::{ImageModifier, ModifierError};

const SHARPEN_KERNEL: [f32; 9] = [0.0, -1.0, 0.0, -1.0, 5.0, -1.0, 0.0, -1.0, 0.0];

#[derive(Deserialize)]
#[serde(untagged)]
enum SharpenArgs {
  Sigma(f32),
  Options { sigma: Option<f32> },
}

pub struct SharpenModifier {
  sigma: Option<f32>,
}

impl SharpenModifier {
  pub fn evaluate(options: Option<&Value>) -> Result<Box<dyn ImageModifier>, ModifierError> {
    let sigma = match options {
      None | Some(Value::Null) => None,
      Some(value) => match SharpenArgs::deserialize(value)? {
        SharpenArgs::Sigma(sigma) => Some(sigma),
        SharpenArgs::Options { sigma } => sigma,
      },
    };

    if let Some(sigma) = sigma {
      if !(0.01..=10.0).contains(&sigma) {
        return Err(ModifierError::InvalidOptions(format!(
          "sharpen sigma {} must be between 0.01 and 10",
          sigma
        )));
      }
    }

    Ok(Box::new(SharpenModifier { sigma }))
  }
}

impl ImageModifier for SharpenModifier {
  fn apply(&self, img: &DynamicImage) -> Result<Option<DynamicImage>, ModifierError> {
    Ok(Some(match self.sigma {
      Some(sigma) => img.unsharpen(sigma, 0),
      None => img.filter3x3(&SHARPEN_KERNEL),
    }))
  }
}
