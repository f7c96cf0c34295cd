use image::{DynamicImage, Pixel};
use serde::Deserialize;
use serde_json::Value;

use super::{ImageModifier, ModifierError};

const DEFAULT_THRESHOLD: u8 = 128;

#[derive(Deserialize)]
#[serde(untagged)]
enum ThresholdArgs {
  Level(u8),
  Options {
    threshold: Option<u8>,
    greyscale: Option<bool>,
    grayscale: Option<bool>,
  },
}

pub struct ThresholdModifier {
  level: u8,
  greyscale: bool,
}

impl ThresholdModifier {
  pub fn evaluate(options: Option<&Value>) -> Result<Box<dyn ImageModifier>, ModifierError> {
    let modifier = match options {
      None | Some(Value::Null) => ThresholdModifier {
        level: DEFAULT_THRESHOLD,
        greyscale: true,
      },
      Some(value) => match ThresholdArgs::deserialize(value)? {
        ThresholdArgs::Level(level) => ThresholdModifier {
          level,
          greyscale: true,
        },
        ThresholdArgs::Options {
          threshold,
          greyscale,
          grayscale,
        } => ThresholdModifier {
          level: threshold.unwrap_or(DEFAULT_THRESHOLD),
          greyscale: greyscale.or(grayscale).unwrap_or(true),
        },
      },
    };

    Ok(Box::new(modifier))
  }

  fn cut(&self, value: u8) -> u8 {
    if value >= self.level {
      255
    } else {
      0
    }
  }
}

impl ImageModifier for ThresholdModifier {
  fn apply(&self, img: &DynamicImage) -> Result<Option<DynamicImage>, ModifierError> {
    if self.greyscale {
      let mut luma = img.to_luma8();
      luma.pixels_mut().for_each(|p| p.0[0] = self.cut(p.0[0]));
      return Ok(Some(DynamicImage::ImageLuma8(luma)));
    }

    let mut rgba = img.to_rgba8();
    rgba
      .pixels_mut()
      .for_each(|p| p.apply_without_alpha(|c| self.cut(c)));
    Ok(Some(DynamicImage::ImageRgba8(rgba)))
  }
}
