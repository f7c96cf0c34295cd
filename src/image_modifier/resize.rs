use image::{imageops, imageops::FilterType, DynamicImage, RgbaImage};
use serde::Deserialize;
use serde_json::Value;

use super::{ImageModifier, ModifierError};
use crate::image_modifier::util;

#[derive(Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Fit {
  #[default]
  Cover,
  Contain,
  Fill,
  Inside,
  Outside,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
struct ResizeOptions {
  width: Option<u32>,
  height: Option<u32>,
  #[serde(default)]
  fit: Fit,
  #[serde(default)]
  without_enlargement: bool,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ResizeArgs {
  Width(u32),
  Options(ResizeOptions),
}

impl Default for ResizeArgs {
  fn default() -> Self {
    ResizeArgs::Options(ResizeOptions::default())
  }
}

pub struct ResizeModifier {
  width: Option<u32>,
  height: Option<u32>,
  fit: Fit,
  without_enlargement: bool,
}

impl ResizeModifier {
  pub fn evaluate(options: Option<&Value>) -> Result<Box<dyn ImageModifier>, ModifierError> {
    let opts = match util::options_or_default::<ResizeArgs>(options)? {
      ResizeArgs::Width(width) => ResizeOptions {
        width: Some(width),
        ..ResizeOptions::default()
      },
      ResizeArgs::Options(opts) => opts,
    };

    Ok(Box::new(ResizeModifier {
      width: opts.width.map(|w| util::check_dimension("width", w)).transpose()?,
      height: opts.height.map(|h| util::check_dimension("height", h)).transpose()?,
      fit: opts.fit,
      without_enlargement: opts.without_enlargement,
    }))
  }

  /// Target size for the image, keeping the aspect ratio when only one side was requested.
  fn target(&self, width: u32, height: u32) -> Option<(u32, u32)> {
    let aspect = util::aspect(width, height);

    match (self.width, self.height) {
      (None, None) => None,
      (Some(w), None) => Some((w, scaled(w as f64 / aspect))),
      (None, Some(h)) => Some((scaled(h as f64 * aspect), h)),
      (Some(w), Some(h)) => Some((w, h)),
    }
  }
}

fn scaled(value: f64) -> u32 {
  (value.round() as u32).max(1)
}

/// Smallest size keeping the source aspect ratio that still covers `width`x`height`.
fn covering_size(
  source_width: u32,
  source_height: u32,
  width: u32,
  height: u32,
) -> Result<(u32, u32), ModifierError> {
  let scale = (width as f64 / source_width as f64).max(height as f64 / source_height as f64);
  util::check_size(
    scaled(source_width as f64 * scale),
    scaled(source_height as f64 * scale),
  )
}

impl ImageModifier for ResizeModifier {
  fn apply(&self, img: &DynamicImage) -> Result<Option<DynamicImage>, ModifierError> {
    let (source_width, source_height) = (img.width(), img.height());
    let (width, height) = match self.target(source_width, source_height) {
      Some(t) => t,
      None => return Ok(None),
    };

    if self.without_enlargement && width >= source_width && height >= source_height {
      return Ok(None);
    }

    let (width, height) = util::check_size(width, height)?;

    // A single requested side leaves nothing for `fit` to decide
    if self.width.is_none() || self.height.is_none() {
      return Ok(Some(img.resize_exact(width, height, FilterType::Lanczos3)));
    }

    let resized = match self.fit {
      Fit::Fill => img.resize_exact(width, height, FilterType::Lanczos3),
      Fit::Inside => img.resize(width, height, FilterType::Lanczos3),
      Fit::Cover => {
        let (new_width, new_height) = covering_size(source_width, source_height, width, height)?;
        let covered = img.resize_exact(new_width, new_height, FilterType::Lanczos3);
        let x = new_width.saturating_sub(width) / 2;
        let y = new_height.saturating_sub(height) / 2;
        covered.crop_imm(x, y, width, height)
      }
      Fit::Outside => {
        let (new_width, new_height) = covering_size(source_width, source_height, width, height)?;
        img.resize_exact(new_width, new_height, FilterType::Lanczos3)
      }
      Fit::Contain => {
        let fitted = img.resize(width, height, FilterType::Lanczos3);
        let mut canvas = RgbaImage::new(width, height);
        let x = (width - fitted.width()) / 2;
        let y = (height - fitted.height()) / 2;
        imageops::overlay(&mut canvas, &fitted.to_rgba8(), x as i64, y as i64);
        DynamicImage::ImageRgba8(canvas)
      }
    };

    Ok(Some(resized))
  }
}
