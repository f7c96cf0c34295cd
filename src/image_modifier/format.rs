use image::codecs::jpeg::JpegEncoder;
use image::codecs::webp::WebPEncoder;
use image::{DynamicImage, ImageFormat};
use serde::Deserialize;
use serde_json::Value;
use std::io::Cursor;

use super::{ImageModifier, ModifierError};
use crate::image_modifier::util;

pub const DEFAULT_QUALITY: u8 = 80;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
  Jpeg { quality: u8 },
  Png,
  WebP,
  Gif,
}

impl Default for OutputFormat {
  fn default() -> Self {
    OutputFormat::Jpeg {
      quality: DEFAULT_QUALITY,
    }
  }
}

impl OutputFormat {
  pub fn from_name(name: &str, quality: Option<u8>) -> Option<Self> {
    match name.to_lowercase().as_str() {
      "jpeg" | "jpg" => Some(OutputFormat::Jpeg {
        quality: quality.unwrap_or(DEFAULT_QUALITY),
      }),
      "png" => Some(OutputFormat::Png),
      "webp" => Some(OutputFormat::WebP),
      "gif" => Some(OutputFormat::Gif),
      _ => None,
    }
  }

  pub fn encode(&self, img: &DynamicImage) -> Result<Vec<u8>, image::ImageError> {
    let mut buf = Cursor::new(Vec::new());

    match self {
      OutputFormat::Jpeg { quality } => {
        let encoder = JpegEncoder::new_with_quality(&mut buf, *quality);
        img.to_rgb8().write_with_encoder(encoder)?;
      }
      OutputFormat::Png => img.write_to(&mut buf, ImageFormat::Png)?,
      OutputFormat::WebP => {
        let encoder = WebPEncoder::new_lossless(&mut buf);
        img.to_rgba8().write_with_encoder(encoder)?;
      }
      OutputFormat::Gif => {
        DynamicImage::ImageRgba8(img.to_rgba8()).write_to(&mut buf, ImageFormat::Gif)?
      }
    }

    Ok(buf.into_inner())
  }
}

#[derive(Deserialize, Default)]
struct JpegOptions {
  quality: Option<u8>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ToFormatArgs {
  Name(String),
  Options { format: String, quality: Option<u8> },
}

fn check_quality(quality: Option<u8>) -> Result<Option<u8>, ModifierError> {
  match quality {
    Some(q) if !(1..=100).contains(&q) => Err(ModifierError::InvalidOptions(format!(
      "quality {} must be between 1 and 100",
      q
    ))),
    q => Ok(q),
  }
}

/// Changes the encoding of the final buffer, leaving pixels as they are.
pub struct FormatModifier(OutputFormat);

impl FormatModifier {
  pub fn evaluate_jpeg(options: Option<&Value>) -> Result<Box<dyn ImageModifier>, ModifierError> {
    let opts: JpegOptions = util::options_or_default(options)?;
    Ok(Box::new(FormatModifier(OutputFormat::Jpeg {
      quality: check_quality(opts.quality)?.unwrap_or(DEFAULT_QUALITY),
    })))
  }

  pub fn evaluate_png(_options: Option<&Value>) -> Result<Box<dyn ImageModifier>, ModifierError> {
    Ok(Box::new(FormatModifier(OutputFormat::Png)))
  }

  pub fn evaluate_webp(_options: Option<&Value>) -> Result<Box<dyn ImageModifier>, ModifierError> {
    Ok(Box::new(FormatModifier(OutputFormat::WebP)))
  }

  pub fn evaluate_gif(_options: Option<&Value>) -> Result<Box<dyn ImageModifier>, ModifierError> {
    Ok(Box::new(FormatModifier(OutputFormat::Gif)))
  }

  pub fn evaluate_to_format(
    options: Option<&Value>,
  ) -> Result<Box<dyn ImageModifier>, ModifierError> {
    let (name, quality) = match util::required_options::<ToFormatArgs>("toFormat", options)? {
      ToFormatArgs::Name(name) => (name, None),
      ToFormatArgs::Options { format, quality } => (format, quality),
    };

    let format = OutputFormat::from_name(&name, check_quality(quality)?)
      .ok_or_else(|| ModifierError::InvalidOptions(format!("unsupported output format: {}", name)))?;

    Ok(Box::new(FormatModifier(format)))
  }
}

impl ImageModifier for FormatModifier {
  fn apply(&self, _img: &DynamicImage) -> Result<Option<DynamicImage>, ModifierError> {
    Ok(None)
  }

  fn output_format(&self) -> Option<OutputFormat> {
    Some(self.0)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn default_output_is_jpeg() {
    let data = OutputFormat::default()
      .encode(&DynamicImage::new_rgba8(10, 10))
      .unwrap();
    assert_eq!(&data[0..2], &[0xFF, 0xD8]);
  }

  #[test]
  fn png_and_webp_magic() {
    let img = DynamicImage::new_rgb8(10, 10);
    let png = OutputFormat::Png.encode(&img).unwrap();
    assert_eq!(&png[0..8], &[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A]);
    let webp = OutputFormat::WebP.encode(&img).unwrap();
    assert_eq!(&webp[0..4], b"RIFF");
    let gif = OutputFormat::Gif.encode(&img).unwrap();
    assert_eq!(&gif[0..3], b"GIF");
  }

  #[test]
  fn to_format_accepts_name_or_object() {
    let by_name = FormatModifier::evaluate_to_format(Some(&json!("PNG"))).unwrap();
    assert_eq!(by_name.output_format(), Some(OutputFormat::Png));

    let by_object =
      FormatModifier::evaluate_to_format(Some(&json!({ "format": "jpg", "quality": 50 }))).unwrap();
    assert_eq!(by_object.output_format(), Some(OutputFormat::Jpeg { quality: 50 }));
  }

  #[test]
  fn to_format_rejects_unknown_formats() {
    assert!(FormatModifier::evaluate_to_format(Some(&json!("tiff"))).is_err());
    assert!(FormatModifier::evaluate_to_format(None).is_err());
  }

  #[test]
  fn jpeg_quality_bounds() {
    assert!(FormatModifier::evaluate_jpeg(Some(&json!({ "quality": 0 }))).is_err());
    let modifier = FormatModifier::evaluate_jpeg(Some(&json!({ "quality": 95 }))).unwrap();
    assert_eq!(modifier.output_format(), Some(OutputFormat::Jpeg { quality: 95 }));
  }
}
