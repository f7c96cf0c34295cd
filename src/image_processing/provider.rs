use async_trait::async_trait;
use bytes::Bytes;
use image::{DynamicImage, ImageReader, RgbaImage};
use resvg::tiny_skia::Pixmap;
use resvg::usvg;
use rayon::{ThreadPool, ThreadPoolBuilder};
use serde_json::Value;
use std::io::Cursor;
use std::sync::Arc;
use thiserror::Error;
use tracing::error;

use crate::image_modifier::{self, util, ModifierError, OutputFormat};

#[derive(Error, Debug)]
pub enum TransformError {
  #[error("unsupported operation: {0}")]
  UnsupportedOperation(String),
  #[error("failed to decode image: {0}")]
  Decode(#[source] image::ImageError),
  #[error("failed to render svg: {0}")]
  Svg(String),
  #[error("failed to encode image: {0}")]
  Encode(#[source] image::ImageError),
  #[error("operation {operation} failed: {source}")]
  Operation {
    operation: String,
    #[source]
    source: ModifierError,
  },
  #[error("transform worker stopped before finishing")]
  WorkerLost,
}

/// Source of image handles. Loading is lazy, nothing is decoded until an operation runs.
pub trait ImageProvider: Send + Sync {
  fn load(&self, data: Bytes) -> Box<dyn ImageHandle>;
}

#[async_trait]
pub trait ImageHandle: Send {
  /// Whether `operation` names something this handle can run.
  fn supports(&self, operation: &str) -> bool;

  async fn apply(
    self: Box<Self>,
    operation: &str,
    options: Option<Value>,
  ) -> Result<Box<dyn ImageHandle>, TransformError>;

  async fn to_buffer(self: Box<Self>) -> Result<Vec<u8>, TransformError>;
}

/// Provider backed by the `image` crate, running pixel work on a dedicated thread pool.
pub struct RasterProvider {
  pool: Arc<ThreadPool>,
}

impl RasterProvider {
  pub fn new(concurrency: usize) -> anyhow::Result<Self> {
    let pool = ThreadPoolBuilder::new()
      .num_threads(concurrency)
      .thread_name(|i| format!("transform-{}", i))
      .panic_handler(|_| error!("image transform worker panicked"))
      .build()?;

    Ok(Self {
      pool: Arc::new(pool),
    })
  }
}

impl ImageProvider for RasterProvider {
  fn load(&self, data: Bytes) -> Box<dyn ImageHandle> {
    Box::new(RasterImage {
      pool: self.pool.clone(),
      source: Source::Encoded(data),
      output: OutputFormat::default(),
    })
  }
}

enum Source {
  Encoded(Bytes),
  Decoded(DynamicImage),
}

impl Source {
  fn decode(self) -> Result<DynamicImage, TransformError> {
    let data = match self {
      Source::Decoded(img) => return Ok(img),
      Source::Encoded(data) => data,
    };

    if is_svg(&data) {
      return render_svg(&data);
    }

    ImageReader::new(Cursor::new(data.as_ref()))
      .with_guessed_format()
      .map_err(|e| TransformError::Decode(e.into()))?
      .decode()
      .map_err(TransformError::Decode)
  }
}

fn is_svg(data: &[u8]) -> bool {
  let head = &data[..data.len().min(512)];
  let text = String::from_utf8_lossy(head);
  let text = text.trim_start_matches('\u{feff}').trim_start();
  text.starts_with("<svg")
    || text.starts_with("<!DOCTYPE svg")
    || (text.starts_with("<?xml") && text.contains("<svg"))
}

/// Rasterizes an SVG document at its intrinsic size.
fn render_svg(data: &[u8]) -> Result<DynamicImage, TransformError> {
  let tree = usvg::Tree::from_data(data, &usvg::Options::default())
    .map_err(|e| TransformError::Svg(e.to_string()))?;

  let size = tree.size().to_int_size();
  let (width, height) = util::check_size(size.width(), size.height())
    .map_err(|e| TransformError::Svg(e.to_string()))?;

  let mut pixmap = Pixmap::new(width, height)
    .ok_or_else(|| TransformError::Svg(format!("cannot allocate {}x{} canvas", width, height)))?;
  resvg::render(&tree, usvg::Transform::default(), &mut pixmap.as_mut());

  // tiny-skia keeps premultiplied alpha, `image` expects straight alpha
  let pixels = pixmap
    .pixels()
    .iter()
    .flat_map(|p| {
      let c = p.demultiply();
      [c.red(), c.green(), c.blue(), c.alpha()]
    })
    .collect();

  RgbaImage::from_raw(width, height, pixels)
    .map(DynamicImage::ImageRgba8)
    .ok_or_else(|| TransformError::Svg("rendered buffer has the wrong size".to_owned()))
}

pub struct RasterImage {
  pool: Arc<ThreadPool>,
  source: Source,
  output: OutputFormat,
}

/// Runs `work` on the pool and waits for its result without blocking the runtime.
async fn run<T, F>(pool: &ThreadPool, work: F) -> Result<T, TransformError>
where
  T: Send + 'static,
  F: FnOnce() -> Result<T, TransformError> + Send + 'static,
{
  let (send, recv) = tokio::sync::oneshot::channel();
  pool.spawn(move || {
    let _ = send.send(work());
  });

  recv.await.map_err(|_| TransformError::WorkerLost)?
}

#[async_trait]
impl ImageHandle for RasterImage {
  fn supports(&self, operation: &str) -> bool {
    image_modifier::is_supported(operation)
  }

  async fn apply(
    self: Box<Self>,
    operation: &str,
    options: Option<Value>,
  ) -> Result<Box<dyn ImageHandle>, TransformError> {
    let evaluate = image_modifier::lookup(operation)
      .ok_or_else(|| TransformError::UnsupportedOperation(operation.to_owned()))?;
    let name = operation.to_owned();
    let modifier = evaluate(options.as_ref()).map_err(|source| TransformError::Operation {
      operation: name.clone(),
      source,
    })?;

    let RasterImage {
      pool,
      source,
      output,
    } = *self;

    let (image, output) = run(&pool, move || {
      let image = source.decode()?;
      let output = modifier.output_format().unwrap_or(output);
      let image = match modifier.apply(&image) {
        Ok(Some(modified)) => modified,
        Ok(None) => image,
        Err(source) => {
          return Err(TransformError::Operation {
            operation: name,
            source,
          })
        }
      };
      Ok((image, output))
    })
    .await?;

    Ok(Box::new(RasterImage {
      pool,
      source: Source::Decoded(image),
      output,
    }))
  }

  async fn to_buffer(self: Box<Self>) -> Result<Vec<u8>, TransformError> {
    let RasterImage {
      pool,
      source,
      output,
    } = *self;

    run(&pool, move || {
      let image = source.decode()?;
      output.encode(&image).map_err(TransformError::Encode)
    })
    .await
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use image::ImageFormat;
  use serde_json::json;

  fn png(width: u32, height: u32) -> Bytes {
    let mut buf = Cursor::new(Vec::new());
    DynamicImage::new_rgb8(width, height)
      .write_to(&mut buf, ImageFormat::Png)
      .unwrap();
    Bytes::from(buf.into_inner())
  }

  fn provider() -> RasterProvider {
    RasterProvider::new(1).unwrap()
  }

  #[tokio::test]
  async fn resize_then_encode_as_jpeg() {
    let handle = provider().load(png(40, 20));
    assert!(handle.supports("resize"));

    let resized = handle.apply("resize", Some(json!({ "width": 10 }))).await.unwrap();
    let data = resized.to_buffer().await.unwrap();

    assert_eq!(&data[0..2], &[0xFF, 0xD8]);
    let decoded = image::load_from_memory(&data).unwrap();
    assert_eq!((decoded.width(), decoded.height()), (10, 5));
  }

  #[tokio::test]
  async fn handles_chain_and_keep_selected_format() {
    let handle = provider().load(png(8, 8));
    let handle = handle.apply("png", None).await.unwrap();
    let handle = handle.apply("rotate", Some(json!(90))).await.unwrap();
    let data = handle.to_buffer().await.unwrap();

    assert_eq!(&data[1..4], b"PNG");
  }

  #[tokio::test]
  async fn unsupported_operation_is_never_run() {
    let handle = provider().load(png(8, 8));
    assert!(!handle.supports("toBuffer"));

    let err = handle.apply("toBuffer", None).await.err().unwrap();
    assert!(matches!(err, TransformError::UnsupportedOperation(_)));
  }

  #[tokio::test]
  async fn garbage_bytes_fail_to_decode() {
    let handle = provider().load(Bytes::from_static(b"definitely not an image"));
    let err = handle.apply("flip", None).await.err().unwrap();
    assert!(matches!(err, TransformError::Decode(_)));
  }

  const SVG: &[u8] = br#"<?xml version="1.0"?>
<svg xmlns="http://www.w3.org/2000/svg" width="20" height="10">
  <rect width="20" height="10" fill="red"/>
</svg>"#;

  #[test]
  fn sniffs_svg_documents() {
    assert!(is_svg(SVG));
    assert!(is_svg(b"  <svg xmlns=\"http://www.w3.org/2000/svg\"/>"));
    assert!(!is_svg(b"<?xml version=\"1.0\"?><note/>"));
    assert!(!is_svg(&png(2, 2)));
  }

  #[tokio::test]
  async fn svg_is_rasterized_before_transforming() {
    let handle = provider().load(Bytes::from_static(SVG));
    let handle = handle.apply("resize", Some(json!({ "width": 10 }))).await.unwrap();
    let data = handle.to_buffer().await.unwrap();

    let decoded = image::load_from_memory(&data).unwrap();
    assert_eq!((decoded.width(), decoded.height()), (10, 5));
    let pixel = decoded.to_rgb8().get_pixel(5, 2).0;
    assert!(pixel[0] > 200 && pixel[1] < 60, "expected red, got {pixel:?}");
  }

  #[tokio::test]
  async fn broken_svg_fails_to_render() {
    let handle = provider().load(Bytes::from_static(b"<svg xmlns=\"http://www.w3.org/2000/svg\""));
    let err = handle.apply("flip", None).await.err().unwrap();
    assert!(matches!(err, TransformError::Svg(_)));
  }

  #[tokio::test]
  async fn bad_arguments_name_the_operation() {
    let handle = provider().load(png(8, 8));
    let err = handle
      .apply("extract", Some(json!({ "left": 4, "top": 4, "width": 8, "height": 8 })))
      .await
      .err()
      .unwrap();

    match err {
      TransformError::Operation { operation, .. } => assert_eq!(operation, "extract"),
      other => panic!("unexpected error: {other}"),
    }
  }
}
