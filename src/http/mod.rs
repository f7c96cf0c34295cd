use anyhow::{Context, Result};
use axum::{
  extract::{DefaultBodyLimit, MatchedPath, Request, State},
  middleware::{self, Next},
  response::{IntoResponse, Response},
  routing::{get, post},
  Router,
};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::any::Any;
use std::future::ready;
use std::sync::Arc;
use tokio::signal;
use tokio::time::{Duration, Instant};
use tower_http::{
  catch_panic::CatchPanicLayer,
  trace::{self, TraceLayer},
};
use tracing::Level;
use utoipa::OpenApi;
use utoipa_redoc::{Redoc, Servable};

use crate::config::Config;
use crate::http::error::AppError;
use crate::image_processing::{ImageProvider, RasterProvider};

pub mod error;
mod transform_image;
pub mod upload;

const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 60;

#[derive(OpenApi)]
#[openapi(
  paths(transform_image::transform_image),
  components(schemas(transform_image::TransformForm, error::ErrorResponse)),
  info(
    title = "Pixel Ops API",
    version = "0.1.0",
    description = "Applies a named image operation to an uploaded image"
  )
)]
struct ApiDoc;

#[derive(Clone)]
pub(crate) struct AppState {
  pub(crate) provider: Arc<dyn ImageProvider>,
}

pub fn bootstrap(cfg: &Config) -> Result<Router> {
  let provider = RasterProvider::new(cfg.app.transform_concurrency)
    .context("failed to start image transform pool")?;

  Ok(router(cfg, Arc::new(provider)))
}

/// Builds the application router around any image provider.
pub fn router(cfg: &Config, provider: Arc<dyn ImageProvider>) -> Router {
  let state = AppState { provider };

  let api = Router::new()
    .route("/v1/sharp", post(transform_image::transform_without_operation))
    .route("/v1/sharp/", post(transform_image::transform_without_operation))
    .route("/v1/sharp/:operation", post(transform_image::transform_image))
    .layer(DefaultBodyLimit::max(cfg.app.max_body_size_mb * 1000 * 1000));

  let mut app = Router::new().merge(api).with_state(state);

  // Conditionally add OpenAPI routes if enabled
  if cfg.app.enable_openapi.unwrap_or(false) {
    app = app
      .merge(Redoc::with_url("/redoc", ApiDoc::openapi()))
      .route(
        "/api-docs/openapi.json",
        get(|| async { axum::Json(ApiDoc::openapi()) }),
      );
  }

  let timeout = Duration::from_secs(
    cfg
      .app
      .request_timeout_secs
      .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS),
  );

  app.layer((
    middleware::from_fn(track_metrics),
    TraceLayer::new_for_http()
      .make_span_with(trace::DefaultMakeSpan::new().level(Level::INFO))
      .on_response(trace::DefaultOnResponse::new().level(Level::INFO)),
    middleware::from_fn_with_state(timeout, enforce_timeout),
    CatchPanicLayer::custom(panic_response),
  ))
}

/// Gives up on requests running longer than `timeout`, answering like any other failure.
async fn enforce_timeout(State(timeout): State<Duration>, req: Request, next: Next) -> Response {
  match tokio::time::timeout(timeout, next.run(req)).await {
    Ok(response) => response,
    Err(_) => AppError::Unknown(format!("request timed out after {:?}", timeout)).into_response(),
  }
}

fn panic_response(err: Box<dyn Any + Send + 'static>) -> Response {
  let details = if let Some(s) = err.downcast_ref::<String>() {
    s.clone()
  } else if let Some(s) = err.downcast_ref::<&str>() {
    s.to_string()
  } else {
    "unknown panic payload".to_owned()
  };

  AppError::Unknown(format!("request handler panicked: {}", details)).into_response()
}

pub async fn serve(router: Router, listen: &str) -> Result<()> {
  let listener = tokio::net::TcpListener::bind(listen)
    .await
    .with_context(|| format!("failed to bind to address: {}", listen))?;
  tracing::info!("API server listening on {}", listen);

  axum::serve(listener, router)
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("error running HTTP server")
}

async fn healthz() -> &'static str {
  "pong"
}

async fn shutdown_signal() {
  let ctrl_c = async {
    if let Err(e) = signal::ctrl_c().await {
      tracing::error!("failed to install Ctrl+C handler: {}", e);
      std::future::pending::<()>().await;
    }
  };

  #[cfg(unix)]
  let terminate = async {
    match signal::unix::signal(signal::unix::SignalKind::terminate()) {
      Ok(mut sig) => {
        sig.recv().await;
      }
      Err(e) => {
        tracing::error!("failed to install signal handler: {}", e);
        std::future::pending::<()>().await;
      }
    }
  };

  #[cfg(not(unix))]
  let terminate = std::future::pending::<()>();

  tokio::select! {
      _ = ctrl_c => {},
      _ = terminate => {},
  }
}

pub async fn serve_metrics(listen: &str) -> Result<()> {
  let app = metrics_app()?;

  let listener = tokio::net::TcpListener::bind(listen)
    .await
    .with_context(|| format!("failed to bind to address: {}", listen))?;
  axum::serve(listener, app)
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("error running metrics HTTP server")
}

fn metrics_app() -> Result<Router> {
  let recorder_handle = setup_metrics_recorder()?;
  Ok(
    Router::new()
      .route("/metrics", get(move || ready(recorder_handle.render())))
      .route("/healthz", get(healthz)),
  )
}

fn setup_metrics_recorder() -> Result<PrometheusHandle> {
  const EXPONENTIAL_SECONDS: &[f64] = &[
    0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
  ];

  let handle = PrometheusBuilder::new()
    .set_buckets_for_metric(
      Matcher::Full("http_requests_duration_seconds".to_string()),
      EXPONENTIAL_SECONDS,
    )?
    .set_buckets_for_metric(
      Matcher::Full("image_transform_duration_seconds".to_string()),
      EXPONENTIAL_SECONDS,
    )?
    .install_recorder()?;

  Ok(handle)
}

async fn track_metrics(req: Request, next: Next) -> impl IntoResponse {
  let start = Instant::now();
  let path = if let Some(matched_path) = req.extensions().get::<MatchedPath>() {
    matched_path.as_str().to_owned()
  } else {
    req.uri().path().to_owned()
  };
  let method = req.method().clone();

  let response = next.run(req).await;

  let latency = start.elapsed().as_secs_f64();
  let status = response.status().as_u16().to_string();

  let labels = [
    ("method", method.to_string()),
    ("path", path),
    ("status", status),
  ];

  metrics::counter!("http_requests_total", &labels).increment(1);
  metrics::histogram!("http_requests_duration_seconds", &labels).record(latency);

  response
}
