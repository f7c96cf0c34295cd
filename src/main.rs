use pixel_ops::config;
use pixel_ops::http;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  // Load config
  let config_path = std::env::args()
    .nth(1)
    .unwrap_or_else(|| "config.toml".to_owned());
  let cfg = config::parse(&config_path)?;

  // Initialize tracing
  tracing_subscriber::registry()
    .with(
      tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "pixel_ops=debug,tower_http=debug".into()),
    )
    .with(
      tracing_subscriber::fmt::layer()
        .with_target(false)
        .compact(),
    )
    .init();

  // Serve
  let router = http::bootstrap(&cfg)?;

  tokio::try_join!(
    http::serve(router, &cfg.app.listen),
    http::serve_metrics(&cfg.app.metrics_listen),
  )?;

  Ok(())
}
