use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;

#[derive(Deserialize)]
pub struct Config {
  pub app: AppConfig,
}

#[derive(Deserialize)]
pub struct AppConfig {
  pub listen: String,
  pub metrics_listen: String,
  /// Number of worker threads used for decoding, transforming and encoding.
  pub transform_concurrency: usize,
  /// Upper bound for the whole multipart body. Keep it above the 5mb upload limit
  /// so oversized files are reported by the upload guards.
  pub max_body_size_mb: usize,
  pub request_timeout_secs: Option<u64>,
  pub enable_openapi: Option<bool>,
}

pub fn parse(config_path: &str) -> Result<Config> {
  let toml_str = fs::read_to_string(config_path)
    .with_context(|| format!("failed to read config file: {}", config_path))?;
  let cfg: Config = toml::from_str(&toml_str)
    .with_context(|| format!("failed to deserialize config: {}", config_path))?;

  Ok(cfg)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn parses_app_section() {
    let cfg: Config = toml::from_str(
      r#"
      [app]
      listen = "0.0.0.0:3000"
      metrics_listen = "0.0.0.0:9090"
      transform_concurrency = 2
      max_body_size_mb = 10
      "#,
    )
    .unwrap();

    assert_eq!(cfg.app.listen, "0.0.0.0:3000");
    assert_eq!(cfg.app.transform_concurrency, 2);
    assert_eq!(cfg.app.max_body_size_mb, 10);
    assert!(cfg.app.request_timeout_secs.is_none());
    assert!(cfg.app.enable_openapi.is_none());
  }

  #[test]
  fn missing_file_is_an_error() {
    let err = parse("does-not-exist.toml").err().unwrap();
    assert!(err.to_string().contains("does-not-exist.toml"));
  }
}
