use std::time::Duration;

use anyhow::{Context, Result};

/// Upload ceiling shared with the upload widget: 20 MiB.
const DEFAULT_MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;

/// Application configuration loaded from environment variables.
/// Fails at startup if required variables are missing.
#[derive(Debug, Clone)]
pub struct Config {
    pub redis_url: String,
    /// Prefix that isolates this service's keys inside a shared Redis.
    pub kv_namespace: String,
    pub s3_bucket: String,
    pub s3_endpoint: String,
    pub aws_access_key_id: String,
    pub aws_secret_access_key: String,
    pub anthropic_api_key: String,
    pub pdftoppm_path: String,
    pub render_dpi: u32,
    /// Longest a single `pdftoppm` run may take before it is killed.
    pub render_timeout: Duration,
    /// How long a finished submission's status stays pollable.
    pub status_retention: Duration,
    pub max_upload_bytes: usize,
    pub port: u16,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            redis_url: require_env("REDIS_URL")?,
            kv_namespace: optional_env("KV_NAMESPACE", "analyzer"),
            s3_bucket: require_env("S3_BUCKET")?,
            s3_endpoint: require_env("S3_ENDPOINT")?,
            aws_access_key_id: require_env("AWS_ACCESS_KEY_ID")?,
            aws_secret_access_key: require_env("AWS_SECRET_ACCESS_KEY")?,
            anthropic_api_key: require_env("ANTHROPIC_API_KEY")?,
            pdftoppm_path: optional_env("PDFTOPPM_PATH", "pdftoppm"),
            render_dpi: optional_env("RENDER_DPI", "144")
                .parse::<u32>()
                .context("RENDER_DPI must be a positive integer")?,
            render_timeout: Duration::from_secs(
                optional_env("RENDER_TIMEOUT_SECS", "60")
                    .parse::<u64>()
                    .context("RENDER_TIMEOUT_SECS must be a number of seconds")?,
            ),
            status_retention: Duration::from_secs(
                optional_env("STATUS_RETENTION_SECS", "900")
                    .parse::<u64>()
                    .context("STATUS_RETENTION_SECS must be a number of seconds")?,
            ),
            max_upload_bytes: match std::env::var("MAX_UPLOAD_BYTES") {
                Ok(raw) => raw
                    .parse::<usize>()
                    .context("MAX_UPLOAD_BYTES must be a byte count")?,
                Err(_) => DEFAULT_MAX_UPLOAD_BYTES,
            },
            port: optional_env("PORT", "8080")
                .parse::<u16>()
                .context("PORT must be a valid port number")?,
            rust_log: optional_env("RUST_LOG", "info"),
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn optional_env(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}
