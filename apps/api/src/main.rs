mod analysis;
mod config;
mod convert;
mod errors;
mod kv;
mod llm_client;
mod routes;
mod state;
mod storage;

use anyhow::Result;
use aws_config::Region;
use aws_sdk_s3::config::Credentials;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::analysis::orchestrator::AnalysisDeps;
use crate::analysis::registry::AnalysisRegistry;
use crate::analysis::repository::ResumeRepository;
use crate::config::Config;
use crate::convert::PdftoppmRasterizer;
use crate::kv::RedisKvStore;
use crate::llm_client::{LlmClient, VisionInference};
use crate::routes::build_router;
use crate::state::AppState;
use crate::storage::{ObjectStore, S3ObjectStore};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Analyzer API v{}", env!("CARGO_PKG_VERSION"));

    // Initialize Redis
    let redis = redis::Client::open(config.redis_url.clone())?;
    let kv = RedisKvStore::connect(&redis, &config.kv_namespace).await?;
    info!("Redis connected (namespace: {})", config.kv_namespace);

    // Initialize S3 / MinIO
    let s3 = S3ObjectStore::new(build_s3_client(&config).await, config.s3_bucket.clone());
    s3.ensure_bucket().await?;
    info!("S3 bucket '{}' ready", config.s3_bucket);
    let store: Arc<dyn ObjectStore> = Arc::new(s3);

    // Initialize LLM client
    let llm = LlmClient::new(config.anthropic_api_key.clone())?;
    info!("LLM client initialized (model: {})", llm_client::MODEL);

    let rasterizer = PdftoppmRasterizer::new(
        config.pdftoppm_path.clone(),
        config.render_dpi,
        config.render_timeout,
    );
    info!(
        "PDF rasterizer: {} at {} dpi",
        config.pdftoppm_path, config.render_dpi
    );

    // Build app state
    let state = AppState {
        analysis: AnalysisDeps {
            store: store.clone(),
            rasterizer: Arc::new(rasterizer),
            inference: Arc::new(VisionInference::new(llm, store)),
            repository: ResumeRepository::new(Arc::new(kv)),
        },
        registry: AnalysisRegistry::new(config.status_retention),
        config: config.clone(),
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()); // TODO: restrict origins once the web client has a fixed host

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Constructs an S3 client configured for MinIO (local) or AWS (production).
async fn build_s3_client(config: &Config) -> aws_sdk_s3::Client {
    let credentials = Credentials::new(
        &config.aws_access_key_id,
        &config.aws_secret_access_key,
        None,
        None,
        "analyzer-static",
    );

    let s3_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
        .region(Region::new("us-east-1"))
        .credentials_provider(credentials)
        .endpoint_url(&config.s3_endpoint)
        .load()
        .await;

    aws_sdk_s3::Client::new(&s3_config)
}
