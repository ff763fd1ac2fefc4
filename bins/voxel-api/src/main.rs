mod handlers;
mod metrics;
mod routes;

use axum::{extract::DefaultBodyLimit, Router};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;
use voxel_core::docker::DockerExecutor;
use voxel_core::executor::{Executor, LocalExecutor};
use voxel_core::job::JobIsolator;
use voxel_core::{Config, Dispatcher, ModelRegistry};

pub struct AppState {
    pub dispatcher: Dispatcher,
    pub registry: Arc<ModelRegistry>,
}

#[tokio::main]
async fn main() {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    // Initialize tracing subscriber
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    info!("voxel gateway booting...");

    // Initialize metrics
    metrics::init_metrics();
    info!("Metrics registry initialized");

    let config = Config::from_env();

    // Load the model registry
    let registry = ModelRegistry::load_from_file(&config.model_config_path).unwrap_or_else(|e| {
        panic!(
            "Failed to load model registry from {}: {}",
            config.model_config_path, e
        );
    });
    info!(
        "Loaded model registry: {} models = {:?}",
        registry.len(),
        registry.model_ids()
    );
    let registry = Arc::new(registry);

    // Make sure the job work root exists before the first request
    std::fs::create_dir_all(&config.work_root)
        .unwrap_or_else(|e| panic!("Failed to create work root {}: {}", config.work_root, e));

    // Select the execution substrate
    let executor: Arc<dyn Executor> = match config.executor.as_str() {
        "docker" => {
            let docker = DockerExecutor::connect(&config)
                .unwrap_or_else(|e| panic!("Failed to initialize Docker executor: {}", e));
            info!("Executor: docker");
            Arc::new(docker)
        }
        "local" => {
            let entrypoint = config
                .local_entrypoint
                .clone()
                .expect("EXECUTOR=local requires LOCAL_ENTRYPOINT");
            info!("Executor: local ({})", entrypoint);
            Arc::new(LocalExecutor::new(entrypoint))
        }
        other => panic!("Unknown EXECUTOR '{}' (expected docker or local)", other),
    };

    let dispatcher = Dispatcher::new(
        registry.clone(),
        executor,
        JobIsolator::new(&config.work_root),
        &config,
    );

    let state = Arc::new(AppState {
        dispatcher,
        registry,
    });

    // Build router
    let app = Router::new()
        .merge(routes::routes())
        .layer(DefaultBodyLimit::max(config.max_upload_bytes))
        .with_state(state);

    // Start server
    let port = std::env::var("PORT").unwrap_or_else(|_| "5000".to_string());
    let addr = format!("0.0.0.0:{}", port);
    let listener = TcpListener::bind(&addr)
        .await
        .expect("Failed to bind to address");

    info!("HTTP server listening on {}", addr);
    info!("Ready to accept inference requests");

    axum::serve(listener, app).await.expect("Server error");
}
