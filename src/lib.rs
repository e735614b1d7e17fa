pub mod ai;
pub mod api;
pub mod archive;
pub mod config;
pub mod core_state;
pub mod db;
pub mod models;
pub mod pipeline;

use std::sync::Arc;

use thiserror::Error;
use tracing_subscriber::EnvFilter;

#[derive(Error, Debug)]
pub enum StartupError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Storage error: {0}")]
    Store(#[from] db::StoreError),

    #[error("AI client error: {0}")]
    Ai(#[from] ai::AiError),

    #[error("Server error: {0}")]
    Io(#[from] std::io::Error),
}

/// Start the service and block until Ctrl-C.
///
/// Blocking HTTP clients are built and dropped outside the async runtime.
pub fn run() -> Result<(), StartupError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .init();

    tracing::info!("{} starting v{}", config::APP_NAME, config::APP_VERSION);

    let config = config::AppConfig::from_env()?;
    if config.ai.api_key.is_none() {
        tracing::warn!("No API key configured; analysis requests will report KEY_REQUIRED");
    }

    let store = db::open_store(&config.store)?;
    let ai: Arc<dyn ai::AssessmentAi> = Arc::new(ai::GeminiClient::new(&config.ai)?);
    let core = Arc::new(core_state::CoreState::initialize(store, ai));

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(api::serve(core.clone(), config.bind))?;
    drop(runtime);

    tracing::info!(records = core.record_count(), "Stopped");
    Ok(())
}
