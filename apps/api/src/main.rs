mod chat;
mod config;
mod errors;
mod llm_client;
mod models;
mod routes;
mod screening;
mod state;

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::chat::session::ChatSessionManager;
use crate::config::Config;
use crate::llm_client::LlmClient;
use crate::routes::build_router;
use crate::screening::analyzer::LlmResumeAnalyzer;
use crate::screening::orchestrator::BatchOrchestrator;
use crate::screening::queue::ResumeQueue;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (aborts on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Screener API v{}", env!("CARGO_PKG_VERSION"));

    // One client for both analysis and chat
    let llm = LlmClient::new(
        config.anthropic_api_key.clone(),
        config.anthropic_base_url.clone(),
    );
    info!(
        "LLM client initialized (model: {}, base: {})",
        llm_client::MODEL,
        config.anthropic_base_url
    );

    let queue = Arc::new(ResumeQueue::new());
    let analyzer = Arc::new(LlmResumeAnalyzer(llm.clone()));
    let orchestrator = Arc::new(BatchOrchestrator::new(queue.clone(), analyzer));

    let chat = ChatSessionManager::new(Arc::new(llm), config.chat_context_policy);
    info!("Chat context policy: {:?}", config.chat_context_policy);

    let state = AppState::new(config.clone(), queue, orchestrator, chat);

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
