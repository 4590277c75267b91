use anyhow::{anyhow, Context, Result};

use crate::chat::session::ContextPolicy;
use crate::llm_client::DEFAULT_BASE_URL;

/// Application configuration loaded from environment variables.
/// Startup aborts if required variables are missing or malformed.
#[derive(Debug, Clone)]
pub struct Config {
    pub anthropic_api_key: String,
    pub anthropic_base_url: String,
    pub port: u16,
    pub rust_log: String,
    pub chat_context_policy: ContextPolicy,
    /// Request body limit for resume uploads, in bytes.
    pub max_upload_bytes: usize,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let max_upload_mb = optional_env("MAX_UPLOAD_MB", "10")
            .parse::<usize>()
            .context("MAX_UPLOAD_MB must be a whole number of megabytes")?;

        Ok(Config {
            anthropic_api_key: require_env("ANTHROPIC_API_KEY")?,
            anthropic_base_url: optional_env("ANTHROPIC_BASE_URL", DEFAULT_BASE_URL),
            port: optional_env("PORT", "8080")
                .parse::<u16>()
                .context("PORT must be a valid port number")?,
            rust_log: optional_env("RUST_LOG", "info"),
            chat_context_policy: optional_env("CHAT_CONTEXT_POLICY", "snapshot")
                .parse::<ContextPolicy>()
                .map_err(|e| anyhow!(e))
                .context("CHAT_CONTEXT_POLICY must be 'snapshot' or 'live'")?,
            max_upload_bytes: max_upload_mb * 1024 * 1024,
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn optional_env(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}
