pub mod aggregator;
pub mod analyzer;
pub mod export;
pub mod handlers;
pub mod orchestrator;
pub mod prompts;
pub mod queue;
