pub mod anthropic;
pub mod openai;
pub mod oracle;
pub mod prompts;
pub mod shared;

use anyhow::{anyhow, Result};
use cypherloop_core::config::EngineConfig;
use cypherloop_core::traits::Engine;

use crate::anthropic::AnthropicEngine;
use crate::openai::OpenAIEngine;

pub use oracle::LlmOracle;

/// Create an LLM engine based on the provided configuration
pub fn create_engine(engine_config: &EngineConfig) -> Result<Box<dyn Engine>> {
    match engine_config.engine.as_str() {
        // OpenRouter exposes the OpenAI chat-completions protocol.
        "openai" | "openrouter" => Ok(Box::new(OpenAIEngine::new(engine_config.clone())?)),
        "anthropic" => Ok(Box::new(AnthropicEngine::new(engine_config.clone())?)),
        _ => Err(anyhow!(
            "Unsupported engine type: {}",
            engine_config.engine
        )),
    }
}
