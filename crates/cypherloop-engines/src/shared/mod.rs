//! Helpers shared by the HTTP engines.

pub mod payload_builder;
pub mod response_parser;
pub mod url_builder;

use anyhow::{anyhow, Result};
use cypherloop_core::config::{is_unresolved_placeholder, EngineConfig};

pub use payload_builder::PayloadBuilder;
pub use response_parser::ResponseParser;
pub use url_builder::UrlBuilder;

/// The API credential of an engine, rejecting placeholders that never resolved.
pub fn bearer_token(config: &EngineConfig) -> Result<&str> {
    let token = config
        .parameter_str("bearer_token")
        .ok_or_else(|| anyhow!("Bearer token not found in configuration"))?;
    if token.trim().is_empty() || is_unresolved_placeholder(token) {
        return Err(anyhow!(
            "Bearer token for engine '{}' is not set (got '{}')",
            config.name,
            if token.trim().is_empty() { "" } else { token }
        ));
    }
    Ok(token)
}
