pub mod ask;
pub mod exemplars;
pub mod normalize;
pub mod schema;

use anyhow::Result;
use clap::ArgMatches;
use cypherloop_core::config::AppConfig;

/// Trait for CLI command handlers
#[allow(async_fn_in_trait)]
pub trait CommandHandler {
    async fn execute(&self, matches: &ArgMatches, config: &AppConfig) -> Result<CommandResult>;
}

/// Command execution result
#[derive(Debug)]
pub struct CommandResult {
    pub success: bool,
    pub message: Option<String>,
    pub data: Option<serde_json::Value>,
}

impl CommandResult {
    pub fn success_with_message(message: String) -> Self {
        Self {
            success: true,
            message: Some(message),
            data: None,
        }
    }

    pub fn success_with_data(data: serde_json::Value) -> Self {
        Self {
            success: true,
            message: None,
            data: Some(data),
        }
    }

    pub fn error_with_data(message: String, data: serde_json::Value) -> Self {
        Self {
            success: false,
            message: Some(message),
            data: Some(data),
        }
    }

    /// Text written to stdout: the message when there is one, else pretty JSON.
    pub fn render(&self) -> Result<String> {
        match (&self.message, &self.data) {
            (Some(message), _) if self.success => Ok(message.clone()),
            (_, Some(data)) => Ok(serde_json::to_string_pretty(data)?),
            (Some(message), None) => Ok(message.clone()),
            (None, None) => Ok(String::new()),
        }
    }
}
