use anyhow::Result;
use clap::ArgMatches;
use cypherloop_core::config::AppConfig;
use cypherloop_pipeline::PostProcessor;

use super::{CommandHandler, CommandResult};
use crate::error::CliError;

/// Runs the post-processing rules offline, without database or oracle.
pub struct NormalizeCommand;

impl NormalizeCommand {
    pub fn new() -> Self {
        Self
    }

    pub fn normalize(query: &str, config: &AppConfig) -> String {
        PostProcessor::new(config.conventions.clone(), config.pipeline.default_limit)
            .normalize(query)
    }
}

impl Default for NormalizeCommand {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandHandler for NormalizeCommand {
    async fn execute(&self, matches: &ArgMatches, config: &AppConfig) -> Result<CommandResult> {
        let query = matches
            .get_one::<String>("query")
            .ok_or_else(|| CliError::ArgParse("query is required".to_string()))?;
        Ok(CommandResult::success_with_message(Self::normalize(
            query, config,
        )))
    }
}
