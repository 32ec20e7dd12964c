use anyhow::Result;
use clap::ArgMatches;
use cypherloop_core::config::AppConfig;
use cypherloop_core::types::ResolveOutcome;
use log::info;

use super::{CommandHandler, CommandResult};
use crate::error::CliError;
use crate::factory::build_resolver;

/// Resolves one question end to end and prints the payload.
pub struct AskCommand;

impl AskCommand {
    pub fn new() -> Self {
        Self
    }

    pub fn to_result(outcome: &ResolveOutcome, query_only: bool) -> Result<CommandResult> {
        let data = serde_json::to_value(outcome)?;
        match outcome {
            ResolveOutcome::Failed { error } => {
                Ok(CommandResult::error_with_data(error.clone(), data))
            }
            ResolveOutcome::Answered { query, .. } if query_only => {
                Ok(CommandResult::success_with_message(query.clone()))
            }
            ResolveOutcome::Answered { .. } => Ok(CommandResult::success_with_data(data)),
        }
    }
}

impl Default for AskCommand {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandHandler for AskCommand {
    async fn execute(&self, matches: &ArgMatches, config: &AppConfig) -> Result<CommandResult> {
        let question = matches
            .get_many::<String>("question")
            .map(|words| words.map(String::as_str).collect::<Vec<_>>().join(" "))
            .ok_or_else(|| CliError::ArgParse("question is required".to_string()))?;
        let query_only = matches.get_flag("query-only");

        let resolver = build_resolver(config).await?;
        let outcome = resolver.resolve(&question).await;
        if let Some(trace) = outcome.diagnostics() {
            info!(
                "Request {} finished {:?} after {} repair attempts",
                trace.request_id,
                trace.final_state,
                trace.repair_attempts()
            );
        }
        Self::to_result(&outcome, query_only)
    }
}
