use anyhow::Result;
use clap::ArgMatches;
use cypherloop_core::config::AppConfig;
use cypherloop_core::types::GraphSchema;
use cypherloop_pipeline::extract_schema;

use super::{CommandHandler, CommandResult};
use crate::factory::connect_database;

/// Prints the Schema Document of the configured database.
pub struct SchemaCommand;

impl SchemaCommand {
    pub fn new() -> Self {
        Self
    }

    pub fn render(schema: &GraphSchema, format: &str) -> Result<String> {
        match format {
            "yaml" => Ok(serde_yaml::to_string(schema)?),
            _ => Ok(serde_json::to_string_pretty(schema)?),
        }
    }
}

impl Default for SchemaCommand {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandHandler for SchemaCommand {
    async fn execute(&self, matches: &ArgMatches, config: &AppConfig) -> Result<CommandResult> {
        let format = matches
            .get_one::<String>("format")
            .map(String::as_str)
            .unwrap_or("json");

        let db = connect_database(&config.neo4j).await?;
        let schema = extract_schema(db.as_ref()).await?;
        db.close().await?;

        Ok(CommandResult::success_with_message(Self::render(
            &schema, format,
        )?))
    }
}
