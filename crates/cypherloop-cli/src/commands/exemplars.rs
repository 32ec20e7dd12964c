use std::path::Path;

use anyhow::{anyhow, Result};
use clap::ArgMatches;
use cypherloop_core::config::AppConfig;
use cypherloop_core::types::Exemplar;
use cypherloop_pipeline::ExemplarIndex;
use log::info;
use serde_json::json;

use super::{CommandHandler, CommandResult};
use crate::error::CliError;
use crate::factory::exemplars_file;

/// `exemplars list | add | search` over a persisted corpus.
pub struct ExemplarsCommand;

impl ExemplarsCommand {
    pub fn new() -> Self {
        Self
    }

    pub fn list(path: &Path) -> Result<CommandResult> {
        let index = ExemplarIndex::load(path)?;
        Ok(CommandResult::success_with_data(json!(index.exemplars())))
    }

    pub fn add(path: &Path, question: &str, query: &str) -> Result<CommandResult> {
        let index = ExemplarIndex::load(path)?;
        index.add(question, query)?;
        index.save(path)?;
        info!("Saved {} exemplars to {}", index.len(), path.display());
        Ok(CommandResult::success_with_message(format!(
            "Added exemplar #{} to {}",
            index.len(),
            path.display()
        )))
    }

    pub fn search(path: &Path, question: &str, k: usize) -> Result<CommandResult> {
        let index = ExemplarIndex::load(path)?;
        let nearest: Vec<Exemplar> = index.top_k(question, k);
        Ok(CommandResult::success_with_message(Exemplar::format_block(
            &nearest,
        )))
    }
}

impl Default for ExemplarsCommand {
    fn default() -> Self {
        Self::new()
    }
}

fn required<'a>(matches: &'a ArgMatches, name: &str) -> Result<&'a str> {
    matches
        .get_one::<String>(name)
        .map(String::as_str)
        .ok_or_else(|| CliError::ArgParse(format!("{} is required", name)).into())
}

impl CommandHandler for ExemplarsCommand {
    async fn execute(&self, matches: &ArgMatches, config: &AppConfig) -> Result<CommandResult> {
        let path = exemplars_file(config, matches.get_one::<String>("file").map(String::as_str));

        match matches.subcommand() {
            Some(("list", _)) => Self::list(&path),
            Some(("add", sub)) => Self::add(&path, required(sub, "question")?, required(sub, "query")?),
            Some(("search", sub)) => {
                let k = sub
                    .get_one::<usize>("k")
                    .copied()
                    .unwrap_or(config.pipeline.exemplar_k);
                Self::search(&path, required(sub, "question")?, k)
            }
            _ => Err(anyhow!("Unknown exemplars action")),
        }
    }
}
