//! Main CLI entry point and command routing

use std::collections::HashMap;
use std::path::Path;

use anyhow::Result;
use clap::ArgMatches;
use cypherloop_core::config::{load_config, parse_key_value_pair, AppConfig};
use log::debug;

use crate::cli_builder::build_cli;
use crate::commands::{
    ask::AskCommand, exemplars::ExemplarsCommand, normalize::NormalizeCommand,
    schema::SchemaCommand, CommandHandler, CommandResult,
};
use crate::error::CliError;

/// `-o key=value` pairs as a map; malformed pairs are rejected.
pub fn collect_overrides(matches: &ArgMatches) -> Result<HashMap<String, String>> {
    let mut overrides = HashMap::new();
    if let Some(pairs) = matches.get_many::<String>("override") {
        for pair in pairs {
            let (key, value) = parse_key_value_pair(pair).ok_or_else(|| {
                CliError::ArgParse(format!("Invalid override '{}', expected KEY=VALUE", pair))
            })?;
            overrides.insert(key, value);
        }
    }
    Ok(overrides)
}

pub fn load_app_config(matches: &ArgMatches) -> Result<AppConfig> {
    let overrides = collect_overrides(matches)?;
    let config_path = matches.get_one::<String>("config").map(Path::new);
    load_config(config_path, &overrides).map_err(|e| CliError::Config(format!("{:#}", e)).into())
}

async fn dispatch(matches: &ArgMatches, config: &AppConfig) -> Result<Option<CommandResult>> {
    let result = match matches.subcommand() {
        Some(("ask", sub)) => AskCommand::new().execute(sub, config).await?,
        Some(("schema", sub)) => SchemaCommand::new().execute(sub, config).await?,
        Some(("normalize", sub)) => NormalizeCommand::new().execute(sub, config).await?,
        Some(("exemplars", sub)) => ExemplarsCommand::new().execute(sub, config).await?,
        _ => return Ok(None),
    };
    Ok(Some(result))
}

/// Main CLI entry point
pub async fn run() -> Result<()> {
    let matches = match build_cli().try_get_matches() {
        Ok(matches) => matches,
        Err(err) => err.exit(),
    };

    let config = load_app_config(&matches)?;
    debug!("Pipeline settings: {:?}", config.pipeline);

    let Some(result) = dispatch(&matches, &config).await? else {
        build_cli().print_help()?;
        return Ok(());
    };

    println!("{}", result.render()?);
    if !result.success {
        let message = result.message.unwrap_or_else(|| "unknown error".to_string());
        return Err(CliError::Resolve(message).into());
    }
    Ok(())
}
