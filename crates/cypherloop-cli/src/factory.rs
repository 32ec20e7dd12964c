//! Wiring of configured components into a [`Resolver`].

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use cypherloop_core::config::{is_unresolved_placeholder, AppConfig, Neo4jConfig};
use cypherloop_core::neo4j_client::Neo4jClient;
use cypherloop_core::traits::{Engine, GraphDatabase, QueryOracle};
use cypherloop_engines::{create_engine, LlmOracle};
use cypherloop_pipeline::{ExemplarIndex, Resolver};
use log::debug;

use crate::error::CliError;

pub const DEFAULT_EXEMPLARS_FILE: &str = "exemplars.json";

pub async fn connect_database(config: &Neo4jConfig) -> Result<Arc<dyn GraphDatabase>> {
    if is_unresolved_placeholder(&config.password) {
        return Err(CliError::Config(format!(
            "Neo4j password placeholder {} is not set",
            config.password
        ))
        .into());
    }
    let client = Neo4jClient::new(config).await?;
    Ok(Arc::new(client))
}

pub fn create_oracle(config: &AppConfig) -> Result<Arc<dyn QueryOracle>> {
    let engine: Arc<dyn Engine> = Arc::from(create_engine(&config.engine)?);
    debug!("Using engine {} for all oracle call sites", engine.name());
    Ok(Arc::new(LlmOracle::new(engine, config.conventions.clone())))
}

/// Corpus file to read and write: an explicit path wins over the configured one.
pub fn exemplars_file(config: &AppConfig, explicit: Option<&str>) -> PathBuf {
    explicit
        .map(PathBuf::from)
        .or_else(|| config.exemplars_path.clone())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_EXEMPLARS_FILE))
}

pub fn load_exemplars(config: &AppConfig) -> Result<Arc<ExemplarIndex>> {
    let index = match &config.exemplars_path {
        Some(path) => ExemplarIndex::load(path)?,
        None => ExemplarIndex::default(),
    };
    Ok(Arc::new(index))
}

pub async fn build_resolver(config: &AppConfig) -> Result<Resolver> {
    let oracle = create_oracle(config).context("Failed to create the oracle engine")?;
    let exemplars = load_exemplars(config)?;
    let db = connect_database(&config.neo4j).await?;
    Ok(Resolver::new(
        db,
        oracle,
        exemplars,
        config.pipeline.clone(),
        config.conventions.clone(),
    ))
}
