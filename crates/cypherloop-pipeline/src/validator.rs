use std::sync::Arc;

use cypherloop_core::error::{PipelineError, PipelineResult};
use cypherloop_core::traits::GraphDatabase;
use log::debug;

/// Plan-only submission of a draft query.
///
/// Success means the query parses and its identifiers bind against the live schema;
/// it says nothing about whether the rows answer the question.
pub struct Validator {
    db: Arc<dyn GraphDatabase>,
}

impl Validator {
    pub fn new(db: Arc<dyn GraphDatabase>) -> Self {
        Self { db }
    }

    pub async fn validate(&self, query: &str) -> PipelineResult<()> {
        if query.trim().is_empty() {
            return Err(PipelineError::ValidationFailure("empty query".to_string()));
        }
        match self.db.explain(query).await {
            Ok(()) => {
                debug!("Query planned successfully");
                Ok(())
            }
            Err(e) => Err(PipelineError::ValidationFailure(format!("{:#}", e))),
        }
    }
}
