use std::sync::Arc;
use std::time::Instant;

use cypherloop_core::config::{NamingConventions, PipelineConfig};
use cypherloop_core::cypher;
use cypherloop_core::error::{PipelineError, PipelineResult};
use cypherloop_core::traits::{GraphDatabase, QueryOracle};
use cypherloop_core::types::{FinalState, QueryResult, RepairTrace, ResolveOutcome};
use log::{debug, error, info, warn};
use uuid::Uuid;

use crate::exemplars::ExemplarIndex;
use crate::generator::QueryGenerator;
use crate::post_processor::PostProcessor;
use crate::pruner::SchemaPruner;
use crate::repair::{RepairContext, RepairController};
use crate::schema::SchemaCache;
use crate::validator::Validator;

/// One question in, one query with its rows and trace out.
///
/// A `Resolver` is shared by all in-flight requests; per-request state lives on the
/// stack of [`Resolver::resolve`].
pub struct Resolver {
    db: Arc<dyn GraphDatabase>,
    schema: SchemaCache,
    pruner: SchemaPruner,
    controller: RepairController,
    config: PipelineConfig,
}

impl Resolver {
    pub fn new(
        db: Arc<dyn GraphDatabase>,
        oracle: Arc<dyn QueryOracle>,
        exemplars: Arc<ExemplarIndex>,
        config: PipelineConfig,
        conventions: NamingConventions,
    ) -> Self {
        let timeout = config.oracle_timeout();
        let generator = QueryGenerator::new(
            Arc::clone(&oracle),
            exemplars,
            config.exemplar_k,
            timeout,
        );
        let controller = RepairController::new(
            Arc::clone(&oracle),
            generator,
            Validator::new(Arc::clone(&db)),
            PostProcessor::new(conventions, config.default_limit),
            config.max_repair_attempts,
            timeout,
        );

        Self {
            schema: SchemaCache::new(config.cache_schema),
            pruner: SchemaPruner::new(oracle, timeout),
            db,
            controller,
            config,
        }
    }

    pub fn schema_cache(&self) -> &SchemaCache {
        &self.schema
    }

    /// Never fails silently: the caller gets a query with rows, or an error payload.
    ///
    /// `request_timeout_secs` is a deadline shared by the catalogue read and every
    /// oracle call. Once it passes, remaining attempts fail at once and the loop hands
    /// back its last draft instead of discarding it.
    pub async fn resolve(&self, question: &str) -> ResolveOutcome {
        let question = question.trim();
        if question.is_empty() {
            return ResolveOutcome::failed("missing question");
        }

        match self.run(question).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!("Query failed: {}", e);
                ResolveOutcome::failed(e)
            }
        }
    }

    async fn run(&self, question: &str) -> PipelineResult<ResolveOutcome> {
        let mut trace = RepairTrace::new(Uuid::new_v4().to_string());
        info!("Resolving question [{}]: {}", trace.request_id, question);

        let limit = self.config.request_timeout();
        let deadline = tokio::time::Instant::now() + limit;

        let started = Instant::now();
        let full_schema =
            tokio::time::timeout_at(deadline, self.schema.get_or_extract(self.db.as_ref()))
                .await
                .map_err(|_| {
                    PipelineError::SchemaUnavailable(format!(
                        "catalogue read timed out after {}s",
                        limit.as_secs()
                    ))
                })??;
        trace.schema_time = started.elapsed();

        let pruned_schema = self
            .pruner
            .prune_or_full(question, &full_schema, deadline, &mut trace)
            .await;

        let ctx = RepairContext {
            question,
            pruned_schema: &pruned_schema,
            full_schema: &full_schema,
            deadline,
        };
        let outcome = match self.controller.run(&ctx, &mut trace).await {
            Ok(outcome) => outcome,
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => return Ok(ResolveOutcome::failed(e)),
        };

        let result = self.execute(&outcome.query, outcome.state, &mut trace).await;
        Ok(ResolveOutcome::Answered {
            question: question.to_string(),
            query: outcome.query,
            columns: result.columns,
            rows: result.rows,
            diagnostics: trace,
        })
    }

    /// Runs the final query. Failures land in the trace and yield an empty result.
    async fn execute(&self, query: &str, state: FinalState, trace: &mut RepairTrace) -> QueryResult {
        if state == FinalState::Exhausted && !self.config.execute_unvalidated {
            trace.execution_error =
                Some("query failed validation and unvalidated execution is disabled".to_string());
            return QueryResult::default();
        }
        if self.config.refuse_write_queries {
            if let Some(clause) = cypher::write_clause(query) {
                let refused = PipelineError::Execution(format!("refusing to run {} clause", clause));
                warn!("{}", refused);
                trace.execution_error = Some(refused.to_string());
                return QueryResult::default();
            }
        }

        let started = Instant::now();
        let result = self.db.query(query).await;
        trace.db_execution_time = started.elapsed();

        match result {
            Ok(result) => {
                debug!("Final query returned {} rows", result.rows.len());
                result
            }
            Err(e) => {
                let failed = PipelineError::Execution(format!("{:#}", e));
                warn!("{}", failed);
                trace.execution_error = Some(failed.to_string());
                QueryResult::default()
            }
        }
    }
}
