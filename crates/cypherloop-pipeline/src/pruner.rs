use std::sync::Arc;
use std::time::Duration;

use cypherloop_core::error::{ContractIssue, PipelineError, PipelineResult};
use cypherloop_core::traits::QueryOracle;
use cypherloop_core::types::{GraphSchema, PruneRequest, RepairTrace};
use log::{debug, warn};
use tokio::time::Instant;

use crate::oracle_call::{bounded, budget};

/// Oracle-selected schema subset plus the structural defects found in it.
#[derive(Debug, Clone)]
pub struct PrunedSchema {
    pub schema: GraphSchema,
    pub issues: Vec<ContractIssue>,
}

/// Thin typed contract around the prune call site. Relevance is decided by the oracle.
pub struct SchemaPruner {
    oracle: Arc<dyn QueryOracle>,
    timeout: Duration,
}

impl SchemaPruner {
    pub fn new(oracle: Arc<dyn QueryOracle>, timeout: Duration) -> Self {
        Self { oracle, timeout }
    }

    /// Asks the oracle for the subset relevant to `question`. Dangling endpoints and
    /// labels or properties absent from `full_schema` are reported, not repaired.
    pub async fn prune(
        &self,
        question: &str,
        full_schema: &GraphSchema,
        deadline: Instant,
        trace: &mut RepairTrace,
    ) -> PipelineResult<PrunedSchema> {
        let request = PruneRequest {
            question,
            full_schema,
        };
        let limit = budget(self.timeout, deadline);
        let call = bounded("prune", limit, self.oracle.prune_schema(&request)).await;
        trace.prune_time += call.elapsed;

        let reply = match call.result {
            Ok(reply) => reply,
            Err(e) => {
                trace.record_oracle(call.elapsed, &Default::default());
                return Err(e);
            }
        };
        trace.record_oracle(call.elapsed, &reply.usage);

        let schema = reply.value;
        let issues = schema.subset_issues(full_schema);
        debug!(
            "Pruned schema to {} node labels and {} edge types",
            schema.nodes.len(),
            schema.edges.len()
        );
        Ok(PrunedSchema { schema, issues })
    }

    /// Pruned schema to generate against. Transport failures, unparsable replies and
    /// empty subsets fall back to the full schema; structural defects are recorded in
    /// the trace and the subset is used as returned.
    pub async fn prune_or_full(
        &self,
        question: &str,
        full_schema: &GraphSchema,
        deadline: Instant,
        trace: &mut RepairTrace,
    ) -> GraphSchema {
        match self.prune(question, full_schema, deadline, trace).await {
            Ok(pruned) if pruned.schema.nodes.is_empty() && !full_schema.is_empty() => {
                warn!("Oracle returned an empty schema subset, using the full schema");
                trace
                    .contract_violations
                    .push(PipelineError::contract("prune", "pruned schema is empty").to_string());
                full_schema.clone()
            }
            Ok(pruned) => {
                for issue in &pruned.issues {
                    warn!("Pruned schema contract violation: {}", issue);
                    trace
                        .contract_violations
                        .push(PipelineError::contract("prune", issue.to_string()).to_string());
                }
                pruned.schema
            }
            Err(e) => {
                if matches!(e, PipelineError::OracleContractViolation { .. }) {
                    trace.contract_violations.push(e.to_string());
                }
                warn!("Schema pruning failed, using the full schema: {}", e);
                full_schema.clone()
            }
        }
    }
}
