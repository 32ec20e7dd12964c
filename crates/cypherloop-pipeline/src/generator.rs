use std::sync::Arc;
use std::time::Duration;

use cypherloop_core::traits::QueryOracle;
use cypherloop_core::types::{GenerateRequest, GraphSchema};
use log::debug;
use tokio::time::Instant;

use crate::exemplars::ExemplarIndex;
use crate::oracle_call::{bounded, budget, TimedCall};

/// Produces a draft query from the question, the pruned schema and the nearest exemplars.
pub struct QueryGenerator {
    oracle: Arc<dyn QueryOracle>,
    exemplars: Arc<ExemplarIndex>,
    exemplar_k: usize,
    timeout: Duration,
}

impl QueryGenerator {
    pub fn new(
        oracle: Arc<dyn QueryOracle>,
        exemplars: Arc<ExemplarIndex>,
        exemplar_k: usize,
        timeout: Duration,
    ) -> Self {
        Self {
            oracle,
            exemplars,
            exemplar_k,
            timeout,
        }
    }

    pub async fn generate(
        &self,
        question: &str,
        schema: &GraphSchema,
        deadline: Instant,
    ) -> TimedCall<String> {
        let exemplars = self.exemplars.top_k(question, self.exemplar_k);
        debug!(
            "Generating with {} exemplars: {:?}",
            exemplars.len(),
            exemplars.iter().map(|e| e.question.as_str()).collect::<Vec<_>>()
        );
        let request = GenerateRequest {
            question,
            schema,
            exemplars: &exemplars,
        };
        let limit = budget(self.timeout, deadline);
        bounded("generate", limit, self.oracle.generate_query(&request)).await
    }
}
