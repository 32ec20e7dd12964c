use std::future::Future;

use anyhow::Result;
use async_trait::async_trait;

use crate::types::{
    GenerateRequest, GraphSchema, OracleReply, PruneRequest, QueryResult, RepairRequest, Request,
    Response,
};

/// A text-generation backend reachable over the network.
pub trait Engine: Send + Sync {
    fn name(&self) -> &str;

    fn execute<'a>(
        &'a self,
        request: &'a Request,
    ) -> Box<dyn Future<Output = Result<Response>> + Send + 'a>;
}

/// Read-only access to the graph database.
#[async_trait]
pub trait GraphDatabase: Send + Sync {
    /// Runs a read query and materializes its rows.
    async fn query(&self, cypher: &str) -> Result<QueryResult>;

    /// Plans the query without producing rows. An error carries the database diagnostic.
    async fn explain(&self, cypher: &str) -> Result<()>;

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

/// The three oracle call sites of the pipeline, each with its own typed contract.
///
/// Implementations report malformed answers by returning a
/// [`PipelineError::OracleContractViolation`](crate::error::PipelineError) inside the
/// `anyhow::Error`; any other error is treated as a timeout or transport failure.
#[async_trait]
pub trait QueryOracle: Send + Sync {
    async fn prune_schema(&self, request: &PruneRequest<'_>) -> Result<OracleReply<GraphSchema>>;

    async fn generate_query(&self, request: &GenerateRequest<'_>) -> Result<OracleReply<String>>;

    async fn repair_query(&self, request: &RepairRequest<'_>) -> Result<OracleReply<String>>;
}
