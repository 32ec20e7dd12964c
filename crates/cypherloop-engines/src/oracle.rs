use std::pin::Pin;
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use cypherloop_core::config::NamingConventions;
use cypherloop_core::error::PipelineError;
use cypherloop_core::traits::{Engine, QueryOracle};
use cypherloop_core::types::{
    GenerateRequest, GraphSchema, OracleReply, PruneRequest, RepairRequest, Request, Response,
};
use log::debug;

use crate::prompts;
use crate::shared::ResponseParser;

/// [`QueryOracle`] backed by a text-generation [`Engine`].
pub struct LlmOracle {
    engine: Arc<dyn Engine>,
    conventions: NamingConventions,
}

impl LlmOracle {
    pub fn new(engine: Arc<dyn Engine>, conventions: NamingConventions) -> Self {
        Self {
            engine,
            conventions,
        }
    }

    async fn complete(&self, flowname: &str, payload: String) -> Result<Response> {
        let request = Request {
            flowname: flowname.to_string(),
            payload,
        };
        debug!("Sending {} request to engine {}", flowname, self.engine.name());
        let response = Pin::from(self.engine.execute(&request))
            .await
            .with_context(|| format!("{} call to engine {} failed", flowname, self.engine.name()))?;
        debug!("Response from engine for {}: {:?}", flowname, response.content);
        Ok(response)
    }

    fn query_reply(call_site: &'static str, response: Response) -> Result<OracleReply<String>> {
        let query = ResponseParser::extract_query(&response.content);
        if query.is_empty() {
            return Err(PipelineError::contract(call_site, "oracle returned no query text").into());
        }
        Ok(OracleReply::with_usage(query, response.usage))
    }
}

/// Parses the schema subset an oracle returned for the prune call site.
pub fn parse_pruned_schema(content: &str) -> Result<GraphSchema> {
    let value = ResponseParser::extract_json_object(content).ok_or_else(|| {
        PipelineError::contract("prune", "reply does not contain a JSON schema object")
    })?;
    serde_json::from_value::<GraphSchema>(value).map_err(|e| {
        PipelineError::contract("prune", format!("reply is not a schema document: {}", e)).into()
    })
}

#[async_trait]
impl QueryOracle for LlmOracle {
    async fn prune_schema(&self, request: &PruneRequest<'_>) -> Result<OracleReply<GraphSchema>> {
        let payload = prompts::prune_prompt(request.question, request.full_schema);
        let response = self.complete("prune_schema", payload).await?;
        let schema = parse_pruned_schema(&response.content)?;
        Ok(OracleReply::with_usage(schema, response.usage))
    }

    async fn generate_query(&self, request: &GenerateRequest<'_>) -> Result<OracleReply<String>> {
        let payload = prompts::generate_prompt(
            request.question,
            request.schema,
            request.exemplars,
            &self.conventions,
        );
        let response = self.complete("generate_query", payload).await?;
        Self::query_reply("generate", response)
    }

    async fn repair_query(&self, request: &RepairRequest<'_>) -> Result<OracleReply<String>> {
        let payload = prompts::repair_prompt(
            request.question,
            request.invalid_query,
            request.error,
            request.pruned_schema,
            request.full_schema,
            &self.conventions,
        );
        let response = self.complete("repair_query", payload).await?;
        Self::query_reply("repair", response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_pruned_schema_with_nested_endpoints() {
        let content = r#"{"nodes": [{"label": "Scholar", "properties": null}, {"label": "Prize", "properties": []}],
            "edges": [{"label": "WON", "from": {"label": "Scholar"}, "to": {"label": "Prize"}, "properties": null}]}"#;
        let schema = parse_pruned_schema(content).unwrap();
        assert_eq!(schema.nodes.len(), 2);
        assert_eq!(schema.edges[0].from_label, "Scholar");
        assert_eq!(schema.edges[0].to_label, "Prize");
    }

    #[test]
    fn test_parse_pruned_schema_rejects_prose() {
        let err = parse_pruned_schema("I cannot help with that").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PipelineError>(),
            Some(PipelineError::OracleContractViolation { call_site: "prune", .. })
        ));
    }

    #[test]
    fn test_parse_pruned_schema_rejects_wrong_shape() {
        let err = parse_pruned_schema(r#"{"nodes": "Scholar"}"#).unwrap_err();
        assert!(err.downcast_ref::<PipelineError>().is_some());
    }
}
