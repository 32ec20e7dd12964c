use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use log::{debug, info};
use neo4rs::{query, ConfigBuilder, Database, Graph, Row};
use serde_json::{Map, Value};

use crate::config::Neo4jConfig;
use crate::cypher;
use crate::traits::GraphDatabase;
use crate::types::QueryResult;

/// Neo4j connection used for catalogue reads, plan-only validation and final execution.
///
/// `Graph` pools its connections internally, so one client can be shared by every
/// in-flight request.
pub struct Neo4jClient {
    graph: Graph,
    database: String,
}

impl Neo4jClient {
    pub async fn new(config: &Neo4jConfig) -> Result<Self> {
        let graph_config = ConfigBuilder::default()
            .uri(&config.uri)
            .user(&config.user)
            .password(&config.password)
            .db(Database::from(config.database.as_str()))
            .build()?;

        let graph = Graph::connect(graph_config)
            .await
            .with_context(|| format!("Failed to connect to Neo4j at {}", config.uri))?;
        debug!("Connected to Neo4j at {} ({})", config.uri, config.database);

        Ok(Neo4jClient {
            graph,
            database: config.database.clone(),
        })
    }

    pub fn database(&self) -> &str {
        &self.database
    }

    fn row_to_json(row: &Row) -> Result<Map<String, Value>> {
        row.to::<Map<String, Value>>()
            .map_err(|e| anyhow!("Failed to convert row to JSON: {}", e))
    }
}

/// Lays records out in column order. Columns come from the RETURN clause; when that
/// cannot name them (e.g. `RETURN *`), the keys of the first record are used.
pub fn records_to_result(query_text: &str, records: Vec<Map<String, Value>>) -> QueryResult {
    let mut columns = cypher::return_columns(query_text);
    if let Some(first) = records.first() {
        if columns.is_empty() || !columns.iter().all(|c| first.contains_key(c)) {
            columns = first.keys().cloned().collect();
        }
    }

    let rows = records
        .into_iter()
        .map(|mut record| {
            columns
                .iter()
                .map(|c| record.remove(c).unwrap_or(Value::Null))
                .collect()
        })
        .collect();

    QueryResult { columns, rows }
}

#[async_trait]
impl GraphDatabase for Neo4jClient {
    async fn query(&self, cypher_query: &str) -> Result<QueryResult> {
        info!("Executing Cypher query: {}", cypher_query);

        let mut stream = self.graph.execute(query(cypher_query)).await?;
        let mut records = Vec::new();
        while let Some(row) = stream.next().await? {
            records.push(Self::row_to_json(&row)?);
        }

        debug!("Query returned {} rows", records.len());
        Ok(records_to_result(cypher_query, records))
    }

    async fn explain(&self, cypher_query: &str) -> Result<()> {
        let statement = cypher_query.trim().trim_end_matches(';');
        debug!("Planning Cypher query: {}", statement);
        self.graph
            .run(query(&format!("EXPLAIN {}", statement)))
            .await
            .map_err(|e| anyhow!("{}", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_records_follow_return_order() {
        let result = records_to_result(
            "MATCH (s:Scholar)-[:WON]->(p:Prize) RETURN s.knownName, p.awardYear",
            vec![record(json!({"p.awardYear": 1921, "s.knownName": "Albert Einstein"}))],
        );
        assert_eq!(result.columns, vec!["s.knownName", "p.awardYear"]);
        assert_eq!(result.rows, vec![vec![json!("Albert Einstein"), json!(1921)]]);
    }

    #[test]
    fn test_records_fall_back_to_record_keys() {
        let result = records_to_result("MATCH (s) RETURN *", vec![record(json!({"s": 1}))]);
        assert_eq!(result.columns, vec!["s"]);
        assert_eq!(result.rows, vec![vec![json!(1)]]);
    }

    #[test]
    fn test_empty_result_keeps_declared_columns() {
        let result = records_to_result("MATCH (s) RETURN s.knownName AS name", vec![]);
        assert_eq!(result.columns, vec!["name"]);
        assert!(result.rows.is_empty());
    }
}
