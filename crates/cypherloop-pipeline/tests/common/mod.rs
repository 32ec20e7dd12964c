#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use cypherloop_core::cypher;
use cypherloop_core::error::PipelineError;
use cypherloop_core::traits::{GraphDatabase, QueryOracle};
use cypherloop_core::types::{
    GenerateRequest, GraphSchema, OracleReply, PruneRequest, QueryResult, RepairRequest, Usage,
};
use serde_json::{json, Value};

pub fn nobel_schema() -> GraphSchema {
    serde_json::from_value(json!({
        "nodes": [
            {"label": "Scholar", "properties": [
                {"name": "knownName", "type": "string"},
                {"name": "gender", "type": "string"},
                {"name": "birthDate", "type": "date"}
            ]},
            {"label": "Prize", "properties": [
                {"name": "category", "type": "string"},
                {"name": "awardYear", "type": "integer"}
            ]},
            {"label": "Institution", "properties": [
                {"name": "name", "type": "string"}
            ]}
        ],
        "edges": [
            {"label": "WON", "from_label": "Scholar", "to_label": "Prize", "properties": []},
            {"label": "AFFILIATED_WITH", "from_label": "Scholar", "to_label": "Institution", "properties": []}
        ]
    }))
    .unwrap()
}

type Check = Box<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// In-memory catalogue plus scripted plan/execution behavior.
pub struct StubDb {
    catalogue_available: bool,
    validate: Check,
    execution_error: Option<String>,
    pub rows: Vec<Vec<Value>>,
    pub explained: Mutex<Vec<String>>,
    pub executed: Mutex<Vec<String>>,
}

impl StubDb {
    pub fn accepting() -> Self {
        Self::with_validator(|_| None)
    }

    pub fn rejecting(message: &str) -> Self {
        let message = message.to_string();
        Self::with_validator(move |_| Some(message.clone()))
    }

    pub fn with_validator(check: impl Fn(&str) -> Option<String> + Send + Sync + 'static) -> Self {
        Self {
            catalogue_available: true,
            validate: Box::new(check),
            execution_error: None,
            rows: vec![vec![json!("Paul Dirac")], vec![json!("Ernest Rutherford")]],
            explained: Mutex::new(Vec::new()),
            executed: Mutex::new(Vec::new()),
        }
    }

    pub fn without_catalogue(mut self) -> Self {
        self.catalogue_available = false;
        self
    }

    pub fn failing_execution(mut self, message: &str) -> Self {
        self.execution_error = Some(message.to_string());
        self
    }

    pub fn explained(&self) -> Vec<String> {
        self.explained.lock().unwrap().clone()
    }

    pub fn executed(&self) -> Vec<String> {
        self.executed.lock().unwrap().clone()
    }

    fn catalogue(&self, query: &str) -> Option<QueryResult> {
        let table = |columns: &[&str], rows: Vec<Vec<Value>>| QueryResult {
            columns: columns.iter().map(|c| c.to_string()).collect(),
            rows,
        };
        if query.starts_with("CALL db.labels()") {
            return Some(table(
                &["label"],
                vec![vec![json!("Scholar")], vec![json!("Prize")], vec![json!("Institution")]],
            ));
        }
        if query.starts_with("CALL db.relationshipTypes()") {
            return Some(table(
                &["relationshipType"],
                vec![vec![json!("WON")], vec![json!("AFFILIATED_WITH")]],
            ));
        }
        if query.starts_with("MATCH (a)-[:`WON`]->(b)") {
            return Some(table(
                &["from_label", "to_label"],
                vec![vec![json!("Scholar"), json!("Prize")]],
            ));
        }
        if query.starts_with("MATCH (a)-[:`AFFILIATED_WITH`]->(b)") {
            return Some(table(
                &["from_label", "to_label"],
                vec![vec![json!("Scholar"), json!("Institution")]],
            ));
        }
        if query.starts_with("CALL db.schema.nodeTypeProperties()") {
            return Some(table(
                &["nodeLabels", "propertyName", "propertyTypes"],
                vec![
                    vec![json!(["Scholar"]), json!("knownName"), json!(["String"])],
                    vec![json!(["Scholar"]), json!("gender"), json!(["String"])],
                    vec![json!(["Scholar"]), json!("birthDate"), json!(["Date"])],
                    vec![json!(["Prize"]), json!("category"), json!(["String"])],
                    vec![json!(["Prize"]), json!("awardYear"), json!(["Long"])],
                    vec![json!(["Institution"]), json!("name"), json!(["String"])],
                ],
            ));
        }
        if query.starts_with("CALL db.schema.relTypeProperties()") {
            return Some(table(
                &["relType", "propertyName", "propertyTypes"],
                vec![
                    vec![json!(":`WON`"), Value::Null, Value::Null],
                    vec![json!(":`AFFILIATED_WITH`"), Value::Null, Value::Null],
                ],
            ));
        }
        None
    }
}

#[async_trait]
impl GraphDatabase for StubDb {
    async fn query(&self, query: &str) -> Result<QueryResult> {
        let is_catalogue = query.starts_with("CALL db.") || query.starts_with("MATCH (a)-[:`");
        if is_catalogue {
            if !self.catalogue_available {
                return Err(anyhow!("Connection refused (os error 111)"));
            }
            return self
                .catalogue(query)
                .ok_or_else(|| anyhow!("unexpected catalogue query: {}", query));
        }

        self.executed.lock().unwrap().push(query.to_string());
        if let Some(message) = &self.execution_error {
            return Err(anyhow!("{}", message));
        }
        Ok(QueryResult {
            columns: cypher::return_columns(query),
            rows: self.rows.clone(),
        })
    }

    async fn explain(&self, query: &str) -> Result<()> {
        self.explained.lock().unwrap().push(query.to_string());
        match (self.validate)(query) {
            Some(message) => Err(anyhow!("{}", message)),
            None => Ok(()),
        }
    }
}

/// Scripted oracle reply.
#[derive(Debug, Clone)]
pub enum Reply {
    Query(String),
    Transport(String),
    Contract(String),
    Delayed(Duration, String),
    Hang,
}

impl Reply {
    pub fn query(text: &str) -> Self {
        Reply::Query(text.to_string())
    }
}

pub struct StubOracle {
    pruned: Mutex<Option<std::result::Result<GraphSchema, Reply>>>,
    generate: Mutex<VecDeque<Reply>>,
    repair: Mutex<VecDeque<Reply>>,
    fallback: Reply,
    pub generate_schemas: Mutex<Vec<GraphSchema>>,
    pub generate_exemplars: Mutex<Vec<usize>>,
    pub repair_errors: Mutex<Vec<String>>,
    pub repair_drafts: Mutex<Vec<String>>,
}

impl StubOracle {
    /// Replies `fallback` whenever a script runs dry. Pruning echoes the full schema.
    pub fn new(fallback: Reply) -> Self {
        Self {
            pruned: Mutex::new(None),
            generate: Mutex::new(VecDeque::new()),
            repair: Mutex::new(VecDeque::new()),
            fallback,
            generate_schemas: Mutex::new(Vec::new()),
            generate_exemplars: Mutex::new(Vec::new()),
            repair_errors: Mutex::new(Vec::new()),
            repair_drafts: Mutex::new(Vec::new()),
        }
    }

    pub fn generating(self, replies: Vec<Reply>) -> Self {
        *self.generate.lock().unwrap() = replies.into();
        self
    }

    pub fn repairing(self, replies: Vec<Reply>) -> Self {
        *self.repair.lock().unwrap() = replies.into();
        self
    }

    pub fn pruning_to(self, schema: GraphSchema) -> Self {
        *self.pruned.lock().unwrap() = Some(Ok(schema));
        self
    }

    pub fn failing_prune(self, reply: Reply) -> Self {
        *self.pruned.lock().unwrap() = Some(Err(reply));
        self
    }

    pub fn generate_calls(&self) -> usize {
        self.generate_schemas.lock().unwrap().len()
    }

    pub fn repair_calls(&self) -> usize {
        self.repair_errors.lock().unwrap().len()
    }

    async fn answer(&self, call_site: &'static str, reply: Reply) -> Result<OracleReply<String>> {
        match reply {
            Reply::Query(text) => Ok(OracleReply::with_usage(
                text,
                Usage {
                    prompt_tokens: 10,
                    completion_tokens: 5,
                    total_tokens: 15,
                },
            )),
            Reply::Transport(message) => Err(anyhow!("{}", message)),
            Reply::Contract(reason) => Err(PipelineError::contract(call_site, reason).into()),
            Reply::Delayed(delay, text) => {
                tokio::time::sleep(delay).await;
                Ok(OracleReply::new(text))
            }
            Reply::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Err(anyhow!("woke up"))
            }
        }
    }

    fn next(&self, queue: &Mutex<VecDeque<Reply>>) -> Reply {
        queue
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone())
    }
}

#[async_trait]
impl QueryOracle for StubOracle {
    async fn prune_schema(&self, request: &PruneRequest<'_>) -> Result<OracleReply<GraphSchema>> {
        let scripted = self.pruned.lock().unwrap().clone();
        match scripted {
            None => Ok(OracleReply::new(request.full_schema.clone())),
            Some(Ok(schema)) => Ok(OracleReply::new(schema)),
            Some(Err(reply)) => {
                self.answer("prune", reply).await?;
                Err(anyhow!("prune script must fail"))
            }
        }
    }

    async fn generate_query(&self, request: &GenerateRequest<'_>) -> Result<OracleReply<String>> {
        self.generate_schemas
            .lock()
            .unwrap()
            .push(request.schema.clone());
        self.generate_exemplars
            .lock()
            .unwrap()
            .push(request.exemplars.len());
        let reply = self.next(&self.generate);
        self.answer("generate", reply).await
    }

    async fn repair_query(&self, request: &RepairRequest<'_>) -> Result<OracleReply<String>> {
        self.repair_errors
            .lock()
            .unwrap()
            .push(request.error.to_string());
        self.repair_drafts
            .lock()
            .unwrap()
            .push(request.invalid_query.to_string());
        let reply = self.next(&self.repair);
        self.answer("repair", reply).await
    }
}

pub fn shared<T>(value: T) -> Arc<T> {
    Arc::new(value)
}
