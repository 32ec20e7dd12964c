// crates/cypherloop-core/src/types.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::fmt;
use std::time::Duration;

use crate::cypher;
use crate::error::ContractIssue;

/// Coarse property type tag carried by the schema document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "&'static str")]
pub enum PropertyType {
    String,
    Integer,
    Float,
    Date,
    Boolean,
}

impl PropertyType {
    /// Maps a catalogue type name (Neo4j or Kuzu spelling) onto a coarse tag.
    pub fn from_catalogue(raw: &str) -> Self {
        let lowered = raw.trim().to_ascii_lowercase();
        let base = lowered
            .trim_end_matches("not null")
            .trim()
            .trim_end_matches("array")
            .trim_end_matches("[]");
        match base {
            "integer" | "long" | "int" | "int8" | "int16" | "int32" | "int64" | "int128"
            | "uint8" | "uint16" | "uint32" | "uint64" | "serial" | "short" | "byte" => {
                PropertyType::Integer
            }
            "float" | "double" | "decimal" => PropertyType::Float,
            "date" | "datetime" | "localdatetime" | "zoneddatetime" | "timestamp" | "time"
            | "localtime" => PropertyType::Date,
            "boolean" | "bool" => PropertyType::Boolean,
            _ => PropertyType::String,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PropertyType::String => "string",
            PropertyType::Integer => "integer",
            PropertyType::Float => "float",
            PropertyType::Date => "date",
            PropertyType::Boolean => "boolean",
        }
    }
}

impl From<String> for PropertyType {
    fn from(raw: String) -> Self {
        PropertyType::from_catalogue(&raw)
    }
}

impl From<PropertyType> for &'static str {
    fn from(kind: PropertyType) -> Self {
        kind.as_str()
    }
}

impl fmt::Display for PropertyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Property {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: PropertyType,
}

impl Property {
    pub fn new(name: impl Into<String>, kind: PropertyType) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeType {
    pub label: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub properties: Vec<Property>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeType {
    pub label: String,
    #[serde(alias = "from", deserialize_with = "label_ref")]
    pub from_label: String,
    #[serde(alias = "to", deserialize_with = "label_ref")]
    pub to_label: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub properties: Vec<Property>,
}

impl NodeType {
    pub fn has_property(&self, name: &str) -> bool {
        self.properties.iter().any(|p| p.name == name)
    }
}

impl EdgeType {
    pub fn has_property(&self, name: &str) -> bool {
        self.properties.iter().any(|p| p.name == name)
    }
}

/// Normalized description of the node and edge labels of the graph.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphSchema {
    #[serde(default)]
    pub nodes: Vec<NodeType>,
    #[serde(default)]
    pub edges: Vec<EdgeType>,
}

impl GraphSchema {
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.edges.is_empty()
    }

    pub fn node(&self, label: &str) -> Option<&NodeType> {
        self.nodes.iter().find(|n| n.label == label)
    }

    pub fn edge(&self, label: &str, from_label: &str, to_label: &str) -> Option<&EdgeType> {
        self.edges
            .iter()
            .find(|e| e.label == label && e.from_label == from_label && e.to_label == to_label)
    }

    pub fn node_labels(&self) -> HashSet<&str> {
        self.nodes.iter().map(|n| n.label.as_str()).collect()
    }

    /// Edges whose endpoints are not declared as nodes in this document.
    pub fn dangling_endpoints(&self) -> Vec<ContractIssue> {
        let labels = self.node_labels();
        let mut issues = Vec::new();
        for edge in &self.edges {
            for endpoint in [&edge.from_label, &edge.to_label] {
                if !labels.contains(endpoint.as_str()) {
                    issues.push(ContractIssue::DanglingEndpoint {
                        edge: edge.label.clone(),
                        label: endpoint.clone(),
                    });
                }
            }
        }
        issues
    }

    /// Checks a question-specific subset against the full document it was cut from.
    pub fn subset_issues(&self, full: &GraphSchema) -> Vec<ContractIssue> {
        let mut issues = self.dangling_endpoints();

        for node in &self.nodes {
            match full.node(&node.label) {
                None => issues.push(ContractIssue::UnknownNode(node.label.clone())),
                Some(declared) => {
                    for property in &node.properties {
                        if !declared.has_property(&property.name) {
                            issues.push(ContractIssue::UnknownProperty {
                                owner: node.label.clone(),
                                property: property.name.clone(),
                            });
                        }
                    }
                }
            }
        }

        for edge in &self.edges {
            match full.edge(&edge.label, &edge.from_label, &edge.to_label) {
                None => issues.push(ContractIssue::UnknownEdge {
                    label: edge.label.clone(),
                    from_label: edge.from_label.clone(),
                    to_label: edge.to_label.clone(),
                }),
                Some(declared) => {
                    for property in &edge.properties {
                        if !declared.has_property(&property.name) {
                            issues.push(ContractIssue::UnknownProperty {
                                owner: edge.label.clone(),
                                property: property.name.clone(),
                            });
                        }
                    }
                }
            }
        }

        issues
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<Property>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<Property>>::deserialize(deserializer)?.unwrap_or_default())
}

// Endpoints may arrive as a bare label or as a `{ "label": .. }` object.
fn label_ref<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum LabelRef {
        Bare(String),
        Node { label: String },
    }

    Ok(match LabelRef::deserialize(deserializer)? {
        LabelRef::Bare(label) => label,
        LabelRef::Node { label } => label,
    })
}

/// A known-good (question, query) pair used as in-context guidance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Exemplar {
    pub question: String,
    pub query: String,
}

impl Exemplar {
    pub fn new(question: impl Into<String>, query: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            query: query.into(),
        }
    }

    /// Renders exemplars as the compact in-context block handed to the oracle.
    pub fn format_block(exemplars: &[Exemplar]) -> String {
        let mut lines = Vec::new();
        for (i, exemplar) in exemplars.iter().enumerate() {
            lines.push(format!("Example {}:", i + 1));
            lines.push(format!("Question: {}", exemplar.question.trim()));
            lines.push(format!("Cypher: {}", cypher::single_line(&exemplar.query)));
            lines.push(String::new());
        }
        lines.join("\n").trim().to_string()
    }
}

/// Tabular result of a read query.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl QueryResult {
    pub fn column(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Values of one column, in row order.
    pub fn values<'a>(&'a self, name: &str) -> impl Iterator<Item = &'a Value> + 'a {
        let index = self.column(name);
        self.rows
            .iter()
            .filter_map(move |row| index.and_then(|i| row.get(i)))
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Request {
    pub flowname: String,
    pub payload: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Response {
    pub content: String,
    pub usage: Usage,
    pub model: String,
    pub finish_reason: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, Default, PartialEq, Eq)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

impl Usage {
    pub fn accumulate(&mut self, other: &Usage) {
        self.prompt_tokens += other.prompt_tokens;
        self.completion_tokens += other.completion_tokens;
        self.total_tokens += other.total_tokens;
    }
}

/// Typed value returned by one oracle call site, plus the tokens it spent.
#[derive(Debug, Clone)]
pub struct OracleReply<T> {
    pub value: T,
    pub usage: Usage,
}

impl<T> OracleReply<T> {
    pub fn new(value: T) -> Self {
        Self {
            value,
            usage: Usage::default(),
        }
    }

    pub fn with_usage(value: T, usage: Usage) -> Self {
        Self { value, usage }
    }
}

pub struct PruneRequest<'a> {
    pub question: &'a str,
    pub full_schema: &'a GraphSchema,
}

pub struct GenerateRequest<'a> {
    pub question: &'a str,
    pub schema: &'a GraphSchema,
    pub exemplars: &'a [Exemplar],
}

pub struct RepairRequest<'a> {
    pub question: &'a str,
    pub invalid_query: &'a str,
    pub error: &'a str,
    pub pruned_schema: &'a GraphSchema,
    pub full_schema: &'a GraphSchema,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttemptOutcome {
    Success,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FinalState {
    Success,
    Exhausted,
}

/// One repair attempt: the corrective oracle call and the validation that followed it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryRecord {
    pub attempt_number: u32,
    #[serde(with = "duration_ms")]
    pub validation_time: Duration,
    #[serde(with = "duration_ms")]
    pub repair_time: Duration,
    pub outcome: AttemptOutcome,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Timing and outcome record of one request's generate-validate-repair cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepairTrace {
    pub request_id: String,
    pub started_at: DateTime<Utc>,
    #[serde(with = "duration_ms")]
    pub schema_time: Duration,
    #[serde(with = "duration_ms")]
    pub prune_time: Duration,
    #[serde(with = "duration_ms")]
    pub initial_generation_time: Duration,
    #[serde(with = "duration_ms")]
    pub initial_validation_time: Duration,
    pub retries: Vec<RetryRecord>,
    #[serde(default)]
    pub attempts_used: u32,
    #[serde(with = "duration_ms")]
    pub total_oracle_time: Duration,
    #[serde(with = "duration_ms")]
    pub total_validation_time: Duration,
    #[serde(with = "duration_ms")]
    pub db_execution_time: Duration,
    pub final_state: Option<FinalState>,
    #[serde(default)]
    pub contract_violations: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution_error: Option<String>,
    #[serde(default)]
    pub oracle_usage: Usage,
}

impl RepairTrace {
    pub fn new(request_id: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
            started_at: Utc::now(),
            schema_time: Duration::ZERO,
            prune_time: Duration::ZERO,
            initial_generation_time: Duration::ZERO,
            initial_validation_time: Duration::ZERO,
            retries: Vec::new(),
            attempts_used: 0,
            total_oracle_time: Duration::ZERO,
            total_validation_time: Duration::ZERO,
            db_execution_time: Duration::ZERO,
            final_state: None,
            contract_violations: Vec::new(),
            execution_error: None,
            oracle_usage: Usage::default(),
        }
    }

    pub fn repair_attempts(&self) -> usize {
        self.retries.len()
    }

    pub fn record_oracle(&mut self, elapsed: Duration, usage: &Usage) {
        self.total_oracle_time += elapsed;
        self.oracle_usage.accumulate(usage);
    }

    pub fn record_validation(&mut self, elapsed: Duration) {
        self.total_validation_time += elapsed;
    }
}

/// Reply of `resolve`: a (possibly imperfect) query with its rows, or an explicit error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResolveOutcome {
    Answered {
        question: String,
        #[serde(alias = "cypher")]
        query: String,
        columns: Vec<String>,
        rows: Vec<Vec<Value>>,
        diagnostics: RepairTrace,
    },
    Failed {
        error: String,
    },
}

impl ResolveOutcome {
    pub fn failed(error: impl fmt::Display) -> Self {
        ResolveOutcome::Failed {
            error: error.to_string(),
        }
    }

    pub fn query(&self) -> Option<&str> {
        match self {
            ResolveOutcome::Answered { query, .. } => Some(query),
            ResolveOutcome::Failed { .. } => None,
        }
    }

    pub fn diagnostics(&self) -> Option<&RepairTrace> {
        match self {
            ResolveOutcome::Answered { diagnostics, .. } => Some(diagnostics),
            ResolveOutcome::Failed { .. } => None,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, ResolveOutcome::Failed { .. })
    }
}

/// Serializes durations as fractional milliseconds.
pub mod duration_ms {
    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_f64(duration.as_secs_f64() * 1000.0)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(millis.max(0.0) / 1000.0).map_err(D::Error::custom)
    }
}
