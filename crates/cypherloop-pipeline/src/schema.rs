//! Reads the node/edge label catalogue of the live database.

use std::collections::HashMap;
use std::sync::Arc;

use cypherloop_core::error::{PipelineError, PipelineResult};
use cypherloop_core::traits::GraphDatabase;
use cypherloop_core::types::{EdgeType, GraphSchema, NodeType, Property, PropertyType, QueryResult};
use log::{debug, info, warn};
use serde_json::Value;
use tokio::sync::RwLock;

const NODE_LABELS: &str = "CALL db.labels() YIELD label RETURN label";
const EDGE_LABELS: &str =
    "CALL db.relationshipTypes() YIELD relationshipType RETURN relationshipType";
const NODE_PROPERTIES: &str = "CALL db.schema.nodeTypeProperties() \
     YIELD nodeLabels, propertyName, propertyTypes \
     RETURN nodeLabels, propertyName, propertyTypes";
const EDGE_PROPERTIES: &str = "CALL db.schema.relTypeProperties() \
     YIELD relType, propertyName, propertyTypes \
     RETURN relType, propertyName, propertyTypes";

fn quote_identifier(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

fn endpoint_query(edge_label: &str) -> String {
    format!(
        "MATCH (a)-[:{}]->(b) \
         UNWIND labels(a) AS from_label UNWIND labels(b) AS to_label \
         RETURN DISTINCT from_label, to_label",
        quote_identifier(edge_label)
    )
}

async fn catalogue(db: &dyn GraphDatabase, query: &str) -> PipelineResult<QueryResult> {
    db.query(query)
        .await
        .map_err(|e| PipelineError::SchemaUnavailable(format!("{:#}", e)))
}

fn strings<'a>(result: &'a QueryResult, column: &str) -> Vec<&'a str> {
    result.values(column).filter_map(Value::as_str).collect()
}

/// `:`WON`` style catalogue names to a bare label.
fn bare_label(raw: &str) -> &str {
    raw.trim_start_matches(':').trim_matches('`')
}

fn push_property(properties: &mut Vec<Property>, name: &str, types: Option<&Value>) {
    if properties.iter().any(|p| p.name == name) {
        return;
    }
    let kind = types
        .and_then(|t| match t {
            Value::Array(list) => list.first().and_then(Value::as_str),
            Value::String(s) => Some(s.as_str()),
            _ => None,
        })
        .map(PropertyType::from_catalogue)
        .unwrap_or(PropertyType::String);
    properties.push(Property::new(name, kind));
}

/// Properties keyed by label, from a `*TypeProperties` catalogue result.
fn properties_by_label(
    result: &QueryResult,
    label_column: &str,
) -> HashMap<String, Vec<Property>> {
    let mut by_label: HashMap<String, Vec<Property>> = HashMap::new();
    let (Some(label_idx), Some(name_idx), Some(types_idx)) = (
        result.column(label_column),
        result.column("propertyName"),
        result.column("propertyTypes"),
    ) else {
        return by_label;
    };

    for row in &result.rows {
        let Some(name) = row.get(name_idx).and_then(Value::as_str) else {
            continue;
        };
        let labels: Vec<&str> = match row.get(label_idx) {
            Some(Value::Array(labels)) => labels.iter().filter_map(Value::as_str).collect(),
            Some(Value::String(label)) => vec![bare_label(label)],
            _ => Vec::new(),
        };
        for label in labels {
            push_property(
                by_label.entry(label.to_string()).or_default(),
                name,
                row.get(types_idx),
            );
        }
    }
    by_label
}

/// Builds the Schema Document: node labels, then edge labels with their endpoints,
/// then the declared properties of every label.
pub async fn extract_schema(db: &dyn GraphDatabase) -> PipelineResult<GraphSchema> {
    let node_labels = catalogue(db, NODE_LABELS).await?;
    let node_labels: Vec<String> = strings(&node_labels, "label")
        .into_iter()
        .map(String::from)
        .collect();

    let edge_labels = catalogue(db, EDGE_LABELS).await?;
    let edge_labels: Vec<String> = strings(&edge_labels, "relationshipType")
        .into_iter()
        .map(String::from)
        .collect();

    let mut endpoints = Vec::new();
    for label in &edge_labels {
        let pairs = catalogue(db, &endpoint_query(label)).await?;
        let from = strings(&pairs, "from_label");
        let to = strings(&pairs, "to_label");
        for (from_label, to_label) in from.into_iter().zip(to) {
            endpoints.push((label.clone(), from_label.to_string(), to_label.to_string()));
        }
    }

    let mut node_properties =
        properties_by_label(&catalogue(db, NODE_PROPERTIES).await?, "nodeLabels");
    let edge_properties =
        properties_by_label(&catalogue(db, EDGE_PROPERTIES).await?, "relType");

    let nodes: Vec<NodeType> = node_labels
        .iter()
        .map(|label| NodeType {
            label: label.clone(),
            properties: node_properties.remove(label).unwrap_or_default(),
        })
        .collect();

    let mut edges = Vec::new();
    for (label, from_label, to_label) in endpoints {
        if !node_labels.contains(&from_label) || !node_labels.contains(&to_label) {
            warn!(
                "Skipping edge {} ({} -> {}) with an undeclared endpoint",
                label, from_label, to_label
            );
            continue;
        }
        let properties = edge_properties.get(&label).cloned().unwrap_or_default();
        edges.push(EdgeType {
            label,
            from_label,
            to_label,
            properties,
        });
    }

    info!(
        "Extracted schema with {} node labels and {} edge types",
        nodes.len(),
        edges.len()
    );
    Ok(GraphSchema { nodes, edges })
}

/// Optional process-lifetime schema cache. Disabled caches always re-extract.
pub struct SchemaCache {
    enabled: bool,
    cached: RwLock<Option<Arc<GraphSchema>>>,
}

impl SchemaCache {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            cached: RwLock::new(None),
        }
    }

    pub async fn get_or_extract(&self, db: &dyn GraphDatabase) -> PipelineResult<Arc<GraphSchema>> {
        if self.enabled {
            if let Some(schema) = self.cached.read().await.as_ref() {
                debug!("Using cached schema");
                return Ok(Arc::clone(schema));
            }
        }

        let schema = Arc::new(extract_schema(db).await?);
        if self.enabled {
            *self.cached.write().await = Some(Arc::clone(&schema));
        }
        Ok(schema)
    }

    /// Drops the cached document, e.g. after the database was reloaded.
    pub async fn invalidate(&self) {
        *self.cached.write().await = None;
    }
}
