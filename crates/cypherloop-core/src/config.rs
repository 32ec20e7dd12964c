use anyhow::{anyhow, Context, Result};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use std::{env, fs};

const REDACTED: &str = "***REDACTED***";
const SECRET_PARAMETERS: &[&str] = &["bearer_token", "api_key", "x-api-key"];

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct EngineConfig {
    pub name: String,
    pub engine: String,
    pub connection: ConnectionConfig,
    #[serde(default)]
    pub parameters: HashMap<String, Value>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ConnectionConfig {
    pub protocol: String,
    pub hostname: String,
    pub port: u16,
    pub request_path: String,
}

impl EngineConfig {
    pub fn parameter_str(&self, key: &str) -> Option<&str> {
        self.parameters.get(key).and_then(Value::as_str)
    }

    /// Copy with credentials masked, suitable for debug logging.
    pub fn redacted(&self) -> EngineConfig {
        let mut copy = self.clone();
        for key in SECRET_PARAMETERS {
            if let Some(value) = copy.parameters.get_mut(*key) {
                *value = Value::String(REDACTED.to_string());
            }
        }
        copy
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        let mut parameters = HashMap::new();
        parameters.insert(
            "modelName".to_string(),
            json!("google/gemini-2.0-flash-001"),
        );
        parameters.insert("bearer_token".to_string(), json!("${OPENROUTER_API_KEY}"));
        parameters.insert("temperature".to_string(), json!(0.0));
        parameters.insert("max_tokens".to_string(), json!(1024));

        EngineConfig {
            name: "openrouter".to_string(),
            engine: "openai".to_string(),
            connection: ConnectionConfig {
                protocol: "https".to_string(),
                hostname: "openrouter.ai".to_string(),
                port: 443,
                request_path: "/api/v1/chat/completions".to_string(),
            },
            parameters,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Neo4jConfig {
    pub uri: String,
    pub user: String,
    pub password: String,
    pub database: String,
}

impl Neo4jConfig {
    pub fn redacted(&self) -> Neo4jConfig {
        Neo4jConfig {
            password: REDACTED.to_string(),
            ..self.clone()
        }
    }
}

impl Default for Neo4jConfig {
    fn default() -> Self {
        Neo4jConfig {
            uri: "bolt://localhost:7687".to_string(),
            user: "neo4j".to_string(),
            password: "${NEO4J_PASSWORD}".to_string(),
            database: "neo4j".to_string(),
        }
    }
}

/// Knobs of the translate-validate-repair loop.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct PipelineConfig {
    pub max_repair_attempts: u32,
    pub exemplar_k: usize,
    pub default_limit: u64,
    pub oracle_timeout_secs: u64,
    pub request_timeout_secs: u64,
    /// Run the final query even when the loop ended exhausted.
    pub execute_unvalidated: bool,
    pub refuse_write_queries: bool,
    pub cache_schema: bool,
}

impl PipelineConfig {
    pub fn oracle_timeout(&self) -> Duration {
        Duration::from_secs(self.oracle_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig {
            max_repair_attempts: 3,
            exemplar_k: 3,
            default_limit: 100,
            oracle_timeout_secs: 30,
            request_timeout_secs: 30,
            execute_unvalidated: true,
            refuse_write_queries: true,
            cache_schema: false,
        }
    }
}

/// Query-language conventions enforced on every draft query.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct NamingConventions {
    pub scholar_label: String,
    pub scholar_name_property: String,
    pub default_name_property: String,
    pub case_fold_function: String,
    pub case_insensitive_properties: Vec<String>,
}

impl NamingConventions {
    pub fn name_property_for(&self, label: &str) -> &str {
        if label == self.scholar_label {
            &self.scholar_name_property
        } else {
            &self.default_name_property
        }
    }

    pub fn is_case_insensitive(&self, property: &str) -> bool {
        self.case_insensitive_properties
            .iter()
            .any(|p| p == property)
    }
}

impl Default for NamingConventions {
    fn default() -> Self {
        NamingConventions {
            scholar_label: "Scholar".to_string(),
            scholar_name_property: "knownName".to_string(),
            default_name_property: "name".to_string(),
            case_fold_function: "toLower".to_string(),
            case_insensitive_properties: ["name", "knownName", "category", "gender"]
                .iter()
                .map(|p| p.to_string())
                .collect(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub neo4j: Neo4jConfig,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub conventions: NamingConventions,
    #[serde(default)]
    pub exemplars_path: Option<PathBuf>,
}

pub trait VariableResolver {
    fn is_resolvable(&self, key: &str) -> bool;
    fn resolve(&self, key: &str) -> Result<String>;
}

pub struct EnvVarResolver {}

impl VariableResolver for EnvVarResolver {
    fn is_resolvable(&self, key: &str) -> bool {
        key.starts_with("${") && key.ends_with('}')
    }

    fn resolve(&self, key: &str) -> Result<String> {
        let env_key = &key[2..key.len() - 1];
        debug!("Looking up environment variable: {}", env_key);
        env::var(env_key)
            .map_err(|e| anyhow!("Failed to find environment variable '{}': {}", env_key, e))
    }
}

pub struct VariableResolverProcessor {
    resolvers: Vec<Arc<dyn VariableResolver>>,
}

impl Default for VariableResolverProcessor {
    fn default() -> Self {
        VariableResolverProcessor {
            resolvers: vec![Arc::new(EnvVarResolver {})],
        }
    }
}

impl VariableResolverProcessor {
    /// Replaces placeholders in place. Unresolvable placeholders are kept verbatim so
    /// commands that never touch the credential still work.
    pub fn resolve(&self, value: &mut Value) {
        match value {
            Value::String(s) => {
                for resolver in &self.resolvers {
                    if resolver.is_resolvable(s) {
                        match resolver.resolve(s) {
                            Ok(resolved) => *s = resolved,
                            Err(e) => debug!("Leaving placeholder unresolved: {}", e),
                        }
                        return;
                    }
                }
            }
            Value::Object(map) => {
                for (_, v) in map.iter_mut() {
                    self.resolve(v);
                }
            }
            Value::Array(arr) => {
                for item in arr.iter_mut() {
                    self.resolve(item);
                }
            }
            _ => {}
        }
    }
}

pub fn is_unresolved_placeholder(value: &str) -> bool {
    value.starts_with("${") && value.ends_with('}')
}

pub fn parse_key_value_pair(pair: &str) -> Option<(String, String)> {
    let (key, value) = pair.split_once('=')?;
    let key = key.trim();
    if key.is_empty() {
        return None;
    }
    Some((key.to_string(), value.trim().to_string()))
}

/// Converts a command-line string into the most specific JSON scalar it spells.
pub fn parse_override_value(raw: &str) -> Value {
    if let Ok(b) = raw.parse::<bool>() {
        return Value::Bool(b);
    }
    if let Ok(i) = raw.parse::<i64>() {
        return Value::from(i);
    }
    match raw.parse::<f64>().ok().and_then(serde_json::Number::from_f64) {
        Some(num) => Value::Number(num),
        None => Value::String(raw.to_string()),
    }
}

fn apply_overrides(config: &mut Value, overrides: &HashMap<String, Value>) -> Result<()> {
    for (key, value) in overrides {
        let mut keys = key.split('.').peekable();
        let mut current = config
            .as_object_mut()
            .ok_or_else(|| anyhow!("Configuration root is not an object"))?;
        while let Some(part) = keys.next() {
            if keys.peek().is_none() {
                current.insert(part.to_string(), value.clone());
            } else {
                current = current
                    .entry(part)
                    .or_insert_with(|| Value::Object(serde_json::Map::new()))
                    .as_object_mut()
                    .ok_or_else(|| anyhow!("Override '{}' crosses a non-object value", key))?;
            }
        }
    }
    Ok(())
}

fn merge_values(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Object(base_map), Value::Object(overlay_map)) => {
            for (key, value) in overlay_map {
                match base_map.get_mut(&key) {
                    Some(existing) => merge_values(existing, value),
                    None => {
                        base_map.insert(key, value);
                    }
                }
            }
        }
        (slot, value) => *slot = value,
    }
}

fn environment_overrides() -> HashMap<String, Value> {
    let mapping = [
        ("CYPHERLOOP_NEO4J_URI", "neo4j.uri"),
        ("CYPHERLOOP_NEO4J_USER", "neo4j.user"),
        ("CYPHERLOOP_NEO4J_PASSWORD", "neo4j.password"),
        ("CYPHERLOOP_NEO4J_DATABASE", "neo4j.database"),
        ("CYPHERLOOP_MODEL", "engine.parameters.modelName"),
    ];
    mapping
        .iter()
        .filter_map(|(var, key)| {
            env::var(var)
                .ok()
                .map(|value| (key.to_string(), Value::String(value)))
        })
        .collect()
}

fn parse_config_file(path: &Path, content: &str) -> Result<Value> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();
    let value = match extension.as_str() {
        "toml" => toml::from_str::<Value>(content).context("Invalid TOML configuration")?,
        "yaml" | "yml" => {
            serde_yaml::from_str::<Value>(content).context("Invalid YAML configuration")?
        }
        _ => serde_json::from_str::<Value>(content).context("Invalid JSON configuration")?,
    };
    Ok(value)
}

/// Loads the application configuration.
///
/// Defaults are overlaid with the file (when present), then environment overrides,
/// then explicit `key=value` overrides; `${VAR}` placeholders are resolved last.
pub fn load_config(
    config_path: Option<&Path>,
    overrides: &HashMap<String, String>,
) -> Result<AppConfig> {
    let mut config = serde_json::to_value(AppConfig::default())?;

    if let Some(path) = config_path {
        if path.exists() {
            let content = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            merge_values(&mut config, parse_config_file(path, &content)?);
            debug!("Loaded configuration from {}", path.display());
        } else {
            warn!(
                "Config file {} not found, using defaults",
                path.display()
            );
        }
    }

    apply_overrides(&mut config, &environment_overrides())?;

    let overrides: HashMap<String, Value> = overrides
        .iter()
        .map(|(k, v)| (k.clone(), parse_override_value(v)))
        .collect();
    apply_overrides(&mut config, &overrides)?;

    VariableResolverProcessor::default().resolve(&mut config);

    let config: AppConfig =
        serde_json::from_value(config).context("Could not parse application config")?;
    debug!("Engine config: {:?}", config.engine.redacted());
    debug!("Neo4j config: {:?}", config.neo4j.redacted());
    Ok(config)
}
