use cypherloop_core::config::{load_config, parse_key_value_pair};
use std::collections::HashMap;
use std::io::Write;

#[test]
fn test_parse_key_value_pair() {
    assert_eq!(parse_key_value_pair("k=v"), Some(("k".into(), "v".into())));
    assert_eq!(parse_key_value_pair("k="), Some(("k".into(), "".into())));
    assert_eq!(
        parse_key_value_pair("pipeline.exemplar_k = 4"),
        Some(("pipeline.exemplar_k".into(), "4".into()))
    );
    assert_eq!(parse_key_value_pair("invalid"), None);
    assert_eq!(parse_key_value_pair("=v"), None);
}

#[test]
fn test_defaults_without_config_file() -> anyhow::Result<()> {
    let cfg = load_config(None, &HashMap::new())?;
    assert_eq!(cfg.pipeline.max_repair_attempts, 3);
    assert_eq!(cfg.pipeline.default_limit, 100);
    assert_eq!(cfg.pipeline.exemplar_k, 3);
    assert_eq!(cfg.conventions.scholar_name_property, "knownName");
    assert_eq!(cfg.engine.engine, "openai");
    Ok(())
}

#[test]
fn test_yaml_file_with_env_placeholder_and_overrides() -> anyhow::Result<()> {
    let mut file = tempfile::Builder::new().suffix(".yaml").tempfile()?;
    writeln!(
        file,
        r#"
neo4j:
  uri: bolt://graph:7687
  user: reader
  password: ${{CYPHERLOOP_TEST_NEO4J_PASSWORD}}
  database: nobel
pipeline:
  exemplar_k: 5
engine:
  name: claude
  engine: anthropic
  connection:
    protocol: https
    hostname: api.anthropic.com
    port: 443
    request_path: /v1/messages
  parameters:
    modelName: claude-model
"#
    )?;
    std::env::set_var("CYPHERLOOP_TEST_NEO4J_PASSWORD", "s3cret");

    let mut overrides = HashMap::new();
    overrides.insert("pipeline.max_repair_attempts".to_string(), "5".to_string());
    overrides.insert("pipeline.execute_unvalidated".to_string(), "false".to_string());

    let cfg = load_config(Some(file.path()), &overrides)?;
    assert_eq!(cfg.neo4j.uri, "bolt://graph:7687");
    assert_eq!(cfg.neo4j.password, "s3cret");
    assert_eq!(cfg.neo4j.database, "nobel");
    assert_eq!(cfg.pipeline.exemplar_k, 5);
    assert_eq!(cfg.pipeline.max_repair_attempts, 5);
    assert!(!cfg.pipeline.execute_unvalidated);
    assert_eq!(cfg.pipeline.default_limit, 100);
    assert_eq!(cfg.engine.engine, "anthropic");
    assert_eq!(cfg.engine.parameter_str("modelName"), Some("claude-model"));
    Ok(())
}

#[test]
fn test_toml_file_sets_conventions() -> anyhow::Result<()> {
    let mut file = tempfile::Builder::new().suffix(".toml").tempfile()?;
    writeln!(
        file,
        r#"
[conventions]
scholar_label = "Laureate"
case_insensitive_properties = ["name", "motivation"]
"#
    )?;

    let cfg = load_config(Some(file.path()), &HashMap::new())?;
    assert_eq!(cfg.conventions.scholar_label, "Laureate");
    assert_eq!(cfg.conventions.scholar_name_property, "knownName");
    assert!(cfg.conventions.is_case_insensitive("motivation"));
    assert!(!cfg.conventions.is_case_insensitive("category"));
    Ok(())
}

#[test]
fn test_unresolved_placeholder_is_kept() -> anyhow::Result<()> {
    std::env::remove_var("CYPHERLOOP_TEST_UNSET_KEY");
    let mut overrides = HashMap::new();
    overrides.insert(
        "engine.parameters.bearer_token".to_string(),
        "${CYPHERLOOP_TEST_UNSET_KEY}".to_string(),
    );
    let cfg = load_config(None, &overrides)?;
    assert_eq!(
        cfg.engine.parameter_str("bearer_token"),
        Some("${CYPHERLOOP_TEST_UNSET_KEY}")
    );
    Ok(())
}
