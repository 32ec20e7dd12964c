use anyhow::{anyhow, Result};
use cypherloop_core::config::EngineConfig;
use cypherloop_core::types::Request;
use serde_json::{json, Value};

/// Utility for building request payloads consistently across engines
pub struct PayloadBuilder;

impl PayloadBuilder {
    fn model(config: &EngineConfig) -> Result<&str> {
        config
            .parameter_str("modelName")
            .ok_or_else(|| anyhow!("Model name not specified or not a string"))
    }

    /// Accepts numbers given either as JSON numbers or as strings.
    fn integer(value: &Value) -> Option<i64> {
        value
            .as_i64()
            .or_else(|| value.as_str().and_then(|s| s.trim().parse::<i64>().ok()))
    }

    fn float(value: &Value) -> Option<f64> {
        value
            .as_f64()
            .or_else(|| value.as_str().and_then(|s| s.trim().parse::<f64>().ok()))
    }

    fn apply_sampling(payload: &mut Value, config: &EngineConfig) {
        if let Some(max_tokens) = config.parameters.get("max_tokens").and_then(Self::integer) {
            payload["max_tokens"] = json!(max_tokens);
        }
        for key in ["temperature", "top_p"] {
            if let Some(num) = config.parameters.get(key).and_then(Self::float) {
                payload[key] = json!(num);
            }
        }
    }

    /// OpenAI-compatible chat completion payload (also served by OpenRouter).
    pub fn build_chat_payload(request: &Request, config: &EngineConfig) -> Result<Value> {
        let mut payload = json!({
            "model": Self::model(config)?,
            "messages": [
                {
                    "role": "user",
                    "content": request.payload
                }
            ]
        });
        Self::apply_sampling(&mut payload, config);

        for param in ["frequency_penalty", "presence_penalty", "stop", "seed"] {
            if let Some(value) = config.parameters.get(param) {
                payload[param] = value.clone();
            }
        }
        Ok(payload)
    }

    /// Anthropic messages payload; `max_tokens` is mandatory there.
    pub fn build_anthropic_payload(request: &Request, config: &EngineConfig) -> Result<Value> {
        let mut payload = json!({
            "model": Self::model(config)?,
            "max_tokens": 1024,
            "messages": [
                {
                    "role": "user",
                    "content": request.payload
                }
            ]
        });
        Self::apply_sampling(&mut payload, config);
        Ok(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> Request {
        Request {
            flowname: "generate_query".to_string(),
            payload: "question".to_string(),
        }
    }

    #[test]
    fn test_chat_payload_coerces_string_numbers() {
        let mut config = EngineConfig::default();
        config
            .parameters
            .insert("max_tokens".to_string(), json!("512"));
        config
            .parameters
            .insert("temperature".to_string(), json!("0.1"));

        let payload = PayloadBuilder::build_chat_payload(&request(), &config).unwrap();
        assert_eq!(payload["model"], json!("google/gemini-2.0-flash-001"));
        assert_eq!(payload["max_tokens"], json!(512));
        assert_eq!(payload["temperature"], json!(0.1));
        assert_eq!(payload["messages"][0]["content"], json!("question"));
    }

    #[test]
    fn test_missing_model_is_an_error() {
        let mut config = EngineConfig::default();
        config.parameters.remove("modelName");
        assert!(PayloadBuilder::build_anthropic_payload(&request(), &config).is_err());
    }

    #[test]
    fn test_anthropic_payload_has_default_max_tokens() {
        let mut config = EngineConfig::default();
        config.parameters.remove("max_tokens");
        let payload = PayloadBuilder::build_anthropic_payload(&request(), &config).unwrap();
        assert_eq!(payload["max_tokens"], json!(1024));
    }
}
