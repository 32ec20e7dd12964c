use anyhow::{anyhow, Result};
use cypherloop_core::cypher;
use cypherloop_core::types::{Response, Usage};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

static FENCE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"```(?:[A-Za-z]+[ \t]*\n|[ \t]*\n?)([\s\S]*?)(?:```|\z)").expect("valid regex")
});

static TAG_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?i:cypher)(?::\s*|\s+)").expect("valid regex"));

/// Shared response parsing utilities for engines
pub struct ResponseParser;

impl ResponseParser {
    fn token_count(value: &Value) -> u32 {
        value.as_u64().unwrap_or(0) as u32
    }

    /// Parse OpenAI-style chat completion response
    pub fn parse_openai_chat_response(response: &Value, model: &str) -> Result<Response> {
        if let Some(error) = response.get("error") {
            return Err(anyhow!("OpenAI API error: {}", error));
        }

        let content = response["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| anyhow!("Failed to extract content from response"))?
            .to_string();

        let usage = Usage {
            prompt_tokens: Self::token_count(&response["usage"]["prompt_tokens"]),
            completion_tokens: Self::token_count(&response["usage"]["completion_tokens"]),
            total_tokens: Self::token_count(&response["usage"]["total_tokens"]),
        };

        let finish_reason = response["choices"][0]["finish_reason"]
            .as_str()
            .map(String::from);

        Ok(Response {
            content,
            usage,
            model: response["model"].as_str().unwrap_or(model).to_string(),
            finish_reason,
        })
    }

    /// Parse Anthropic-style response
    pub fn parse_anthropic_response(response: &Value, model: &str) -> Result<Response> {
        if let Some(error) = response.get("error") {
            return Err(anyhow!("Anthropic API error: {}", error));
        }

        let content = response["content"]
            .as_array()
            .map(|blocks| {
                blocks
                    .iter()
                    .filter_map(|block| block["text"].as_str())
                    .collect::<Vec<_>>()
                    .join("")
            })
            .filter(|text| !text.is_empty())
            .ok_or_else(|| anyhow!("Failed to extract content from Anthropic response"))?;

        let mut usage = Usage {
            prompt_tokens: Self::token_count(&response["usage"]["input_tokens"]),
            completion_tokens: Self::token_count(&response["usage"]["output_tokens"]),
            total_tokens: 0,
        };
        usage.total_tokens = usage.prompt_tokens + usage.completion_tokens;

        let finish_reason = response["stop_reason"].as_str().map(String::from);

        Ok(Response {
            content,
            usage,
            model: model.to_string(),
            finish_reason,
        })
    }

    /// Pulls a single-line query out of free-form model output.
    ///
    /// Handles fenced blocks, a leading `cypher` tag, `{"query": ...}` objects and
    /// surrounding quotes. Returns an empty string when nothing usable is left.
    pub fn extract_query(content: &str) -> String {
        let mut text = content.trim();

        if let Some(fenced) = Self::fenced_block(text) {
            text = fenced;
        }

        if text.starts_with('{') {
            if let Ok(value) = serde_json::from_str::<Value>(text) {
                if let Some(query) = ["query", "cypher"]
                    .iter()
                    .find_map(|key| value[key].as_str())
                {
                    return cypher::single_line(query);
                }
            }
        }

        if let Some(tag) = TAG_RE.find(text) {
            text = &text[tag.end()..];
        }

        for quote in ['"', '\'', '`'] {
            if text.len() >= 2 && text.starts_with(quote) && text.ends_with(quote) {
                text = &text[1..text.len() - 1];
                break;
            }
        }

        cypher::single_line(text)
    }

    fn fenced_block(text: &str) -> Option<&str> {
        FENCE_RE
            .captures(text)
            .and_then(|caps| caps.get(1))
            .map(|body| body.as_str().trim())
    }

    /// Returns the first balanced JSON object in the text.
    pub fn extract_json_object(content: &str) -> Option<Value> {
        let text = Self::fenced_block(content).unwrap_or(content);
        let bytes = text.as_bytes();
        let mut start = None;
        let mut depth = 0usize;
        let mut in_string = false;
        let mut escaped = false;

        for (i, &b) in bytes.iter().enumerate() {
            if in_string {
                match b {
                    _ if escaped => escaped = false,
                    b'\\' => escaped = true,
                    b'"' => in_string = false,
                    _ => {}
                }
                continue;
            }
            match b {
                b'"' if start.is_some() => in_string = true,
                b'{' => {
                    if start.is_none() {
                        start = Some(i);
                    }
                    depth += 1;
                }
                b'}' if start.is_some() => {
                    depth -= 1;
                    if depth == 0 {
                        let s = start?;
                        let value = serde_json::from_str::<Value>(&text[s..=i]).ok()?;
                        return Some(match value.get("pruned_schema") {
                            Some(inner) if inner.is_object() => inner.clone(),
                            _ => value,
                        });
                    }
                }
                _ => {}
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_openai_chat_response() {
        let body = json!({
            "model": "google/gemini-2.0-flash-001",
            "choices": [{"message": {"content": "MATCH (n) RETURN n.name"}, "finish_reason": "stop"}],
            "usage": {"prompt_tokens": 10, "completion_tokens": 5, "total_tokens": 15}
        });
        let response = ResponseParser::parse_openai_chat_response(&body, "fallback").unwrap();
        assert_eq!(response.content, "MATCH (n) RETURN n.name");
        assert_eq!(response.usage.total_tokens, 15);
        assert_eq!(response.model, "google/gemini-2.0-flash-001");
        assert_eq!(response.finish_reason.as_deref(), Some("stop"));
    }

    #[test]
    fn test_parse_openai_error_body() {
        let body = json!({"error": {"message": "invalid key"}});
        assert!(ResponseParser::parse_openai_chat_response(&body, "m").is_err());
    }

    #[test]
    fn test_parse_anthropic_response_totals_tokens() {
        let body = json!({
            "content": [{"type": "text", "text": "MATCH (n) RETURN n"}],
            "usage": {"input_tokens": 7, "output_tokens": 3},
            "stop_reason": "end_turn"
        });
        let response = ResponseParser::parse_anthropic_response(&body, "claude").unwrap();
        assert_eq!(response.usage.total_tokens, 10);
        assert_eq!(response.content, "MATCH (n) RETURN n");
    }

    #[test]
    fn test_extract_query_from_fenced_block() {
        let content = "Here you go:\n```cypher\nMATCH (s:Scholar)\nRETURN s.knownName\n```\n";
        assert_eq!(
            ResponseParser::extract_query(content),
            "MATCH (s:Scholar) RETURN s.knownName"
        );
    }

    #[test]
    fn test_extract_query_strips_tag_and_quotes() {
        assert_eq!(
            ResponseParser::extract_query("cypher MATCH (n) RETURN n.name"),
            "MATCH (n) RETURN n.name"
        );
        assert_eq!(
            ResponseParser::extract_query("\"MATCH (n) RETURN n.name\""),
            "MATCH (n) RETURN n.name"
        );
    }

    #[test]
    fn test_extract_query_from_json() {
        assert_eq!(
            ResponseParser::extract_query(r#"{"query": "MATCH (p:Prize)\n RETURN p.category"}"#),
            "MATCH (p:Prize) RETURN p.category"
        );
    }

    #[test]
    fn test_extract_query_empty() {
        assert_eq!(ResponseParser::extract_query("  ```\n```  "), "");
    }

    #[test]
    fn test_extract_json_object_unwraps_pruned_schema() {
        let content = r#"Sure! {"pruned_schema": {"nodes": [{"label": "Prize", "properties": []}], "edges": []}} done"#;
        let value = ResponseParser::extract_json_object(content).unwrap();
        assert_eq!(value["nodes"][0]["label"], json!("Prize"));
    }

    #[test]
    fn test_extract_json_object_ignores_braces_in_strings() {
        let content = r#"{"nodes": [{"label": "A}", "properties": []}], "edges": []}"#;
        let value = ResponseParser::extract_json_object(content).unwrap();
        assert_eq!(value["nodes"][0]["label"], json!("A}"));
    }

    #[test]
    fn test_extract_json_object_none() {
        assert!(ResponseParser::extract_json_object("no schema here").is_none());
    }
}
