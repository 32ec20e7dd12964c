use std::future::Future;

use anyhow::{anyhow, Context, Result};
use cypherloop_core::config::EngineConfig;
use cypherloop_core::traits::Engine;
use cypherloop_core::types::{Request, Response};
use log::debug;
use reqwest::Client;
use serde_json::Value;

use crate::shared::{bearer_token, PayloadBuilder, ResponseParser, UrlBuilder};

/// OpenAI-compatible chat completions. OpenRouter speaks the same protocol.
pub struct OpenAIEngine {
    config: EngineConfig,
    client: Client,
}

impl OpenAIEngine {
    pub fn new(config: EngineConfig) -> Result<Self> {
        bearer_token(&config)?;
        Ok(Self {
            config,
            client: Client::new(),
        })
    }
}

impl Engine for OpenAIEngine {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn execute<'a>(
        &'a self,
        request: &'a Request,
    ) -> Box<dyn Future<Output = Result<Response>> + Send + 'a> {
        Box::new(async move {
            debug!("Config: {:?}", self.config.redacted());

            let payload = PayloadBuilder::build_chat_payload(request, &self.config)?;
            let url = UrlBuilder::build_default_url(&self.config);
            let auth_token = bearer_token(&self.config)?;

            let res = self
                .client
                .post(&url)
                .header("Authorization", format!("Bearer {}", auth_token))
                .header("Content-Type", "application/json")
                .json(&payload)
                .send()
                .await
                .with_context(|| format!("Request to {} failed", url))?;

            let status = res.status();
            let response_body = res.json::<Value>().await?;
            debug!("Response: {:?}", response_body);

            if !status.is_success() && response_body.get("error").is_none() {
                return Err(anyhow!("OpenAI API returned status {}", status));
            }

            let model = self.config.parameter_str("modelName").unwrap_or_default();
            ResponseParser::parse_openai_chat_response(&response_body, model)
        })
    }
}
