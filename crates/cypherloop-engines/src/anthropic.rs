use std::future::Future;

use anyhow::{anyhow, Context, Result};
use cypherloop_core::config::EngineConfig;
use cypherloop_core::traits::Engine;
use cypherloop_core::types::{Request, Response};
use log::debug;
use reqwest::Client;
use serde_json::Value;

use crate::shared::{bearer_token, PayloadBuilder, ResponseParser, UrlBuilder};

const ANTHROPIC_VERSION: &str = "2023-06-01";

pub struct AnthropicEngine {
    config: EngineConfig,
    client: Client,
}

impl AnthropicEngine {
    pub fn new(config: EngineConfig) -> Result<Self> {
        bearer_token(&config)?;
        Ok(Self {
            config,
            client: Client::new(),
        })
    }
}

impl Engine for AnthropicEngine {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn execute<'a>(
        &'a self,
        request: &'a Request,
    ) -> Box<dyn Future<Output = Result<Response>> + Send + 'a> {
        Box::new(async move {
            let payload = PayloadBuilder::build_anthropic_payload(request, &self.config)?;
            debug!("Anthropic Payload model: {}", payload["model"]);

            let url = UrlBuilder::build_default_url(&self.config);
            let api_key = bearer_token(&self.config)?;

            let res = self
                .client
                .post(&url)
                .header("x-api-key", api_key)
                .header("anthropic-version", ANTHROPIC_VERSION)
                .header("Content-Type", "application/json")
                .json(&payload)
                .send()
                .await
                .with_context(|| format!("Request to {} failed", url))?;

            let status = res.status();
            let response_body = res.json::<Value>().await?;
            debug!("Anthropic Response: {:?}", response_body);

            if !status.is_success() && response_body.get("error").is_none() {
                return Err(anyhow!("Anthropic API returned status {}", status));
            }

            let model = self.config.parameter_str("modelName").unwrap_or_default();
            ResponseParser::parse_anthropic_response(&response_body, model)
        })
    }
}
