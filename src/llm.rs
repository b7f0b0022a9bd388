//! Model routing for the optional polish pass.
//!
//! The configured model string selects a backend by prefix: `openai/` goes
//! through the OpenAI API, `ollama/` and `watsonx/` through their HTTP
//! endpoints. Anything else is a configuration error.

use crate::config::Config;
use crate::error::{AnalyzerError, Result};
use async_openai::config::OpenAIConfig;
use async_openai::types::{
    ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
    CreateChatCompletionRequestArgs,
};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

const POLISH_SYSTEM_PROMPT: &str = "You are a technical writer. Rewrite the given project \
description as one fluent paragraph. Keep every fact, add nothing, and do not use lists.";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Dispatches polish requests to the backend named by the model prefix
pub struct LlmRouter {
    model: String,
    ollama_url: String,
    watsonx_url: String,
    http: reqwest::Client,
}

#[derive(Deserialize)]
struct OllamaResponse {
    response: String,
}

#[derive(Deserialize)]
struct WatsonxResponse {
    results: Vec<WatsonxResult>,
}

#[derive(Deserialize)]
struct WatsonxResult {
    generated_text: String,
}

impl LlmRouter {
    pub fn from_config(config: &Config) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            model: config.model.clone(),
            ollama_url: config.ollama_url.clone(),
            watsonx_url: config.watsonx_url.clone(),
            http,
        })
    }

    /// Backend-qualified model string, e.g. `openai/gpt-4o-mini`
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Rewrites the heuristic draft into fluent prose
    pub async fn polish(&self, draft: &str) -> Result<String> {
        if let Some(model) = self.model.strip_prefix("openai/") {
            self.polish_openai(model, draft).await
        } else if let Some(model) = self.model.strip_prefix("ollama/") {
            self.polish_ollama(model, draft).await
        } else if let Some(model) = self.model.strip_prefix("watsonx/") {
            self.polish_watsonx(model, draft).await
        } else {
            Err(AnalyzerError::Config(format!(
                "unknown model prefix in '{}'",
                self.model
            )))
        }
    }

    async fn polish_openai(&self, model: &str, draft: &str) -> Result<String> {
        let client = async_openai::Client::<OpenAIConfig>::new();
        let request = CreateChatCompletionRequestArgs::default()
            .model(model)
            .messages([
                ChatCompletionRequestSystemMessageArgs::default()
                    .content(POLISH_SYSTEM_PROMPT)
                    .build()?
                    .into(),
                ChatCompletionRequestUserMessageArgs::default()
                    .content(draft)
                    .build()?
                    .into(),
            ])
            .build()?;
        let response = client.chat().create(request).await?;
        let content = response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .unwrap_or_default();
        Ok(content.trim().to_string())
    }

    async fn polish_ollama(&self, model: &str, draft: &str) -> Result<String> {
        let url = format!("{}/api/generate", self.ollama_url.trim_end_matches('/'));
        let body = json!({
            "model": model,
            "prompt": format!("{POLISH_SYSTEM_PROMPT}\n\n{draft}"),
            "stream": false,
        });
        let response = self
            .http
            .post(&url)
            .json(&body)
            .send()
            .await?
            .error_for_status()?;
        let parsed: OllamaResponse = response.json().await?;
        Ok(parsed.response.trim().to_string())
    }

    async fn polish_watsonx(&self, model: &str, draft: &str) -> Result<String> {
        let key = std::env::var("WATSONX_API_KEY")
            .map_err(|_| AnalyzerError::Config("WATSONX_API_KEY is not set".to_string()))?;
        let url = format!("{}/v2/inference", self.watsonx_url.trim_end_matches('/'));
        let body = json!({
            "model_id": model,
            "input": {
                "messages": [
                    {"role": "system", "content": POLISH_SYSTEM_PROMPT},
                    {"role": "user", "content": draft},
                ],
            },
        });
        let response = self
            .http
            .post(&url)
            .bearer_auth(key)
            .json(&body)
            .send()
            .await?
            .error_for_status()?;
        let parsed: WatsonxResponse = response.json().await?;
        parsed
            .results
            .into_iter()
            .next()
            .map(|result| result.generated_text.trim().to_string())
            .ok_or_else(|| AnalyzerError::Llm("watsonx returned no results".to_string()))
    }
}
