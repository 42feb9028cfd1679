//! Replicate LLM Provider
//!
//! Runs hosted models through Replicate's predictions API. The request asks
//! the server to hold the connection open (`Prefer: wait`); if the
//! prediction is still running when that returns, the provider polls the
//! prediction URL until it reaches a terminal status.
//!
//! Llama 3 instruct models need their chat template spelled out, so the
//! provider sends `prompt_template` alongside the prompt.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

use super::{CompletionRequest, LLMError, LLMProvider, Result};
use crate::config::ReplicateConfig;

/// Llama 3 instruct chat template
pub const LLAMA3_PROMPT_TEMPLATE: &str = "<|begin_of_text|><|start_header_id|>system<|end_header_id|>\n\n{system_prompt}<|eot_id|><|start_header_id|>user<|end_header_id|>\n\n{prompt}<|eot_id|><|start_header_id|>assistant<|end_header_id|>\n\n";

/// Delay between polls of a running prediction
const POLL_INTERVAL: Duration = Duration::from_millis(750);

/// Polls before giving up on a prediction
const MAX_POLLS: usize = 400;

pub struct ReplicateProvider {
    base_url: String,
    model: String,
    api_token: String,
    prompt_template: Option<String>,
    client: reqwest::Client,
}

/// Prediction object returned by Replicate
#[derive(Debug, Deserialize)]
struct Prediction {
    status: String,
    #[serde(default)]
    output: Option<serde_json::Value>,
    #[serde(default)]
    error: Option<serde_json::Value>,
    #[serde(default)]
    urls: Option<PredictionUrls>,
}

#[derive(Debug, Deserialize)]
struct PredictionUrls {
    get: Option<String>,
}

impl ReplicateProvider {
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        api_token: impl Into<String>,
    ) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            api_token: api_token.into(),
            prompt_template: Some(LLAMA3_PROMPT_TEMPLATE.to_string()),
            client: reqwest::Client::new(),
        }
    }

    pub fn from_config(config: &ReplicateConfig) -> Result<Self> {
        let api_token = std::env::var(&config.api_key_env).map_err(|_| {
            LLMError::AuthenticationFailed(format!("{} is not set", config.api_key_env))
        })?;
        let mut provider = Self::new(config.base_url.clone(), config.model.clone(), api_token);
        provider.prompt_template = config
            .prompt_template
            .clone()
            .filter(|t| !t.is_empty());
        Ok(provider)
    }

    /// Drop the chat template, for models that apply their own
    pub fn without_prompt_template(mut self) -> Self {
        self.prompt_template = None;
        self
    }

    fn payload(&self, request: &CompletionRequest) -> serde_json::Value {
        let mut input = json!({
            "prompt": request.transcript,
            "system_prompt": request.instructions,
            "temperature": request.sampling.temperature,
            "max_tokens": request.sampling.max_tokens,
            "top_p": request.sampling.top_p,
        });
        if let Some(template) = &self.prompt_template {
            input["prompt_template"] = json!(template);
        }
        json!({ "input": input })
    }

    async fn read_prediction(&self, response: reqwest::Response) -> Result<Prediction> {
        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(super::map_status_error(status, text));
        }

        response
            .json()
            .await
            .map_err(|e| LLMError::ParseError(format!("Failed to parse prediction: {}", e)))
    }

    async fn poll(&self, url: &str) -> Result<Prediction> {
        let response = self
            .client
            .get(url)
            .bearer_auth(&self.api_token)
            .send()
            .await
            .map_err(|e| super::map_send_error("Replicate", &self.base_url, e))?;
        self.read_prediction(response).await
    }
}

/// Streaming language models return their output as a list of tokens
fn join_output(output: &serde_json::Value) -> String {
    match output {
        serde_json::Value::Array(parts) => parts
            .iter()
            .map(|part| match part {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect(),
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[async_trait]
impl LLMProvider for ReplicateProvider {
    fn name(&self) -> &str {
        "replicate"
    }

    fn is_local(&self) -> bool {
        false
    }

    async fn check_health(&self) -> bool {
        !self.api_token.is_empty()
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        let url = format!("{}/models/{}/predictions", self.base_url, self.model);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_token)
            .header("Prefer", "wait")
            .json(&self.payload(request))
            .send()
            .await
            .map_err(|e| super::map_send_error("Replicate", &self.base_url, e))?;

        let mut prediction = self.read_prediction(response).await?;
        let mut polls = 0;

        loop {
            match prediction.status.as_str() {
                "succeeded" => {
                    let text = prediction
                        .output
                        .as_ref()
                        .map(join_output)
                        .unwrap_or_default();
                    return Ok(text.trim().to_string());
                }
                "failed" | "canceled" => {
                    let reason = prediction
                        .error
                        .as_ref()
                        .map(join_output)
                        .unwrap_or_else(|| prediction.status.clone());
                    return Err(LLMError::InvalidRequest(format!(
                        "Prediction {}",
                        reason
                    )));
                }
                _ => {}
            }

            if polls >= MAX_POLLS {
                return Err(LLMError::Timeout);
            }

            let get_url = prediction
                .urls
                .as_ref()
                .and_then(|u| u.get.clone())
                .ok_or_else(|| {
                    LLMError::ParseError("Running prediction has no poll URL".to_string())
                })?;

            tracing::debug!("Prediction still {}, polling", prediction.status);
            tokio::time::sleep(POLL_INTERVAL).await;
            polls += 1;
            prediction = self.poll(&get_url).await?;
        }
    }
}
