// Copyright 2025 CloudWeGo Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     https://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE};
use serde_json::Value;
use tracing::{debug, info};

use super::{prompts, response_text, ChatBackend, ChatMessage, ChatRequest, Dispatcher};
use crate::config::{Language, ModelConfig};
use crate::utils::errors::Error;
use crate::utils::llm::count_tokens_rough;

const PROBE_MAX_TOKENS: u32 = 50;

/// Chat-completions client for an Azure OpenAI deployment.
pub struct AzureChatClient {
    config: ModelConfig,
    client: reqwest::Client,
}

impl AzureChatClient {
    pub fn new(config: ModelConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    pub fn completions_url(&self) -> String {
        format!(
            "{}openai/deployments/{}/chat/completions?api-version={}",
            self.config.endpoint, self.config.deployment, self.config.api_version
        )
    }

    fn headers(&self) -> Result<HeaderMap, Error> {
        let mut headers = HeaderMap::new();
        headers.insert(
            "api-key",
            HeaderValue::from_str(&self.config.api_key)
                .map_err(|e| Error::Config(format!("api key is not a valid header: {e}")))?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        Ok(headers)
    }

    /// A single user message sampled with the configured temperature and token limit.
    pub fn user_request(&self, prompt: &str) -> ChatRequest {
        ChatRequest::new(vec![ChatMessage::user(prompt)])
            .temperature(self.config.temperature)
            .max_tokens(self.config.max_tokens)
    }

    /// Sends a tiny probe prompt to validate endpoint, key and deployment.
    pub async fn check_connection(&self, lang: Language) -> Result<String, Error> {
        let request = ChatRequest::new(vec![ChatMessage::user(prompts::connection_probe(lang))])
            .temperature(self.config.temperature)
            .max_tokens(PROBE_MAX_TOKENS);
        let response = self.complete(&request).await?;
        Ok(response_text(&response)?.trim().to_string())
    }
}

#[async_trait]
impl ChatBackend for AzureChatClient {
    async fn complete(&self, request: &ChatRequest) -> Result<Value, Error> {
        debug!(
            deployment = %self.config.deployment,
            messages = request.messages.len(),
            "sending chat completion request"
        );
        let response = self
            .client
            .post(self.completions_url())
            .headers(self.headers()?)
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Dispatch(format!("status {status}: {body}")));
        }
        Ok(response.json::<Value>().await?)
    }
}

#[async_trait]
impl Dispatcher for AzureChatClient {
    async fn dispatch(&self, prompt: &str) -> Result<String, Error> {
        info!(
            deployment = %self.config.deployment,
            prompt_tokens = count_tokens_rough(prompt),
            "dispatching prompt"
        );
        let response = self.complete(&self.user_request(prompt)).await?;
        response_text(&response)
    }
}
