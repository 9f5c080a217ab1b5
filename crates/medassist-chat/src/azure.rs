//! Azure OpenAI chat-completions generator.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::generator::AnswerGenerator;
use crate::prompt::build_messages;
use crate::types::ChatMessage;
use medassist_core::{AzureOpenAiConfig, Error, Result, RetryPolicy, ServiceFailure};

/// Sampling parameters sent with every completion request.
#[derive(Debug, Clone, Copy)]
pub struct GenerationSettings {
    pub temperature: f64,
    pub max_tokens: usize,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            max_tokens: 800,
        }
    }
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    messages: &'a [ChatMessage],
    temperature: f64,
    max_tokens: usize,
}

#[derive(Deserialize)]
struct CompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

pub struct AzureChatGenerator {
    client: Client,
    config: AzureOpenAiConfig,
    settings: GenerationSettings,
    retry: RetryPolicy,
}

impl AzureChatGenerator {
    pub fn new(
        config: AzureOpenAiConfig,
        settings: GenerationSettings,
        retry: RetryPolicy,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(retry.timeout)
            .build()
            .map_err(|e| Error::Config(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            config,
            settings,
            retry,
        })
    }

    async fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
        let url = self.config.operation_url("chat/completions");
        let response = self
            .client
            .post(&url)
            .header("api-key", &self.config.api_key)
            .json(&CompletionRequest {
                messages,
                temperature: self.settings.temperature,
                max_tokens: self.settings.max_tokens,
            })
            .send()
            .await
            .map_err(|e| Error::GenerationService(ServiceFailure::transport(e.to_string())))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::GenerationService(ServiceFailure::http(status, body)));
        }

        let parsed: CompletionResponse = response
            .json()
            .await
            .map_err(|e| Error::GenerationService(ServiceFailure::malformed(e.to_string())))?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| {
                Error::GenerationService(ServiceFailure::malformed("response contained no message"))
            })
    }
}

#[async_trait]
impl AnswerGenerator for AzureChatGenerator {
    async fn generate(&self, question: &str, contexts: &[String]) -> Result<String> {
        let messages = build_messages(question, contexts);
        debug!(
            "Generating answer from {} passages with {}",
            contexts.len(),
            self.config.deployment_name
        );
        let answer = self
            .retry
            .run("chat completion", || self.complete(&messages))
            .await?;
        info!("Generated answer ({} chars)", answer.chars().count());
        Ok(answer)
    }
}
