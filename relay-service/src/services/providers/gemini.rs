//! Gemini chat provider implementation.
//!
//! Every call sends the full conversation to `generateContent`; the service
//! keeps no server-side chat state.

use super::{ChatProvider, Conversation, ProviderError, Role};
use crate::config::{GeminiSettings, GenerationSettings};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

const API_KEY_HEADER: &str = "x-goog-api-key";

/// Gemini chat provider.
pub struct GeminiChatProvider {
    settings: GeminiSettings,
    client: Client,
}

impl GeminiChatProvider {
    pub fn new(settings: GeminiSettings) -> Result<Self, ProviderError> {
        if settings.api_key.is_empty() {
            return Err(ProviderError::NotConfigured(
                "Gemini API key not configured".to_string(),
            ));
        }

        let client = Client::builder()
            .timeout(settings.timeout)
            .build()
            .map_err(|e| ProviderError::NotConfigured(format!("HTTP client: {}", e)))?;

        Ok(Self { settings, client })
    }

    pub fn model(&self) -> &str {
        &self.settings.model
    }

    /// Build the API URL for the configured model and method.
    fn api_url(&self, method: &str) -> String {
        format!(
            "{}/models/{}:{}",
            self.settings.api_base, self.settings.model, method
        )
    }
}

fn build_request(
    conversation: &Conversation,
    text: &str,
    generation: &GenerationSettings,
) -> GenerateContentRequest {
    let mut contents: Vec<Content> = conversation
        .turns()
        .iter()
        .map(|turn| Content::text(turn.role, &turn.text))
        .collect();
    contents.push(Content::text(Role::User, text));

    GenerateContentRequest {
        contents,
        generation_config: GenerationConfig {
            temperature: generation.temperature,
            top_p: generation.top_p,
            top_k: generation.top_k,
            max_output_tokens: generation.max_output_tokens,
            response_mime_type: generation.response_mime_type.clone(),
        },
    }
}

fn extract_reply(response: GenerateContentResponse) -> Result<String, ProviderError> {
    if let Some(reason) = response
        .prompt_feedback
        .and_then(|feedback| feedback.block_reason)
    {
        tracing::warn!(block_reason = %reason, "Gemini blocked the prompt");
        return Err(ProviderError::ContentFiltered);
    }

    let candidate = response
        .candidates
        .into_iter()
        .next()
        .ok_or(ProviderError::EmptyResponse)?;

    if candidate.finish_reason.as_deref() == Some("SAFETY") {
        return Err(ProviderError::ContentFiltered);
    }

    let text: String = candidate
        .content
        .map(|content| {
            content
                .parts
                .into_iter()
                .filter_map(|part| part.text)
                .collect()
        })
        .unwrap_or_default();

    if text.is_empty() {
        return Err(ProviderError::EmptyResponse);
    }

    Ok(text)
}

#[async_trait]
impl ChatProvider for GeminiChatProvider {
    async fn send(
        &self,
        conversation: &mut Conversation,
        text: &str,
    ) -> Result<String, ProviderError> {
        let request = build_request(conversation, text, &self.settings.generation);

        tracing::debug!(
            model = %self.settings.model,
            prompt_len = text.len(),
            context_turns = conversation.len(),
            "Sending request to Gemini API"
        );

        let response = self
            .client
            .post(self.api_url("generateContent"))
            .header(API_KEY_HEADER, &self.settings.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| ProviderError::NetworkError(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();

            if status.as_u16() == 429 {
                return Err(ProviderError::RateLimited);
            }

            return Err(ProviderError::ApiError(format!(
                "Gemini API error {}: {}",
                status, error_text
            )));
        }

        let api_response: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::ApiError(format!("Failed to parse response: {}", e)))?;

        if let Some(usage) = &api_response.usage_metadata {
            tracing::debug!(
                input_tokens = usage.prompt_token_count.unwrap_or(0),
                output_tokens = usage.candidates_token_count.unwrap_or(0),
                "Gemini usage"
            );
        }

        let reply = extract_reply(api_response)?;
        conversation.push_exchange(text, &reply);
        Ok(reply)
    }

    async fn health_check(&self) -> Result<(), ProviderError> {
        // Listing models verifies the key without spending tokens.
        let url = format!("{}/models", self.settings.api_base);

        let response = self
            .client
            .get(&url)
            .header(API_KEY_HEADER, &self.settings.api_key)
            .send()
            .await
            .map_err(|e| ProviderError::NetworkError(e.to_string()))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(ProviderError::ApiError(format!(
                "Health check failed: {}",
                response.status()
            )))
        }
    }
}

// ============================================================================
// Gemini API Request/Response Types
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

impl Content {
    fn text(role: Role, text: &str) -> Self {
        let role = match role {
            Role::User => "user",
            Role::Model => "model",
        };
        Self {
            role: Some(role.to_string()),
            parts: vec![Part {
                text: Some(text.to_string()),
            }],
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    top_p: f32,
    top_k: u32,
    max_output_tokens: u32,
    response_mime_type: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
    #[serde(default)]
    usage_metadata: Option<UsageMetadata>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    prompt_token_count: Option<i32>,
    candidates_token_count: Option<i32>,
}
