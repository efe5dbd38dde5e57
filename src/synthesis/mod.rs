
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::{CompletionConfig, Config};
use crate::provider::ProviderTransport;
use crate::retrieval::RetrievedContext;
use crate::{BrainError, ProviderError};

const COMPLETIONS_ENDPOINT: &str = "completions";

pub const SYSTEM_PROMPT: &str = "You are a helpful AI \"Second Brain\" assistant. Use the provided context snippets to answer concisely and helpfully. If the answer is not present in the context, say you don't know.";

const CONTEXT_SEPARATOR: &str = "\n\n---\n\n";

/// Render the completion prompt for `query` over the retrieved contexts
#[inline]
pub fn build_prompt(query: &str, contexts: &[RetrievedContext]) -> String {
    let context_text = contexts
        .iter()
        .map(|c| format!("Source: {}\nText: {}", c.source, c.text))
        .collect::<Vec<_>>()
        .join(CONTEXT_SEPARATOR);

    format!("{SYSTEM_PROMPT}\n\nContext:\n{context_text}\n\nUser query: {query}\n\nAnswer:")
}

#[derive(Debug, Clone)]
pub struct CompletionClient {
    transport: ProviderTransport,
    settings: CompletionConfig,
}

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    input: &'a str,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    output: String,
}

impl CompletionClient {
    #[inline]
    pub fn new(transport: ProviderTransport, settings: CompletionConfig) -> Self {
        Self {
            transport,
            settings,
        }
    }

    #[inline]
    pub fn from_config(config: &Config) -> crate::Result<Self> {
        Ok(Self::new(
            ProviderTransport::from_config(&config.provider)?,
            config.completion.clone(),
        ))
    }

    /// Send a raw prompt and return the trimmed completion text
    #[inline]
    pub fn complete(&self, prompt: &str) -> Result<String, ProviderError> {
        debug!(
            "Requesting completion from {} ({} prompt chars)",
            self.settings.model,
            prompt.len()
        );

        let request = CompletionRequest {
            model: &self.settings.model,
            input: prompt,
            max_tokens: self.settings.max_tokens,
            temperature: self.settings.temperature,
        };
        let response: CompletionResponse =
            self.transport.post_json(COMPLETIONS_ENDPOINT, &request)?;

        Ok(response.output.trim().to_string())
    }

    /// Answer `query` from `contexts` on the blocking pool
    #[inline]
    pub async fn synthesize(
        &self,
        query: &str,
        contexts: &[RetrievedContext],
    ) -> crate::Result<String> {
        let prompt = build_prompt(query, contexts);
        info!("Synthesizing answer from {} contexts", contexts.len());

        let client = self.clone();
        tokio::task::spawn_blocking(move || client.complete(&prompt))
            .await
            .map_err(|e| BrainError::Other(anyhow::anyhow!("completion task failed: {e}")))?
            .map_err(BrainError::from)
    }
}
