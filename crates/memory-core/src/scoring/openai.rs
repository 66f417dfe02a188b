use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::memory::Memory;
use crate::scoring::Scoring;

/// Calls OpenAI's embeddings and chat-completions endpoints for the
/// four `Scoring` operations. Topic/importance/summary prompts use a
/// short system instruction plus a focused user message, with the
/// response parsed defensively since the model returns free text, not
/// structured output.
pub struct OpenAiScoring {
    api_key: String,
    embedding_model: String,
    chat_model: String,
    dimensions: usize,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct EmbeddingRequest {
    model: String,
    input: Vec<String>,
    dimensions: usize,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

#[derive(Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    max_completion_tokens: u32,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: String,
}

impl OpenAiScoring {
    pub fn new(api_key: String, embedding_model: String, chat_model: String, dimensions: usize) -> Self {
        Self {
            api_key,
            embedding_model,
            chat_model,
            dimensions,
            client: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(30))
                .connect_timeout(std::time::Duration::from_secs(10))
                .build()
                .unwrap_or_else(|e| {
                    tracing::error!(error = %e, "failed to build HTTP client with timeouts, using default");
                    reqwest::Client::default()
                }),
        }
    }

    async fn chat_completion(&self, system: &str, user: String, max_tokens: u32) -> Result<String> {
        let mut messages = Vec::new();
        if !system.is_empty() {
            messages.push(ChatMessage { role: "system", content: system.to_string() });
        }
        messages.push(ChatMessage { role: "user", content: user });

        let request = ChatRequest {
            model: self.chat_model.clone(),
            messages,
            max_completion_tokens: max_tokens,
        };

        let response = self
            .client
            .post("https://api.openai.com/v1/chat/completions")
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Scoring(format!("OpenAI API error {status}: {body}")));
        }

        let resp: ChatResponse = response.json().await?;
        resp.choices
            .into_iter()
            .next()
            .map(|c| c.message.content.trim().to_string())
            .ok_or_else(|| Error::Scoring("empty chat completion".to_string()))
    }
}

#[async_trait::async_trait]
impl Scoring for OpenAiScoring {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let request = EmbeddingRequest {
            model: self.embedding_model.clone(),
            input: vec![text.to_string()],
            dimensions: self.dimensions,
        };

        let response = self
            .client
            .post("https://api.openai.com/v1/embeddings")
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Scoring(format!("OpenAI API error {status}: {body}")));
        }

        let resp: EmbeddingResponse = response.json().await?;
        resp.data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| Error::Scoring("empty response from OpenAI".to_string()))
    }

    async fn extract_topics(&self, text: &str, max_k: usize) -> Result<Vec<String>> {
        let system = "Extract up to a handful of key topics/keywords from this text. \
            Return ONLY a comma-separated list, no explanation.";
        let reply = self.chat_completion(system, text.to_string(), 500).await?;
        let topics: Vec<String> = reply
            .split(',')
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .take(max_k)
            .collect();
        Ok(topics)
    }

    async fn score_importance(&self, text: &str, context: Option<&str>) -> Result<f32> {
        let prompt = format!(
            "Rate the importance of this memory on a scale of 0.0 to 1.0, where:\n\
             - 0.0-0.3: Trivial/routine (weather, small talk)\n\
             - 0.4-0.6: Moderate (preferences, daily events)\n\
             - 0.7-0.9: Important (decisions, relationships, learnings)\n\
             - 1.0: Critical (life events, core beliefs, major insights)\n\n\
             {}Memory: {text}\n\n\
             Return ONLY a number between 0.0 and 1.0.",
            context.map(|c| format!("Context: {c}\n\n")).unwrap_or_default(),
        );
        let reply = self.chat_completion("", prompt, 200).await?;
        // Falling back to a neutral default on parse failure is the
        // caller's call, not this adapter's — it just surfaces what the
        // provider returned or an error.
        reply
            .trim()
            .parse::<f32>()
            .map(|v| v.clamp(0.0, 1.0))
            .map_err(|_| Error::Scoring(format!("could not parse importance score from {reply:?}")))
    }

    async fn summarize(&self, memories: &[Memory]) -> Result<String> {
        if memories.is_empty() {
            return Err(Error::Validation("summarize requires at least one memory".to_string()));
        }
        if memories.len() == 1 {
            return Ok(memories[0].content.clone());
        }
        let body: String = memories
            .iter()
            .map(|m| format!("- {} (created: {})", m.content, m.created_at))
            .collect::<Vec<_>>()
            .join("\n\n");
        let system = "You are compressing multiple related memories into one coherent summary. \
            Preserve key facts and context. Be concise but complete.";
        let user = format!("Summarize these {} related memories:\n\n{body}", memories.len());
        self.chat_completion(system, user, 1500).await
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    #[ignore] // requires OPENAI_API_KEY
    async fn live_embed_smoke_test() {
        let api_key = std::env::var("OPENAI_API_KEY").unwrap();
        let scoring = OpenAiScoring::new(
            api_key,
            "text-embedding-3-small".to_string(),
            "gpt-5-mini".to_string(),
            1536,
        );
        let result = scoring.embed("hello world").await.unwrap();
        assert_eq!(result.len(), 1536);
    }
}
