//! Chat completion client (Gemini generateContent API) and the retrieval
//! prompt template.

use crate::error::{RagserveError, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const GENERATE_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";

/// Standard reply when the retrieved context does not contain the answer.
/// This is a normal successful response, not an error.
pub const ANSWER_FALLBACK: &str = "I could not find the answer in your documents.";

const PROMPT_TEMPLATE: &str = "\
You are a professional assistant answering questions about a documented knowledge base.

RULES:
1. Answer in a professional, confident, concise tone.
2. Use ONLY the provided context for questions about the documented material.
3. If the information is not available in the context, reply exactly:
   \"I could not find the answer in your documents.\"
4. Never invent details that are not part of the provided context.
5. Keep answers direct and structured, with no filler talk.

Context:
{context}

Question: {input}
";

/// Fill the prompt template with retrieved context and the user question.
pub fn build_prompt(context: &str, question: &str) -> String {
    PROMPT_TEMPLATE
        .replace("{context}", context)
        .replace("{input}", question)
}

#[derive(Serialize)]
struct GenerateRequest {
    contents: Vec<Content>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Serialize, Deserialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Serialize, Deserialize)]
struct Part {
    text: String,
}

#[derive(Serialize)]
struct GenerationConfig {
    temperature: f32,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<Content>,
}

/// Gemini chat completion client
#[derive(Clone)]
pub struct GeminiChat {
    client: Client,
    api_key: String,
    model: String,
}

impl GeminiChat {
    pub fn new(api_key: String, model: String) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| RagserveError::Chat(format!("HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_key,
            model,
        })
    }

    /// Send a prompt and return the model's text output.
    ///
    /// Returns an empty string when the model produced no candidates; the
    /// caller decides how to present that.
    pub async fn complete(&self, prompt: &str) -> Result<String> {
        let request = GenerateRequest {
            contents: vec![Content {
                parts: vec![Part {
                    text: prompt.to_string(),
                }],
            }],
            generation_config: GenerationConfig { temperature: 0.0 },
        };

        let response = self
            .client
            .post(format!(
                "{}/{}:generateContent",
                GENERATE_BASE_URL, self.model
            ))
            .header("x-goog-api-key", &self.api_key)
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| RagserveError::Chat(format!("Network error: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read error response".to_string());
            return Err(RagserveError::Chat(format!(
                "Gemini API error {}: {}",
                status, body
            )));
        }

        let body: GenerateResponse = response
            .json()
            .await
            .map_err(|e| RagserveError::Chat(format!("Failed to parse response: {}", e)))?;

        let text = body
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|c| {
                c.parts
                    .into_iter()
                    .map(|p| p.text)
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();

        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_prompt_substitutes_placeholders() {
        let prompt = build_prompt("some retrieved text", "who are you?");
        assert!(prompt.contains("some retrieved text"));
        assert!(prompt.contains("Question: who are you?"));
        assert!(!prompt.contains("{context}"));
        assert!(!prompt.contains("{input}"));
    }

    #[test]
    fn test_parse_generate_response() {
        let json = r#"{
            "candidates": [
                {"content": {"parts": [{"text": "Hello "}, {"text": "there"}]}}
            ]
        }"#;
        let parsed: GenerateResponse = serde_json::from_str(json).unwrap();
        let text: String = parsed.candidates[0]
            .content
            .as_ref()
            .unwrap()
            .parts
            .iter()
            .map(|p| p.text.clone())
            .collect();
        assert_eq!(text, "Hello there");
    }

    #[test]
    fn test_parse_empty_response() {
        let parsed: GenerateResponse = serde_json::from_str("{}").unwrap();
        assert!(parsed.candidates.is_empty());
    }
}
