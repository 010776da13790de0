//! Retrieval/answer path: embed the question, fetch the closest chunks,
//! and prompt the chat model with the assembled context.

use crate::chat::{build_prompt, GeminiChat, ANSWER_FALLBACK};
use crate::embeddings::HfEmbedder;
use crate::error::{RagserveError, Result};
use crate::vector::PineconeIndex;
use serde::Serialize;

const EMBED_QUERY_RETRIES: usize = 2;

/// Where an answer fragment came from.
#[derive(Debug, Clone, Serialize)]
pub struct SourceRef {
    pub source: String,
    #[serde(rename = "chunkIndex", skip_serializing_if = "Option::is_none")]
    pub chunk_index: Option<usize>,
}

/// The result of answering one question.
#[derive(Debug, Serialize)]
pub struct Answer {
    pub answer: String,
    pub sources: Vec<SourceRef>,
}

/// Read-side engine shared by the HTTP server and the query CLI.
pub struct QueryEngine {
    embedder: HfEmbedder,
    index: PineconeIndex,
    chat: GeminiChat,
    top_k: usize,
}

impl QueryEngine {
    pub fn new(
        embedder: HfEmbedder,
        index: PineconeIndex,
        chat: GeminiChat,
        top_k: usize,
    ) -> Self {
        Self {
            embedder,
            index,
            chat,
            top_k,
        }
    }

    /// Answer a question from the indexed documents.
    ///
    /// An empty model reply becomes the standard fallback phrase rather
    /// than an error.
    pub async fn answer(&self, question: &str) -> Result<Answer> {
        if question.trim().is_empty() {
            return Err(RagserveError::InvalidInput("empty question".to_string()));
        }

        let vector = self.embedder.embed_query(question, EMBED_QUERY_RETRIES).await?;
        let matches = self.index.query(&vector, self.top_k).await?;

        let mut context_parts = Vec::with_capacity(matches.len());
        let mut sources = Vec::with_capacity(matches.len());

        for m in matches {
            match m.metadata {
                Some(meta) => {
                    context_parts.push(meta.text);
                    sources.push(SourceRef {
                        source: meta.source,
                        chunk_index: Some(meta.chunk_index),
                    });
                }
                None => sources.push(SourceRef {
                    source: "unknown".to_string(),
                    chunk_index: None,
                }),
            }
        }

        let context = context_parts.join("\n\n");
        let prompt = build_prompt(&context, question);
        let text = self.chat.complete(&prompt).await?;

        let answer = if text.trim().is_empty() {
            ANSWER_FALLBACK.to_string()
        } else {
            text
        };

        Ok(Answer { answer, sources })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_answer_serialization_shape() {
        let answer = Answer {
            answer: "hi".to_string(),
            sources: vec![
                SourceRef {
                    source: "data/a.txt".to_string(),
                    chunk_index: Some(3),
                },
                SourceRef {
                    source: "unknown".to_string(),
                    chunk_index: None,
                },
            ],
        };
        let json = serde_json::to_value(&answer).unwrap();
        assert_eq!(json["answer"], "hi");
        assert_eq!(json["sources"][0]["chunkIndex"], 3);
        assert_eq!(json["sources"][0]["source"], "data/a.txt");
        // chunkIndex is omitted entirely when unknown
        assert!(json["sources"][1].get("chunkIndex").is_none());
    }
}
