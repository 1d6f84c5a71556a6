//! Map-reduce document summarizer (component C7).
//!
//! Splits a document into ~1000-word chunks with 100-word overlap (a
//! word-count proxy for the token budget, since this crate has no tokenizer
//! of its own), summarizes each chunk, reduces the per-chunk summaries into
//! one, and—if the reduced summary still exceeds the 10,240-word
//! threshold—runs one further compression pass over it.
//!
//! Progress is reported as a cancellable event stream: dropping the
//! receiver end of the channel stops the background task as soon as it next
//! tries to send, since `mpsc::Sender::send` returns an error once the
//! receiver is gone.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::mpsc;
use tracing::warn;

use crate::error::LlmError;
use crate::router::LlmRouter;
use crate::types::{ChatRequest, Message};

const CHUNK_WORDS: usize = 1000;
const CHUNK_OVERLAP_WORDS: usize = 100;
const MAX_PAGES: usize = 100;
const MAX_SUB_CHUNKS: usize = 100;
const COMPRESSION_WORD_THRESHOLD: usize = 10_240;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SummarizeEvent {
    Progress { percent: u8 },
    Info { message: String },
    Error { message: String },
    Summary { text: String, metadata: SummaryMetadata },
}

#[derive(Debug, Clone, Serialize)]
pub struct SummaryMetadata {
    pub source_pages: usize,
    pub sub_chunks: usize,
    pub compressed: bool,
}

pub struct Summarizer {
    router: Arc<LlmRouter>,
    model: String,
    backend_name: Option<String>,
}

impl Summarizer {
    pub fn new(router: Arc<LlmRouter>, model: impl Into<String>, backend_name: Option<String>) -> Self {
        Self { router, model: model.into(), backend_name }
    }

    /// Spawns the map-reduce pipeline and returns the receiving end of its
    /// event channel. Dropping the receiver cancels the summarization.
    pub fn summarize(&self, pages: Vec<String>, system_prompt: Option<String>) -> mpsc::Receiver<SummarizeEvent> {
        let (tx, rx) = mpsc::channel(32);
        let router = self.router.clone();
        let model = self.model.clone();
        let backend_name = self.backend_name.clone();

        tokio::spawn(async move {
            if pages.len() > MAX_PAGES {
                let _ = tx
                    .send(SummarizeEvent::Error { message: format!("document has {} pages, exceeds the {MAX_PAGES}-page limit", pages.len()) })
                    .await;
                return;
            }

            let full_text = pages.join("\n\n");
            let sub_chunks = split_into_chunks(&full_text, CHUNK_WORDS, CHUNK_OVERLAP_WORDS);
            if sub_chunks.len() > MAX_SUB_CHUNKS {
                let _ = tx
                    .send(SummarizeEvent::Error {
                        message: format!("document splits into {} chunks, exceeds the {MAX_SUB_CHUNKS}-chunk limit", sub_chunks.len()),
                    })
                    .await;
                return;
            }

            if tx.send(SummarizeEvent::Info { message: format!("summarizing {} chunks", sub_chunks.len()) }).await.is_err() {
                return;
            }

            let mut partials = Vec::with_capacity(sub_chunks.len());
            for (idx, chunk) in sub_chunks.iter().enumerate() {
                match summarize_chunk(&router, &model, backend_name.as_deref(), system_prompt.as_deref(), chunk).await {
                    Ok(summary) => partials.push(summary),
                    Err(e) => {
                        warn!(error = %e, "chunk summarization failed");
                        let _ = tx.send(SummarizeEvent::Error { message: e.to_string() }).await;
                        return;
                    }
                }
                let percent = (((idx + 1) * 80) / sub_chunks.len().max(1)) as u8;
                if tx.send(SummarizeEvent::Progress { percent }).await.is_err() {
                    return;
                }
            }

            let reduced = if partials.len() == 1 {
                partials.into_iter().next().unwrap_or_default()
            } else {
                match reduce_partials(&router, &model, backend_name.as_deref(), system_prompt.as_deref(), &partials).await {
                    Ok(text) => text,
                    Err(e) => {
                        let _ = tx.send(SummarizeEvent::Error { message: e.to_string() }).await;
                        return;
                    }
                }
            };

            let word_count = reduced.split_whitespace().count();
            let (final_text, compressed) = if word_count > COMPRESSION_WORD_THRESHOLD {
                let _ = tx.send(SummarizeEvent::Info { message: "compressing oversized summary".into() }).await;
                match compress(&router, &model, backend_name.as_deref(), &reduced).await {
                    Ok(text) => (text, true),
                    Err(e) => {
                        let _ = tx.send(SummarizeEvent::Error { message: e.to_string() }).await;
                        return;
                    }
                }
            } else {
                (reduced, false)
            };

            let _ = tx.send(SummarizeEvent::Progress { percent: 100 }).await;
            let _ = tx
                .send(SummarizeEvent::Summary {
                    text: final_text,
                    metadata: SummaryMetadata { source_pages: pages.len(), sub_chunks: sub_chunks.len(), compressed },
                })
                .await;
        });

        rx
    }
}

async fn summarize_chunk(
    router: &LlmRouter,
    model: &str,
    backend_name: Option<&str>,
    system_prompt: Option<&str>,
    chunk: &str,
) -> Result<String, LlmError> {
    let mut messages = Vec::new();
    messages.push(Message::system(system_prompt.unwrap_or("Summarize the following text concisely.")));
    messages.push(Message::user(chunk.to_string()));
    let request = ChatRequest { model: model.to_string(), messages, temperature: 0.2, max_tokens: 512 };
    let response = router.chat(backend_name, request).await?;
    Ok(response.text)
}

async fn reduce_partials(
    router: &LlmRouter,
    model: &str,
    backend_name: Option<&str>,
    system_prompt: Option<&str>,
    partials: &[String],
) -> Result<String, LlmError> {
    let joined = partials.join("\n\n");
    let mut messages = Vec::new();
    messages.push(Message::system(system_prompt.unwrap_or("Combine the following partial summaries into one coherent summary.")));
    messages.push(Message::user(joined));
    let request = ChatRequest { model: model.to_string(), messages, temperature: 0.2, max_tokens: 1024 };
    let response = router.chat(backend_name, request).await?;
    Ok(response.text)
}

async fn compress(router: &LlmRouter, model: &str, backend_name: Option<&str>, text: &str) -> Result<String, LlmError> {
    let messages = vec![
        Message::system("Compress the following summary while preserving its key points."),
        Message::user(text.to_string()),
    ];
    let request = ChatRequest { model: model.to_string(), messages, temperature: 0.2, max_tokens: 1024 };
    let response = router.chat(backend_name, request).await?;
    Ok(response.text)
}

fn split_into_chunks(text: &str, chunk_words: usize, overlap_words: usize) -> Vec<String> {
    let words: Vec<&str> = text.split_whitespace().collect();
    if words.is_empty() {
        return Vec::new();
    }
    if words.len() <= chunk_words {
        return vec![text.to_string()];
    }

    let stride = chunk_words.saturating_sub(overlap_words).max(1);
    let mut chunks = Vec::new();
    let mut start = 0;
    while start < words.len() {
        let end = (start + chunk_words).min(words.len());
        chunks.push(words[start..end].join(" "));
        if end == words.len() {
            break;
        }
        start += stride;
    }
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_is_a_single_chunk() {
        let text = "one two three four five";
        let chunks = split_into_chunks(text, 1000, 100);
        assert_eq!(chunks.len(), 1);
    }

    #[test]
    fn long_text_overlaps_between_chunks() {
        let words: Vec<String> = (0..2500).map(|i| i.to_string()).collect();
        let text = words.join(" ");
        let chunks = split_into_chunks(&text, 1000, 100);
        assert!(chunks.len() >= 3);
        let first_last_word = chunks[0].split_whitespace().last().unwrap();
        assert!(chunks[1].split_whitespace().next().is_some());
        let _ = first_last_word;
    }
}
