//! OpenAI-compatible embeddings over blocking HTTP.
//!
//! Retry strategy:
//! - HTTP 429 and 5xx → retry with exponential backoff (1s, 2s, 4s, ... capped at 32s)
//! - other 4xx → fail immediately
//! - network errors → retry

use std::time::Duration;

use goalmap_core::{EmbeddingConfig, Error, Result};
use ndarray::Array1;
use reqwest::blocking::Client;
use serde_json::json;
use tracing::{debug, warn};

use crate::embedder::{EmbedderBackend, EmbeddingBatch};

/// Characters per token used when the response carries no usage block.
const FALLBACK_CHARS_PER_TOKEN: usize = 4;

pub struct OpenAiEmbedder {
    client: Client,
    url: String,
    api_key: String,
    model: String,
    max_retries: u32,
}

impl OpenAiEmbedder {
    /// Build from configuration. Requires an API key.
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| Error::Config("embedding.api_key (or OPENAI_API_KEY) required".into()))?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| Error::Http(e.to_string()))?;

        Ok(Self {
            client,
            url: format!("{}/embeddings", config.base_url.trim_end_matches('/')),
            api_key,
            model: config.model.clone(),
            max_retries: config.max_retries,
        })
    }

    fn post(&self, texts: &[&str]) -> Result<serde_json::Value> {
        let body = json!({
            "model": self.model,
            "input": texts,
        });

        let mut last_err = None;
        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                debug!("Retrying embeddings request in {:?} (attempt {})", delay, attempt);
                std::thread::sleep(delay);
            }

            let resp = self
                .client
                .post(&self.url)
                .header("Authorization", format!("Bearer {}", self.api_key))
                .header("Content-Type", "application/json")
                .json(&body)
                .send();

            match resp {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        return response.json().map_err(|e| Error::Http(e.to_string()));
                    }

                    let body_text = response.text().unwrap_or_default();
                    if status.as_u16() == 429 || status.is_server_error() {
                        warn!("Embeddings API error {} (attempt {})", status, attempt + 1);
                        last_err = Some(Error::Provider(format!(
                            "Embeddings API error {}: {}",
                            status, body_text
                        )));
                        continue;
                    }
                    return Err(Error::Provider(format!(
                        "Embeddings API error {}: {}",
                        status, body_text
                    )));
                }
                Err(e) => {
                    warn!("Embeddings request failed (attempt {}): {}", attempt + 1, e);
                    last_err = Some(Error::Http(e.to_string()));
                }
            }
        }

        Err(last_err.unwrap_or_else(|| Error::Provider("Embedding failed after retries".into())))
    }
}

impl EmbedderBackend for OpenAiEmbedder {
    fn model(&self) -> &str {
        &self.model
    }

    fn embed_batch(&self, texts: &[&str]) -> Result<EmbeddingBatch> {
        if texts.is_empty() {
            return Ok(EmbeddingBatch {
                vectors: Vec::new(),
                tokens: 0,
            });
        }
        let json = self.post(texts)?;
        let mut batch = parse_embeddings_response(&json, texts.len())?;
        if batch.tokens == 0 {
            batch.tokens = texts
                .iter()
                .map(|t| t.chars().count() / FALLBACK_CHARS_PER_TOKEN)
                .sum();
        }
        Ok(batch)
    }
}

/// Parse `data[].embedding` (ordered by `data[].index`) and `usage.prompt_tokens`.
pub fn parse_embeddings_response(json: &serde_json::Value, expected: usize) -> Result<EmbeddingBatch> {
    let data = json
        .get("data")
        .and_then(|d| d.as_array())
        .ok_or_else(|| Error::Provider("Invalid embeddings response: missing data array".into()))?;

    let mut indexed: Vec<(usize, Array1<f32>)> = Vec::with_capacity(data.len());
    for (pos, item) in data.iter().enumerate() {
        let embedding = item
            .get("embedding")
            .and_then(|e| e.as_array())
            .ok_or_else(|| Error::Provider("Invalid embeddings response: missing embedding".into()))?;
        let index = item
            .get("index")
            .and_then(|i| i.as_u64())
            .map(|i| i as usize)
            .unwrap_or(pos);
        let vec: Vec<f32> = embedding
            .iter()
            .map(|v| v.as_f64().unwrap_or(0.0) as f32)
            .collect();
        indexed.push((index, Array1::from_vec(vec)));
    }
    indexed.sort_by_key(|(i, _)| *i);

    if indexed.len() != expected {
        return Err(Error::Provider(format!(
            "Embeddings response has {} vectors, expected {}",
            indexed.len(),
            expected
        )));
    }

    let tokens = json
        .get("usage")
        .and_then(|u| u.get("prompt_tokens").or_else(|| u.get("total_tokens")))
        .and_then(|t| t.as_u64())
        .unwrap_or(0) as usize;

    Ok(EmbeddingBatch {
        vectors: indexed.into_iter().map(|(_, v)| v).collect(),
        tokens,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_orders_by_index() {
        let json = json!({
            "data": [
                { "index": 1, "embedding": [0.0, 1.0] },
                { "index": 0, "embedding": [1.0, 0.0] }
            ],
            "usage": { "prompt_tokens": 12, "total_tokens": 12 }
        });
        let batch = parse_embeddings_response(&json, 2).unwrap();
        assert_eq!(batch.tokens, 12);
        assert_eq!(batch.vectors[0][0], 1.0);
        assert_eq!(batch.vectors[1][1], 1.0);
    }

    #[test]
    fn test_parse_count_mismatch() {
        let json = json!({ "data": [ { "index": 0, "embedding": [1.0] } ] });
        assert!(matches!(
            parse_embeddings_response(&json, 2),
            Err(Error::Provider(_))
        ));
    }

    #[test]
    fn test_parse_missing_data() {
        let json = json!({ "error": { "message": "bad key" } });
        assert!(parse_embeddings_response(&json, 1).is_err());
    }

    #[test]
    fn test_new_requires_key() {
        let config = EmbeddingConfig::default();
        assert!(matches!(OpenAiEmbedder::new(&config), Err(Error::Config(_))));
    }

    #[test]
    fn test_empty_batch_skips_request() {
        let config = EmbeddingConfig {
            api_key: Some("sk-test".into()),
            base_url: "http://127.0.0.1:9".into(),
            ..Default::default()
        };
        let embedder = OpenAiEmbedder::new(&config).unwrap();
        let batch = embedder.embed_batch(&[]).unwrap();
        assert!(batch.vectors.is_empty());
        assert_eq!(batch.tokens, 0);
    }
}
