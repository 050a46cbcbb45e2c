//! Embedding provider abstraction.
//!
//! The embedding model itself is an external collaborator: this module
//! only defines the trait boundary ([`EmbeddingProvider`]) and an HTTP
//! implementation that calls it. Retry strategy mirrors the original
//! provider this is generalized from: HTTP 429/5xx retry with exponential
//! backoff (1s, 2s, 4s, ... capped at 32s); other 4xx fail immediately.

use async_trait::async_trait;
use std::time::Duration;

use crate::config::EmbeddingSettings;
use crate::error::{EngineError, Result};

#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    fn model_name(&self) -> &str;
    fn dims(&self) -> usize;
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

pub struct DisabledProvider;

#[async_trait]
impl EmbeddingProvider for DisabledProvider {
    fn model_name(&self) -> &str {
        "disabled"
    }
    fn dims(&self) -> usize {
        0
    }
    async fn embed(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Err(EngineError::Embedding("embedding provider is disabled".into()))
    }
}

/// Calls an external HTTP embedding endpoint with a fixed request/response
/// shape: `{"model": ..., "input": [...]}` -> `{"data": [{"embedding": [...]}]}`.
pub struct HttpProvider {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    dims: usize,
    max_retries: u32,
}

impl HttpProvider {
    pub fn new(config: &EmbeddingSettings) -> Result<Self> {
        let model = config.model.clone().ok_or_else(|| EngineError::Configuration("embedding.model required".into()))?;
        let dims = config.dims.ok_or_else(|| EngineError::Configuration("embedding.dims required".into()))?;
        let endpoint = config
            .endpoint
            .clone()
            .ok_or_else(|| EngineError::Configuration("embedding.endpoint required for http provider".into()))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| EngineError::Embedding(e.to_string()))?;

        Ok(Self { client, endpoint, model, dims, max_retries: config.max_retries })
    }
}

#[async_trait]
impl EmbeddingProvider for HttpProvider {
    fn model_name(&self) -> &str {
        &self.model
    }
    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let body = serde_json::json!({ "model": self.model, "input": texts });
        let mut last_err = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                tokio::time::sleep(delay).await;
            }

            let response = self.client.post(&self.endpoint).json(&body).send().await;

            match response {
                Ok(resp) => {
                    let status = resp.status();
                    if status.is_success() {
                        let json: serde_json::Value =
                            resp.json().await.map_err(|e| EngineError::Embedding(e.to_string()))?;
                        return parse_response(&json, self.dims);
                    }
                    if status.as_u16() == 429 || status.is_server_error() {
                        last_err = Some(format!("embedding endpoint returned {}", status));
                        continue;
                    }
                    let text = resp.text().await.unwrap_or_default();
                    return Err(EngineError::Embedding(format!("embedding endpoint error {}: {}", status, text)));
                }
                Err(e) => {
                    last_err = Some(e.to_string());
                }
            }
        }

        Err(EngineError::Embedding(last_err.unwrap_or_else(|| "embedding request exhausted retries".into())))
    }
}

fn parse_response(json: &serde_json::Value, expected_dims: usize) -> Result<Vec<Vec<f32>>> {
    let data = json
        .get("data")
        .and_then(|d| d.as_array())
        .ok_or_else(|| EngineError::Embedding("malformed embedding response: missing data array".into()))?;

    let mut vectors = Vec::with_capacity(data.len());
    for item in data {
        let embedding = item
            .get("embedding")
            .and_then(|e| e.as_array())
            .ok_or_else(|| EngineError::Embedding("malformed embedding response: missing embedding array".into()))?;
        let vector: Vec<f32> = embedding.iter().filter_map(|v| v.as_f64()).map(|v| v as f32).collect();
        if vector.len() != expected_dims {
            return Err(EngineError::Embedding(format!(
                "embedding dimension mismatch: expected {}, got {}",
                expected_dims,
                vector.len()
            )));
        }
        vectors.push(vector);
    }
    Ok(vectors)
}

pub fn create_provider(config: &EmbeddingSettings) -> Result<Box<dyn EmbeddingProvider>> {
    match config.provider.as_str() {
        "http" => Ok(Box::new(HttpProvider::new(config)?)),
        "disabled" => Ok(Box::new(DisabledProvider)),
        other => Err(EngineError::Configuration(format!("unknown embedding provider: {}", other))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_provider_reports_zero_dims() {
        let provider = DisabledProvider;
        assert_eq!(provider.dims(), 0);
        assert_eq!(provider.model_name(), "disabled");
    }

    #[test]
    fn create_provider_rejects_unknown_name() {
        let mut config = EmbeddingSettings::default();
        config.provider = "bogus".into();
        let err = create_provider(&config).unwrap_err();
        assert!(matches!(err, EngineError::Configuration(_)));
    }

    #[test]
    fn parse_response_rejects_dimension_mismatch() {
        let json = serde_json::json!({ "data": [{ "embedding": [0.1, 0.2] }] });
        let err = parse_response(&json, 3).unwrap_err();
        assert!(matches!(err, EngineError::Embedding(_)));
    }
}
