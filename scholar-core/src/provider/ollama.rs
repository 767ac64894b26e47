//! Ollama provider implementation.
//!
//! Talks to a local or remote Ollama server through its `/api/embed` endpoint,
//! which accepts a list of inputs per request.

use super::types::*;
use crate::config::EmbeddingConfig;
use crate::detection::Device;
use async_trait::async_trait;
use std::collections::HashMap;
use tracing::debug;

/// Ollama HTTP embedding provider.
#[derive(Debug, Clone)]
pub struct OllamaEmbedder {
    base_url: String,
    model: String,
    dimension: usize,
    batch_size: usize,
    truncate: bool,
    device: Device,
    http_client: reqwest::Client,
}

impl OllamaEmbedder {
    /// Creates a provider for `config.model` with a known output `dimension`.
    ///
    /// `device` is the placement chosen for the process. On [`Device::Cpu`] the
    /// server is told not to offload layers to a GPU.
    pub fn new(config: &EmbeddingConfig, dimension: usize, device: Device) -> Self {
        Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            dimension,
            batch_size: config.batch_size.max(1),
            truncate: config.truncate,
            device,
            http_client: reqwest::Client::new(),
        }
    }

    fn options(&self) -> Option<HashMap<String, serde_json::Value>> {
        match self.device {
            Device::Cpu => {
                let mut opts = HashMap::new();
                opts.insert("num_gpu".to_string(), serde_json::json!(0));
                Some(opts)
            }
            _ => None,
        }
    }

    async fn embed_request(&self, input: &[String]) -> Result<Vec<Vec<f32>>> {
        let url = format!("{}/api/embed", self.base_url);

        let embed_request = EmbedRequest {
            model: self.model.clone(),
            input: input.to_vec(),
            truncate: self.truncate,
            options: self.options(),
        };

        let response = self.http_client
            .post(&url)
            .json(&embed_request)
            .send()
            .await?;

        if !response.status().is_success() {
            let error_text = response.text().await?;
            return Err(ProviderError::Api(error_text));
        }

        let embed_response = response.json::<EmbedResponse>().await?;
        Ok(embed_response.embeddings)
    }
}

#[async_trait]
impl EmbeddingProvider for OllamaEmbedder {
    async fn encode(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut embeddings = Vec::with_capacity(texts.len());

        for batch in texts.chunks(self.batch_size) {
            debug!(model = %self.model, size = batch.len(), "Sending embedding batch");
            let vectors = self.embed_request(batch).await?;

            if vectors.len() != batch.len() {
                return Err(ProviderError::Other(format!(
                    "Expected {} embeddings, server returned {}",
                    batch.len(),
                    vectors.len()
                )));
            }
            embeddings.extend(vectors);
        }

        Ok(embeddings)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn name(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cpu_disables_gpu_offload() {
        let embedder = OllamaEmbedder::new(&EmbeddingConfig::default(), 768, Device::Cpu);
        let options = embedder.options().unwrap();
        assert_eq!(options["num_gpu"], serde_json::json!(0));
    }

    #[test]
    fn test_accelerator_leaves_options_unset() {
        let embedder = OllamaEmbedder::new(&EmbeddingConfig::default(), 768, Device::Metal);
        assert!(embedder.options().is_none());
    }

    #[test]
    fn test_request_serialization() {
        let request = EmbedRequest {
            model: "embeddinggemma".to_string(),
            input: vec!["a".to_string(), "b".to_string()],
            truncate: true,
            options: None,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["input"], serde_json::json!(["a", "b"]));
        assert!(json.get("options").is_none());
    }

    #[test]
    fn test_base_url_trailing_slash() {
        let config = EmbeddingConfig {
            base_url: "http://localhost:11434/".to_string(),
            ..EmbeddingConfig::default()
        };
        let embedder = OllamaEmbedder::new(&config, 768, Device::Cpu);
        assert_eq!(embedder.base_url, "http://localhost:11434");
        assert_eq!(embedder.dimension(), 768);
        assert_eq!(embedder.name(), "embeddinggemma");
    }
}
